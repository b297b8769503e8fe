//! docvault-rag: multi-tenant RAG core with tenant-isolated retrieval and cited answers
//!
//! This crate implements the retrieval-augmented generation subsystem of a
//! multi-tenant document platform: an ingestion pipeline that turns a raw
//! document into persisted, embedded text chunks, and a query pipeline that
//! turns a question into a grounded answer with source citations. External
//! services (object storage, text normalization, embedding, generation) sit
//! behind provider traits; the HTTP layer, job broker, and identity are the
//! caller's concern.

pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod storage;
pub mod synthesis;
pub mod types;

pub use config::RagConfig;
pub use engine::RagEngine;
pub use error::{Error, Result, Stage};
pub use types::{
    document::{Chunk, ChunkMetadata, Document, DocumentStatus},
    job::{IngestJob, IngestReport},
    query::{QualityTier, QueryRequest},
    response::{Citation, QueryResponse},
};
