//! Core data types shared across the pipeline

pub mod document;
pub mod job;
pub mod query;
pub mod response;

pub use document::{Chunk, ChunkMetadata, Document, DocumentStatus, NewChunk};
pub use job::{IngestJob, IngestReport};
pub use query::{QualityTier, QueryRequest};
pub use response::{Citation, QueryResponse};
