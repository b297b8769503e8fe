//! Provider abstractions for the external collaborators
//!
//! Each external service the pipeline depends on (object storage, text
//! normalization, embedding, generation) sits behind a trait so the
//! controller, retriever, and synthesizer can be wired with test doubles.

pub mod embedding;
pub mod generation;
pub mod http;
pub mod normalizer;
pub mod object_store;

pub use embedding::EmbeddingProvider;
pub use generation::GenerationProvider;
pub use http::{HttpEmbedder, HttpGenerator};
pub use normalizer::{NormalizedDocument, Normalizer};
pub use object_store::ObjectStore;
