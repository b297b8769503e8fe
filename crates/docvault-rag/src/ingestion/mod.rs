//! Document ingestion pipeline: chunking, batched embedding, orchestration

mod batcher;
mod chunker;
mod controller;

pub use batcher::EmbeddingBatcher;
pub use chunker::{estimate_token_count, ChunkSpan, RecursiveChunker};
pub use controller::IngestionController;
