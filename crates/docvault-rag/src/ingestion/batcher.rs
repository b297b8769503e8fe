//! Batched embedding generation with incremental persistence

use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result, Stage};
use crate::providers::{EmbeddingProvider, NormalizedDocument};
use crate::storage::ChunkStore;
use crate::types::{ChunkMetadata, NewChunk};

use super::chunker::{estimate_token_count, ChunkSpan};

/// Turns an ordered sequence of chunk spans into persisted, embedded rows
///
/// Batches run strictly sequentially: chunk indices must be assigned in
/// order, and embedding services rate-limit per caller. Each persisted
/// batch is a durable checkpoint; a failure aborts the remaining batches
/// and leaves earlier ones in place.
pub struct EmbeddingBatcher {
    store: Arc<ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl EmbeddingBatcher {
    pub fn new(
        store: Arc<ChunkStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed and persist all spans for one document; returns the row count
    pub async fn run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        normalized: &NormalizedDocument,
        spans: &[ChunkSpan],
    ) -> Result<usize> {
        if spans.is_empty() {
            return Ok(0);
        }

        let total_batches = spans.len().div_ceil(self.batch_size);
        let mut stored = 0usize;

        for (batch_no, batch) in spans.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|s| s.content.clone()).collect();

            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| embed_failure(batch_no + 1, total_batches, e))?;

            if vectors.len() != batch.len() {
                return Err(Error::upstream(
                    Stage::Embedding,
                    format!(
                        "batch {}/{}: service returned {} vectors for {} inputs",
                        batch_no + 1,
                        total_batches,
                        vectors.len(),
                        batch.len()
                    ),
                ));
            }

            let base_index = batch_no * self.batch_size;
            let rows: Vec<NewChunk> = batch
                .iter()
                .zip(vectors)
                .enumerate()
                .map(|(j, (span, embedding))| NewChunk {
                    chunk_index: (base_index + j) as u32,
                    content: span.content.clone(),
                    token_count: estimate_token_count(&span.content),
                    embedding,
                    metadata: ChunkMetadata {
                        // Midpoint attribution: the overlap prefix may reach
                        // back into the previous page.
                        page_number: normalized
                            .page_for_offset((span.char_start + span.char_end) / 2),
                        char_start: span.char_start,
                        char_end: span.char_end,
                    },
                })
                .collect();

            // Durable checkpoint: batches 1..N-1 survive a failure at batch N.
            self.store.insert_chunk_batch(tenant_id, document_id, &rows)?;
            stored += rows.len();

            tracing::debug!(
                document_id = %document_id,
                batch = batch_no + 1,
                total_batches,
                stored,
                "stored embedding batch"
            );
        }

        Ok(stored)
    }
}

/// Attribute an embedding failure to its batch, preserving fatal
/// configuration errors as-is
fn embed_failure(batch_no: usize, total_batches: usize, err: Error) -> Error {
    match err {
        Error::Config(_) => err,
        Error::Upstream { stage, message } => Error::Upstream {
            stage,
            message: format!("batch {batch_no}/{total_batches}: {message}"),
        },
        other => Error::upstream(
            Stage::Embedding,
            format!("batch {batch_no}/{total_batches}: {other}"),
        ),
    }
}
