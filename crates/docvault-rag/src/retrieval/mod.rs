//! Tenant-scoped nearest-neighbor retrieval

use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result, Stage};
use crate::providers::EmbeddingProvider;
use crate::storage::ChunkStore;
use crate::types::Chunk;

/// A chunk matched against a question, with its similarity score
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine similarity against the question (higher is better)
    pub similarity: f32,
}

/// Embeds a question and ranks one tenant's chunks against it
pub struct Retriever {
    store: Arc<ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<ChunkStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Top-K chunks for a question, restricted to one tenant and optionally
    /// to a set of documents
    ///
    /// An empty result is a normal outcome (nothing indexed for the scope),
    /// not an error; the caller decides what to tell the user.
    pub async fn retrieve(
        &self,
        question: &str,
        tenant_id: Uuid,
        document_ids: Option<&[Uuid]>,
        max_chunks: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self
            .embedder
            .embed(question)
            .await
            .map_err(|e| match e {
                Error::Upstream { .. } | Error::Config(_) => e,
                other => Error::upstream(Stage::Embedding, other.to_string()),
            })?;

        let results =
            self.store
                .search_similar(tenant_id, document_ids, &query_embedding, max_chunks)?;

        tracing::debug!(
            tenant_id = %tenant_id,
            matches = results.len(),
            scoped = document_ids.is_some(),
            "retrieval finished"
        );

        Ok(results)
    }
}
