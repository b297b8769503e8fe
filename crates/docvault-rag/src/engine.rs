//! The RAG engine facade: the `index` and `query` operations

use std::sync::Arc;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::Result;
use crate::ingestion::IngestionController;
use crate::providers::{EmbeddingProvider, GenerationProvider, Normalizer, ObjectStore};
use crate::retrieval::Retriever;
use crate::storage::ChunkStore;
use crate::synthesis::GroundedSynthesizer;
use crate::types::{Document, IngestJob, IngestReport, QueryRequest, QueryResponse};

/// Wires the pipeline together around explicit service handles
///
/// All external clients are constructed once at process start and passed
/// in; nothing here holds hidden global state, so every component can be
/// driven with test doubles.
pub struct RagEngine {
    store: Arc<ChunkStore>,
    controller: IngestionController,
    retriever: Retriever,
    synthesizer: GroundedSynthesizer,
}

impl RagEngine {
    pub fn new(
        config: RagConfig,
        store: Arc<ChunkStore>,
        objects: Arc<dyn ObjectStore>,
        normalizer: Arc<dyn Normalizer>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Result<Self> {
        config.validate()?;

        if store.dimensions() != embedder.dimensions() {
            return Err(crate::error::Error::config(format!(
                "embedding provider produces {}-dimensional vectors but the chunk store expects {}",
                embedder.dimensions(),
                store.dimensions()
            )));
        }

        let controller = IngestionController::new(
            &config,
            Arc::clone(&store),
            objects,
            normalizer,
            Arc::clone(&embedder),
        );
        let retriever = Retriever::new(Arc::clone(&store), embedder);
        let synthesizer = GroundedSynthesizer::new(generator, config.synthesis.clone());

        Ok(Self {
            store,
            controller,
            retriever,
            synthesizer,
        })
    }

    /// Ingest one document end to end (the write path)
    ///
    /// Invoked by the job-queue adapter; errors propagate so the adapter's
    /// retry policy applies, with the failure already persisted on the
    /// document.
    pub async fn index(&self, job: IngestJob) -> Result<IngestReport> {
        self.controller.ingest(&job).await
    }

    /// Answer a question against a tenant's indexed documents (the read path)
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        request.validate()?;

        let results = self
            .retriever
            .retrieve(
                &request.question,
                request.tenant_id,
                request.document_ids.as_deref(),
                request.max_chunks,
            )
            .await?;

        if results.is_empty() {
            // Nothing indexed for this scope. Distinct from the model
            // finding the context insufficient: tell the caller to index
            // a document first.
            tracing::info!(tenant_id = %request.tenant_id, "query matched no chunks");
            return Ok(QueryResponse::no_indexed_content());
        }

        self.synthesizer
            .synthesize(&request.question, &results, request.tier)
            .await
    }

    /// Fetch a document within a tenant's scope
    pub fn document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Option<Document>> {
        self.store.get_document(tenant_id, document_id)
    }

    /// The underlying chunk store
    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }
}
