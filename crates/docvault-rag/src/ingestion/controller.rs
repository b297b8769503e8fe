//! Ingestion controller: one document through fetch, normalize, chunk, embed

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::{Error, Result, Stage};
use crate::providers::{EmbeddingProvider, Normalizer, ObjectStore};
use crate::storage::ChunkStore;
use crate::types::{IngestJob, IngestReport};

use super::batcher::EmbeddingBatcher;
use super::chunker::RecursiveChunker;

/// Orchestrates ingestion for one document at a time
///
/// Owns the document status state machine:
/// `uploaded -> processing -> completed` on success,
/// `uploaded -> processing -> failed` on any stage error. Failures are
/// persisted on the document and then returned to the caller, so the queue
/// adapter's retry policy governs redelivery.
pub struct IngestionController {
    store: Arc<ChunkStore>,
    objects: Arc<dyn ObjectStore>,
    normalizer: Arc<dyn Normalizer>,
    batcher: EmbeddingBatcher,
    chunker: RecursiveChunker,
    /// Documents with an ingestion currently running in this process
    in_flight: DashMap<Uuid, ()>,
}

impl IngestionController {
    pub fn new(
        config: &RagConfig,
        store: Arc<ChunkStore>,
        objects: Arc<dyn ObjectStore>,
        normalizer: Arc<dyn Normalizer>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let chunker = RecursiveChunker::new(
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        );
        let batcher = EmbeddingBatcher::new(
            Arc::clone(&store),
            embedder,
            config.embedding.batch_size,
        );

        Self {
            store,
            objects,
            normalizer,
            batcher,
            chunker,
            in_flight: DashMap::new(),
        }
    }

    /// Run the full ingestion pipeline for one job
    pub async fn ingest(&self, job: &IngestJob) -> Result<IngestReport> {
        job.validate()?;

        // One ingestion per document id at a time: a concurrent duplicate
        // delivery would race the delete-then-reinsert below.
        let _guard = InFlightGuard::acquire(&self.in_flight, job.document_id)?;

        self.store
            .get_document(job.tenant_id, job.document_id)?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "document {} not found for tenant {}",
                    job.document_id, job.tenant_id
                ))
            })?;

        self.store.mark_processing(job.tenant_id, job.document_id)?;
        tracing::info!(
            document_id = %job.document_id,
            tenant_id = %job.tenant_id,
            locator = %job.storage_locator,
            "ingestion started"
        );

        match self.run_stages(job).await {
            Ok(report) => {
                self.store.mark_completed(job.tenant_id, job.document_id)?;
                tracing::info!(
                    document_id = %job.document_id,
                    chunks = report.chunk_count,
                    pages = report.page_count,
                    "ingestion completed"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    document_id = %job.document_id,
                    error = %e,
                    "ingestion failed"
                );
                // Persist the failure, then re-raise for the queue adapter.
                // Chunks from batches that checkpointed before the failure
                // stay in place; the next attempt deletes them first.
                if let Err(mark_err) =
                    self.store
                        .mark_failed(job.tenant_id, job.document_id, &e.to_string())
                {
                    tracing::error!(
                        document_id = %job.document_id,
                        error = %mark_err,
                        "failed to record ingestion failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// The stages proper; every outcome is an explicit `Result`
    async fn run_stages(&self, job: &IngestJob) -> Result<IngestReport> {
        let raw = self
            .objects
            .fetch(&job.storage_locator)
            .await
            .map_err(|e| stage_failure(Stage::Fetch, e))?;

        let normalized = self
            .normalizer
            .extract(&raw)
            .await
            .map_err(|e| stage_failure(Stage::Normalize, e))?;

        let spans = self.chunker.split(&normalized.text);

        // Re-ingestion replaces: clear prior chunks before inserting so a
        // redelivered job cannot accumulate duplicates.
        let removed = self.store.delete_chunks(job.tenant_id, job.document_id)?;
        if removed > 0 {
            tracing::info!(
                document_id = %job.document_id,
                removed,
                "cleared chunks from a previous ingestion"
            );
        }

        if spans.is_empty() {
            // Empty document: a no-op, not an error.
            tracing::warn!(document_id = %job.document_id, "normalized text is empty");
            return Ok(IngestReport {
                document_id: job.document_id,
                chunk_count: 0,
                page_count: normalized.page_count(),
                total_characters: 0,
            });
        }

        let stored = self
            .batcher
            .run(job.tenant_id, job.document_id, &normalized, &spans)
            .await?;

        Ok(IngestReport {
            document_id: job.document_id,
            chunk_count: stored,
            page_count: normalized.page_count(),
            total_characters: normalized.text.len(),
        })
    }
}

/// Attribute a collaborator failure to a pipeline stage unless it already
/// carries one
fn stage_failure(stage: Stage, err: Error) -> Error {
    match err {
        Error::Upstream { .. } | Error::Config(_) => err,
        other => Error::upstream(stage, other.to_string()),
    }
}

/// Removes the in-flight marker when the ingestion ends, however it ends
struct InFlightGuard<'a> {
    map: &'a DashMap<Uuid, ()>,
    document_id: Uuid,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(map: &'a DashMap<Uuid, ()>, document_id: Uuid) -> Result<Self> {
        match map.entry(document_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::validation(format!(
                "ingestion already in progress for document {document_id}"
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(());
                Ok(Self { map, document_id })
            }
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.document_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;

    use crate::providers::NormalizedDocument;
    use crate::types::{Document, DocumentStatus};

    const DIMS: usize = 4;

    struct MemoryObjects {
        blobs: HashMap<String, Bytes>,
    }

    #[async_trait]
    impl ObjectStore for MemoryObjects {
        async fn fetch(&self, locator: &str) -> Result<Bytes> {
            self.blobs
                .get(locator)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("no object at {locator}")))
        }

        fn name(&self) -> &str {
            "memory"
        }
    }

    /// Treats the raw bytes as UTF-8 and splits pages on form feeds
    struct FormFeedNormalizer;

    #[async_trait]
    impl Normalizer for FormFeedNormalizer {
        async fn extract(&self, raw: &[u8]) -> Result<NormalizedDocument> {
            let text = String::from_utf8(raw.to_vec())
                .map_err(|e| Error::upstream(Stage::Normalize, e.to_string()))?;
            let mut page_offsets = vec![0];
            for (i, b) in text.bytes().enumerate() {
                if b == 0x0c {
                    page_offsets.push(i + 1);
                }
            }
            if text.is_empty() {
                page_offsets.clear();
            }
            Ok(NormalizedDocument { text, page_offsets })
        }

        fn name(&self) -> &str {
            "form-feed"
        }
    }

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0, 0.0, 0.0])
                .collect())
        }

        fn dimensions(&self) -> usize {
            DIMS
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::upstream(Stage::Embedding, "quota exhausted"))
        }

        fn dimensions(&self) -> usize {
            DIMS
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn controller_with(
        store: Arc<ChunkStore>,
        text: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> (IngestionController, IngestJob) {
        let tenant = Uuid::new_v4();
        let doc = Document::new(tenant, "mem://doc");
        store.insert_document(&doc).unwrap();

        let mut blobs = HashMap::new();
        blobs.insert("mem://doc".to_string(), Bytes::from(text.as_bytes().to_vec()));

        let mut config = RagConfig::default();
        config.chunking.chunk_size = 100;
        config.chunking.chunk_overlap = 20;
        config.embedding.batch_size = 2;
        config.embedding.dimensions = DIMS;

        let controller = IngestionController::new(
            &config,
            store,
            Arc::new(MemoryObjects { blobs }),
            Arc::new(FormFeedNormalizer),
            embedder,
        );
        let job = IngestJob::new(tenant, doc.id, "mem://doc");
        (controller, job)
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for page in 1..=3 {
            for line in 1..=6 {
                text.push_str(&format!("Page {page} line {line} has some words. "));
            }
            if page < 3 {
                text.push('\x0c');
            }
        }
        text
    }

    #[tokio::test]
    async fn happy_path_marks_completed() {
        let store = Arc::new(ChunkStore::in_memory(DIMS).unwrap());
        let (controller, job) =
            controller_with(store.clone(), &sample_text(), Arc::new(LengthEmbedder));

        let report = controller.ingest(&job).await.unwrap();

        assert!(report.chunk_count > 1);
        assert_eq!(report.page_count, 3);

        let doc = store.get_document(job.tenant_id, job.document_id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert!(doc.processing_started_at.is_some());
        assert!(doc.processing_completed_at.is_some());

        // Indices are a contiguous 0-based sequence.
        let chunks = store
            .chunks_for_document(job.tenant_id, job.document_id)
            .unwrap();
        let indices: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, (0..chunks.len() as u32).collect::<Vec<_>>());
        // Every chunk carries the document's tenant.
        assert!(chunks.iter().all(|c| c.tenant_id == job.tenant_id));
    }

    #[tokio::test]
    async fn embedding_failure_marks_failed_and_reraises() {
        let store = Arc::new(ChunkStore::in_memory(DIMS).unwrap());
        let (controller, job) =
            controller_with(store.clone(), &sample_text(), Arc::new(BrokenEmbedder));

        let err = controller.ingest(&job).await.unwrap_err();
        assert!(err.is_transient());

        let doc = store.get_document(job.tenant_id, job.document_id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        let message = doc.error_message.unwrap();
        assert!(message.contains("embedding"), "got: {message}");
        assert!(message.contains("quota exhausted"), "got: {message}");
    }

    #[tokio::test]
    async fn missing_object_marks_failed_with_fetch_stage() {
        let store = Arc::new(ChunkStore::in_memory(DIMS).unwrap());
        let tenant = Uuid::new_v4();
        let doc = Document::new(tenant, "mem://gone");
        store.insert_document(&doc).unwrap();

        let mut config = RagConfig::default();
        config.embedding.dimensions = DIMS;
        let controller = IngestionController::new(
            &config,
            store.clone(),
            Arc::new(MemoryObjects { blobs: HashMap::new() }),
            Arc::new(FormFeedNormalizer),
            Arc::new(LengthEmbedder),
        );

        let job = IngestJob::new(tenant, doc.id, "mem://gone");
        let err = controller.ingest(&job).await.unwrap_err();
        assert!(err.to_string().contains("object fetch"), "got: {err}");

        let doc = store.get_document(tenant, doc.id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let store = Arc::new(ChunkStore::in_memory(DIMS).unwrap());
        let (controller, mut job) =
            controller_with(store, &sample_text(), Arc::new(LengthEmbedder));
        job.document_id = Uuid::new_v4();

        let err = controller.ingest(&job).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_any_state_change() {
        let store = Arc::new(ChunkStore::in_memory(DIMS).unwrap());
        let (controller, mut job) =
            controller_with(store.clone(), &sample_text(), Arc::new(LengthEmbedder));
        job.tenant_id = Uuid::nil();

        let err = controller.ingest(&job).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn reingestion_replaces_instead_of_duplicating() {
        let store = Arc::new(ChunkStore::in_memory(DIMS).unwrap());
        let (controller, job) =
            controller_with(store.clone(), &sample_text(), Arc::new(LengthEmbedder));

        let first = controller.ingest(&job).await.unwrap();
        let second = controller.ingest(&job).await.unwrap();

        assert_eq!(first.chunk_count, second.chunk_count);
        let chunks = store
            .chunks_for_document(job.tenant_id, job.document_id)
            .unwrap();
        assert_eq!(chunks.len(), second.chunk_count);
        let indices: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, (0..chunks.len() as u32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn empty_document_completes_with_zero_chunks() {
        let store = Arc::new(ChunkStore::in_memory(DIMS).unwrap());
        let (controller, job) = controller_with(store.clone(), "", Arc::new(LengthEmbedder));

        let report = controller.ingest(&job).await.unwrap();
        assert_eq!(report.chunk_count, 0);

        let doc = store.get_document(job.tenant_id, job.document_id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn failed_ingestion_can_be_retried() {
        let store = Arc::new(ChunkStore::in_memory(DIMS).unwrap());
        let (broken, job) =
            controller_with(store.clone(), &sample_text(), Arc::new(BrokenEmbedder));
        broken.ingest(&job).await.unwrap_err();

        // Rebuild the controller with a working embedder, same store and job.
        let tenant = job.tenant_id;
        let mut blobs = HashMap::new();
        blobs.insert("mem://doc".to_string(), Bytes::from(sample_text().into_bytes()));
        let mut config = RagConfig::default();
        config.chunking.chunk_size = 100;
        config.chunking.chunk_overlap = 20;
        config.embedding.dimensions = DIMS;
        let fixed = IngestionController::new(
            &config,
            store.clone(),
            Arc::new(MemoryObjects { blobs }),
            Arc::new(FormFeedNormalizer),
            Arc::new(LengthEmbedder),
        );

        let report = fixed.ingest(&job).await.unwrap();
        assert!(report.chunk_count > 0);
        let doc = store.get_document(tenant, job.document_id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert!(doc.error_message.is_none());
    }
}
