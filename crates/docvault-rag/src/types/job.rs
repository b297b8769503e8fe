//! Ingestion job payload delivered by the queue adapter

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// One ingestion job, delivered at-least-once by the external queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Document to ingest
    pub document_id: Uuid,
    /// Locator understood by the object store
    pub storage_locator: String,
}

impl IngestJob {
    pub fn new(tenant_id: Uuid, document_id: Uuid, storage_locator: impl Into<String>) -> Self {
        Self {
            tenant_id,
            document_id,
            storage_locator: storage_locator.into(),
        }
    }

    /// Reject malformed payloads before touching any state
    pub fn validate(&self) -> Result<()> {
        if self.tenant_id.is_nil() {
            return Err(Error::validation("ingest job is missing a tenant id"));
        }
        if self.document_id.is_nil() {
            return Err(Error::validation("ingest job is missing a document id"));
        }
        if self.storage_locator.trim().is_empty() {
            return Err(Error::validation("ingest job is missing a storage locator"));
        }
        Ok(())
    }
}

/// Statistics returned from a completed ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: Uuid,
    /// Chunks persisted for the document
    pub chunk_count: usize,
    /// Pages reported by the normalizer
    pub page_count: usize,
    /// Characters of normalized text
    pub total_characters: usize,
}
