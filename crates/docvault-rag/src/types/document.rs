//! Document and chunk types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Registered by the upload path, not yet ingested
    Uploaded,
    /// Ingestion in progress
    Processing,
    /// Fully ingested and searchable
    Completed,
    /// Ingestion failed; `error_message` holds the reason
    Failed,
}

impl DocumentStatus {
    /// Stable string form used in the datastore
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    /// Parse the datastore string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(DocumentStatus::Uploaded),
            "processing" => Some(DocumentStatus::Processing),
            "completed" => Some(DocumentStatus::Completed),
            "failed" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }
}

/// A registered source document
///
/// Created by the upload path; mutated only by the ingestion controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Locator understood by the object store (e.g. a bucket URI)
    pub storage_locator: String,
    /// Lifecycle status
    pub status: DocumentStatus,
    /// Failure reason when status is `Failed`
    pub error_message: Option<String>,
    /// Set when ingestion starts
    pub processing_started_at: Option<DateTime<Utc>>,
    /// Set when ingestion completes or fails
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a freshly uploaded document record
    pub fn new(tenant_id: Uuid, storage_locator: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            storage_locator: storage_locator.into(),
            status: DocumentStatus::Uploaded,
            error_message: None,
            processing_started_at: None,
            processing_completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Free-form metadata attached to a chunk at ingestion time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source page (1-indexed) containing the midpoint of the chunk's span
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Byte offset of the chunk start in the normalized text
    pub char_start: usize,
    /// Byte offset one past the chunk end in the normalized text
    pub char_end: usize,
}

/// A unit of retrievable text, immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Owning document
    pub document_id: Uuid,
    /// Owning tenant, denormalized for tenant-scoped filtering
    pub tenant_id: Uuid,
    /// 0-based position within the document; contiguous, defines re-assembly order
    pub chunk_index: u32,
    /// Text content
    pub content: String,
    /// Approximate token count of `content`
    pub token_count: u32,
    /// Embedding vector, fixed dimension matching the embedding service
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Source metadata
    pub metadata: ChunkMetadata,
    pub created_at: DateTime<Utc>,
}

/// A chunk row about to be persisted
///
/// The tenant id is intentionally absent: the store copies it from the
/// owning document row at write time.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: u32,
    pub content: String,
    pub token_count: u32,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_store_form() {
        for status in [
            DocumentStatus::Uploaded,
            DocumentStatus::Processing,
            DocumentStatus::Completed,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::parse("archived"), None);
    }

    #[test]
    fn new_document_starts_uploaded() {
        let doc = Document::new(Uuid::new_v4(), "gs://bucket/a.pdf");
        assert_eq!(doc.status, DocumentStatus::Uploaded);
        assert!(doc.error_message.is_none());
        assert!(doc.processing_started_at.is_none());
    }
}
