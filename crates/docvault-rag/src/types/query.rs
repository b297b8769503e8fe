//! Query request types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Generation quality tier
///
/// The tier only selects which generation-service model is invoked; the
/// pipeline is identical for both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Fast, cheaper model
    #[default]
    Fast,
    /// Slower, higher-quality model
    HighQuality,
}

/// A question scoped to one tenant's indexed documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,

    /// Tenant whose chunks may be searched (mandatory)
    pub tenant_id: Uuid,

    /// Restrict the search to these documents (optional)
    #[serde(default)]
    pub document_ids: Option<Vec<Uuid>>,

    /// Maximum number of chunks to retrieve
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    /// Generation quality tier
    #[serde(default)]
    pub tier: QualityTier,
}

fn default_max_chunks() -> usize {
    5
}

impl QueryRequest {
    pub fn new(tenant_id: Uuid, question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            tenant_id,
            document_ids: None,
            max_chunks: default_max_chunks(),
            tier: QualityTier::default(),
        }
    }

    /// Restrict the search to specific documents
    pub fn with_documents(mut self, document_ids: Vec<Uuid>) -> Self {
        self.document_ids = Some(document_ids);
        self
    }

    /// Set the number of chunks to retrieve
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Select the generation tier
    pub fn with_tier(mut self, tier: QualityTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tenant_id.is_nil() {
            return Err(Error::validation("query is missing a tenant id"));
        }
        if self.question.trim().is_empty() {
            return Err(Error::validation("query question is empty"));
        }
        if self.max_chunks == 0 {
            return Err(Error::validation("max_chunks must be greater than zero"));
        }
        Ok(())
    }
}
