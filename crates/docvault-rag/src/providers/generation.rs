//! Generation provider trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::QualityTier;

/// Trait for LLM answer generation
///
/// The quality tier selects which model serves the request; nothing else
/// about the call changes.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate text for a fully-built prompt
    async fn generate(&self, prompt: &str, tier: QualityTier) -> Result<String>;

    /// Model name used for a tier, for logging and response metadata
    fn model_for(&self, tier: QualityTier) -> &str;

    /// Provider name for logging
    fn name(&self) -> &str;
}
