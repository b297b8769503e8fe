//! Text normalization provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Plain text extracted from a raw document, with page boundaries
#[derive(Debug, Clone, Default)]
pub struct NormalizedDocument {
    /// The full normalized text
    pub text: String,
    /// Byte offset in `text` where each page begins; empty when the source
    /// has no page structure
    pub page_offsets: Vec<usize>,
}

impl NormalizedDocument {
    /// Number of pages reported by the normalizer
    pub fn page_count(&self) -> usize {
        self.page_offsets.len()
    }

    /// 1-indexed page containing the given byte offset
    pub fn page_for_offset(&self, offset: usize) -> Option<u32> {
        if self.page_offsets.is_empty() {
            return None;
        }
        let idx = self.page_offsets.partition_point(|&start| start <= offset);
        // offset before the first recorded page start still maps to page 1
        Some(idx.max(1) as u32)
    }
}

/// Trait for extracting normalized text from raw document bytes
#[async_trait]
pub trait Normalizer: Send + Sync {
    /// Extract plain text and page boundaries from raw bytes
    async fn extract(&self, raw: &[u8]) -> Result<NormalizedDocument>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
