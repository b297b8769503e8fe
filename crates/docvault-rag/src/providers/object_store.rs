//! Object storage provider trait

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Trait for fetching raw document bytes by storage locator
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the raw bytes behind a storage locator
    async fn fetch(&self, locator: &str) -> Result<Bytes>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
