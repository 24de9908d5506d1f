//! Downloadable object references
//!
//! Produced results are exposed as object URLs. Each URL is owned by the
//! tool that created it and must be revoked once superseded or cleared.

pub mod memory;

pub use memory::MemoryBlobStore;

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_object_url(&self, data: &[u8], content_type: &str) -> Result<String>;
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
    async fn revoke_object_url(&self, url: &str) -> Result<()>;
}
