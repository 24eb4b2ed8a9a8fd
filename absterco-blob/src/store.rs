use async_trait::async_trait;
use bytes::Bytes;

use crate::BlobResult;

/// Path-addressed blob storage primitives, implemented by every backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing anything already there.
    async fn put(&self, key: &str, content_type: Option<&str>, data: Bytes) -> BlobResult<PutResult>;

    /// Delete the blob at `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Metadata for `key`, `None` when nothing is stored there.
    async fn head(&self, key: &str) -> BlobResult<Option<ObjectHead>>;
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Metadata about a blob
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}
