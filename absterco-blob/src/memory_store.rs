use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::{BlobResult, BlobStore, ObjectHead, PutResult};

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: Option<String>,
}

/// In-process blob store for local development and tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.read().await.contains_key(key)
    }

    pub async fn bytes(&self, key: &str) -> Option<Bytes> {
        self.blobs.read().await.get(key).map(|b| b.data.clone())
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, content_type: Option<&str>, data: Bytes) -> BlobResult<PutResult> {
        let size_bytes = data.len() as u64;
        self.blobs.write().await.insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.map(|s| s.to_string()),
            },
        );

        Ok(PutResult {
            etag: None,
            size_bytes,
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }

    async fn head(&self, key: &str) -> BlobResult<Option<ObjectHead>> {
        Ok(self.blobs.read().await.get(key).map(|b| ObjectHead {
            size_bytes: b.data.len() as u64,
            content_type: b.content_type.clone(),
            etag: None,
        }))
    }
}
