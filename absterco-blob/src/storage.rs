//! Path convention and URL contract for uploaded images.
//!
//! Objects live at `{folder}/{unix-millis}-{nonce}-{sanitized-filename}`, where the
//! nonce is 12 random hex digits so uploads in the same millisecond with the same
//! client filename never share a path. The public URL carries the whole storage
//! path, percent-encoded, as its last path segment:
//!
//! ```text
//! {public_base_url}/o/blog-images%2F1700000000000-3f9c0d2ab417-cover.webp?alt=media
//! ```
//!
//! Deletion depends only on that segment, so any URL this module issued can be
//! turned back into its storage path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{BlobConfig, BlobError, BlobResult, BlobStore, ImageFile};

/// A stored upload and the URL it is reachable at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBlob {
    pub url: String,
    pub path: String,
    pub size_bytes: u64,
    pub content_type: String,
}

pub struct BlobStorage {
    store: Arc<dyn BlobStore>,
    config: BlobConfig,
}

impl BlobStorage {
    pub fn new(store: Arc<dyn BlobStore>, config: BlobConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// `{folder}/{unix-millis}-{nonce}-{sanitized filename}`.
    pub fn object_path(&self, filename: &str, now: DateTime<Utc>, nonce: &str) -> String {
        format!(
            "{}/{}-{}-{}",
            self.config.folder.trim_matches('/'),
            now.timestamp_millis(),
            nonce,
            sanitize_filename(filename)
        )
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/o/{}?alt=media",
            self.config.public_base_url.trim_end_matches('/'),
            urlencoding::encode(path)
        )
    }

    /// True when `url` was issued by this storage (same public base).
    pub fn owns_url(&self, url: &str) -> bool {
        let prefix = format!("{}/o/", self.config.public_base_url.trim_end_matches('/'));
        url.starts_with(&prefix)
    }

    /// Upload an (already compressed) image and return its public URL.
    pub async fn upload(&self, file: &ImageFile) -> BlobResult<UploadedBlob> {
        let size = file.bytes.len() as u64;
        if size == 0 {
            return Err(BlobError::invalid("Refusing to upload an empty file"));
        }
        if size > self.config.max_blob_bytes {
            return Err(BlobError::invalid(format!(
                "Blob size {} exceeds maximum {}",
                size, self.config.max_blob_bytes
            )));
        }

        let path = self.object_path(&file.name, Utc::now(), &path_nonce());
        let result = self
            .store
            .put(&path, Some(&file.content_type), file.bytes.clone())
            .await?;

        debug!(path = %path, size = result.size_bytes, "blob.upload");

        Ok(UploadedBlob {
            url: self.public_url(&path),
            path,
            size_bytes: result.size_bytes,
            content_type: file.content_type.clone(),
        })
    }

    /// Delete the blob a previously issued URL points at.
    pub async fn delete_by_url(&self, url: &str) -> BlobResult<()> {
        if !self.owns_url(url) {
            return Err(BlobError::invalid(format!(
                "URL was not issued by this blob storage: {url}"
            )));
        }

        let path = storage_path_from_url(url)?;
        self.store.delete(&path).await?;

        debug!(path = %path, "blob.delete");
        Ok(())
    }

    /// Whether the blob behind `url` still exists.
    pub async fn exists(&self, url: &str) -> BlobResult<bool> {
        let path = storage_path_from_url(url)?;
        Ok(self.store.head(&path).await?.is_some())
    }
}

fn path_nonce() -> String {
    let mut nonce = Uuid::new_v4().simple().to_string();
    nonce.truncate(12);
    nonce
}

/// Storage path encoded in the last `/`-delimited segment of a URL.
pub fn storage_path_from_url(url: &str) -> BlobResult<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);

    let segment = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BlobError::invalid(format!("No storage path in URL: {url}")))?;

    let decoded = urlencoding::decode(segment)
        .map_err(|e| BlobError::invalid(format!("Malformed storage path in URL {url}: {e}")))?;

    if decoded.trim().is_empty() {
        return Err(BlobError::invalid(format!("No storage path in URL: {url}")));
    }

    Ok(decoded.into_owned())
}

/// Keep `[A-Za-z0-9._-]`, replace everything else with `_`, collapse repeats.
pub fn sanitize_filename(name: &str) -> String {
    // Browsers may send a full client path.
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        let mapped = if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
            c
        } else {
            '_'
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_matches(|c| c == '_' || c == '.').to_string();
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBlobStore;
    use bytes::Bytes;
    use chrono::TimeZone;

    fn storage() -> (Arc<MemoryBlobStore>, BlobStorage) {
        let store = Arc::new(MemoryBlobStore::new());
        let cfg = BlobConfig::new()
            .with_folder("blog-images")
            .with_public_base_url("https://cdn.example.com/v0/b/site/");
        (Arc::clone(&store), BlobStorage::new(store, cfg))
    }

    fn file(name: &str, len: usize) -> ImageFile {
        ImageFile::new(name, "image/jpeg", Bytes::from(vec![7u8; len]))
    }

    #[test]
    fn object_path_is_timestamp_prefixed_and_sanitized() {
        let (_, storage) = storage();
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            storage.object_path("My Cover (final).JPG", now, "0a1b2c3d4e5f"),
            "blog-images/1700000000123-0a1b2c3d4e5f-My_Cover_final_.JPG"
        );
    }

    #[tokio::test]
    async fn same_name_uploads_get_distinct_paths() {
        let (store, storage) = storage();
        let first = storage.upload(&file("photo.jpg", 16)).await.unwrap();
        let second = storage
            .upload(&ImageFile::new("photo.jpg", "image/jpeg", Bytes::from(vec![9u8; 24])))
            .await
            .unwrap();

        assert_ne!(first.path, second.path);
        assert_ne!(first.url, second.url);
        assert_eq!(store.bytes(&first.path).await.unwrap().len(), 16);
        assert_eq!(store.bytes(&second.path).await.unwrap().len(), 24);
    }

    #[test]
    fn sanitize_strips_client_paths_and_falls_back() {
        assert_eq!(sanitize_filename("C:\\Users\\me\\hero shot.png"), "hero_shot.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("???"), "image");
    }

    #[test]
    fn path_is_recovered_from_the_last_encoded_segment() {
        let (_, storage) = storage();
        let url = storage.public_url("blog-images/1-a b.png");
        assert_eq!(
            url,
            "https://cdn.example.com/v0/b/site/o/blog-images%2F1-a%20b.png?alt=media"
        );
        assert_eq!(storage_path_from_url(&url).unwrap(), "blog-images/1-a b.png");
        assert_eq!(
            storage_path_from_url("https://x/o/blog-images%2F2-b.png?alt=media&token=t#frag").unwrap(),
            "blog-images/2-b.png"
        );
        assert!(storage_path_from_url("").is_err());
        assert!(storage_path_from_url("?alt=media").is_err());
    }

    #[tokio::test]
    async fn upload_then_delete_by_url() {
        let (store, storage) = storage();
        let uploaded = storage.upload(&file("cover.jpg", 16)).await.unwrap();

        assert!(uploaded.path.starts_with("blog-images/"));
        assert!(uploaded.path.ends_with("-cover.jpg"));
        assert!(store.contains(&uploaded.path).await);
        assert!(storage.exists(&uploaded.url).await.unwrap());

        storage.delete_by_url(&uploaded.url).await.unwrap();
        assert!(!store.contains(&uploaded.path).await);
        assert!(!storage.exists(&uploaded.url).await.unwrap());
    }

    #[tokio::test]
    async fn oversized_and_foreign_inputs_are_rejected_without_store_calls() {
        let (store, storage) = storage();
        let storage = BlobStorage::new(
            store.clone(),
            storage.config().clone().with_max_blob_bytes(8),
        );

        let err = storage.upload(&file("big.jpg", 9)).await.unwrap_err();
        assert!(matches!(err, BlobError::Invalid { .. }));
        assert!(store.is_empty().await);

        let err = storage
            .delete_by_url("https://images.unsplash.com/photo-1")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Invalid { .. }));
    }
}
