//! Keeps a post document and the image blobs it points at consistent across
//! create, update and delete.
//!
//! Ordering rules:
//! - input validation and image decoding happen before anything is written
//! - new images are uploaded before the document write; if that write fails
//!   the fresh uploads are deleted again
//! - superseded or removed images are deleted only after the document write
//!   committed, and never while another post still references them
//! - on delete, blobs go first and the document last, so a crash in between
//!   leaves a dangling blob rather than a post pointing at nothing
//!
//! Cleanup failures never fail the operation. They come back as
//! [`CleanupWarning`]s next to the successful value.

use std::collections::HashSet;
use std::sync::Arc;

use absterco_blob::{smart_compress, BlobError, BlobStorage, CompressError, CompressionOptions, ImageFile};
use absterco_core::{validate, AppError, AppResult};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::model::{non_empty, BlogPost, Category, PostFields};
use crate::repository::ContentRepository;
use crate::text::{derive_excerpt, generate_slug, read_time, unique_slug};

/// What an update does to one image slot, given its stored and desired values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageDisposition {
    Unchanged,
    /// `previous` is `None` when the slot was empty before.
    Replaced { previous: Option<String>, next: String },
    Removed { previous: String },
}

impl ImageDisposition {
    /// `desired`: `None` keeps the stored value, `Some("")` removes it,
    /// `Some(url)` sets it.
    pub fn resolve(current: Option<&str>, desired: Option<&str>) -> Self {
        let current = non_empty(current);
        match desired {
            None => ImageDisposition::Unchanged,
            Some(d) if d.trim().is_empty() => match current {
                Some(previous) => ImageDisposition::Removed {
                    previous: previous.to_string(),
                },
                None => ImageDisposition::Unchanged,
            },
            Some(d) if Some(d) == current => ImageDisposition::Unchanged,
            Some(d) => ImageDisposition::Replaced {
                previous: current.map(str::to_string),
                next: d.to_string(),
            },
        }
    }

    /// Value the slot holds after the update.
    pub fn apply(&self, current: Option<String>) -> Option<String> {
        match self {
            ImageDisposition::Unchanged => current,
            ImageDisposition::Replaced { next, .. } => Some(next.clone()),
            ImageDisposition::Removed { .. } => Some(String::new()),
        }
    }

    /// Blob URL to delete once the document write has committed.
    fn released(&self) -> Option<(&str, CleanupAction)> {
        match self {
            ImageDisposition::Replaced {
                previous: Some(previous),
                ..
            } => Some((previous.as_str(), CleanupAction::DeleteSuperseded)),
            ImageDisposition::Removed { previous } => Some((previous.as_str(), CleanupAction::DeleteRemoved)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CleanupAction {
    /// Upload made for a write that then failed.
    DeleteOrphan,
    DeleteSuperseded,
    DeleteRemoved,
    DeleteCascade,
    /// Not deleted: another post still uses the blob.
    SkippedInUse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupWarning {
    pub url: String,
    pub action: CleanupAction,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleOutcome<T> {
    pub value: T,
    pub warnings: Vec<CleanupWarning>,
}

impl<T> LifecycleOutcome<T> {
    fn new(value: T, warnings: Vec<CleanupWarning>) -> Self {
        Self { value, warnings }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreatePost {
    pub fields: PostFields,
    pub image: Option<ImageFile>,
    pub author_image: Option<ImageFile>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePost {
    pub fields: PostFields,
    pub image: Option<ImageFile>,
    pub author_image: Option<ImageFile>,
    pub remove_image: bool,
    pub remove_author_image: bool,
}

#[derive(Debug, Default)]
struct Uploads {
    featured: Option<String>,
    author: Option<String>,
}

impl Uploads {
    fn urls(&self) -> impl Iterator<Item = &str> {
        self.featured.iter().chain(self.author.iter()).map(String::as_str)
    }
}

pub struct LifecycleManager {
    repo: Arc<ContentRepository>,
    storage: Arc<BlobStorage>,
    compression: CompressionOptions,
}

impl LifecycleManager {
    pub fn new(repo: Arc<ContentRepository>, storage: Arc<BlobStorage>, compression: CompressionOptions) -> Self {
        Self {
            repo,
            storage,
            compression,
        }
    }

    pub fn repository(&self) -> &Arc<ContentRepository> {
        &self.repo
    }

    pub async fn create(&self, input: CreatePost) -> AppResult<LifecycleOutcome<BlogPost>> {
        let CreatePost {
            fields,
            image,
            author_image,
        } = input;

        validate(&fields, "Post validation failed")?;
        let category = self.resolve_category(&fields.category_id).await?;
        let image = self.prepare(image, "image").await?;
        let author_image = self.prepare(author_image, "authorImage").await?;
        let taken = self.repo.taken_slugs(None).await?;

        let uploads = self.upload_images(image, author_image).await?;

        let now = Utc::now();
        let mut author = fields.author.clone();
        author.author_image = uploads
            .author
            .clone()
            .or_else(|| non_empty(author.author_image.as_deref()).map(str::to_string));

        let post = BlogPost {
            id: String::new(),
            slug: unique_slug(&generate_slug(&fields.title), &taken),
            title: fields.title.trim().to_string(),
            excerpt: derive_excerpt(&fields.content, fields.excerpt.as_deref()),
            read_time: read_time(&fields.content),
            content: fields.content,
            category,
            author,
            featured_image: uploads
                .featured
                .clone()
                .or_else(|| non_empty(fields.featured_image.as_deref()).map(str::to_string)),
            is_featured: fields.is_featured,
            is_published: fields.is_published,
            published_at: fields.is_published.then_some(now),
            created_at: None,
            updated_at: now,
        };

        match self.repo.create_post(&post).await {
            Ok(created) => {
                info!(post_id = %created.id, slug = %created.slug, "post.created");
                Ok(LifecycleOutcome::new(created, Vec::new()))
            }
            Err(err) => {
                self.discard_uploads(&uploads).await;
                Err(err)
            }
        }
    }

    pub async fn update(&self, id: &str, input: UpdatePost) -> AppResult<LifecycleOutcome<BlogPost>> {
        let UpdatePost {
            fields,
            image,
            author_image,
            remove_image,
            remove_author_image,
        } = input;

        validate(&fields, "Post validation failed")?;
        let current = self.repo.require_post(id).await?;
        let category = self.resolve_category(&fields.category_id).await?;
        let image = self.prepare(image, "image").await?;
        let author_image = self.prepare(author_image, "authorImage").await?;

        let title = fields.title.trim().to_string();
        let slug = if title == current.title {
            current.slug.clone()
        } else {
            let taken = self.repo.taken_slugs(Some(id)).await?;
            unique_slug(&generate_slug(&title), &taken)
        };

        // Omitted keeps a custom excerpt while the content is unchanged; "" re-derives.
        let excerpt = match fields.excerpt.as_deref() {
            None if fields.content == current.content => current.excerpt.clone(),
            supplied => derive_excerpt(&fields.content, supplied),
        };

        let uploads = self.upload_images(image, author_image).await?;

        let featured = ImageDisposition::resolve(
            current.featured_image.as_deref(),
            desired(&uploads.featured, remove_image, &fields.featured_image).as_deref(),
        );
        let author_disposition = ImageDisposition::resolve(
            current.author.author_image.as_deref(),
            desired(&uploads.author, remove_author_image, &fields.author.author_image).as_deref(),
        );

        let mut author = fields.author.clone();
        author.author_image = author_disposition.apply(current.author.author_image.clone());

        let now = Utc::now();
        let mut patch = json!({
            "title": title,
            "slug": slug,
            "content": fields.content,
            "excerpt": excerpt,
            "readTime": read_time(&fields.content),
            "category": category,
            "author": author,
            "isFeatured": fields.is_featured,
            "isPublished": fields.is_published,
            "updatedAt": now,
        });
        if fields.is_published && current.published_at.is_none() {
            patch["publishedAt"] = json!(now);
        }
        match &featured {
            ImageDisposition::Unchanged => {}
            ImageDisposition::Replaced { next, .. } => patch["featuredImage"] = json!(next),
            ImageDisposition::Removed { .. } => patch["featuredImage"] = json!(""),
        }

        let updated = match self.repo.update_post(id, patch).await {
            Ok(updated) => updated,
            Err(err) => {
                self.discard_uploads(&uploads).await;
                return Err(err);
            }
        };

        debug!(post_id = id, ?featured, author_image = ?author_disposition, "post.update.images");

        let mut warnings = Vec::new();
        for disposition in [&featured, &author_disposition] {
            if let Some((url, action)) = disposition.released() {
                warnings.extend(self.release_blob(url, &updated, action).await);
            }
        }

        info!(post_id = id, slug = %updated.slug, warnings = warnings.len(), "post.updated");
        Ok(LifecycleOutcome::new(updated, warnings))
    }

    /// Delete the post and, best effort, the blobs it owns.
    pub async fn delete(&self, id: &str) -> AppResult<LifecycleOutcome<BlogPost>> {
        let post = self.repo.require_post(id).await?;

        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        for url in [post.image_url(), post.author_image_url()].into_iter().flatten() {
            if seen.insert(url.to_string()) {
                warnings.extend(self.release_blob(url, &post, CleanupAction::DeleteCascade).await);
            }
        }

        self.repo.delete_post(id).await?;

        info!(post_id = id, warnings = warnings.len(), "post.deleted");
        Ok(LifecycleOutcome::new(post, warnings))
    }

    async fn resolve_category(&self, category_id: &str) -> AppResult<Category> {
        self.repo
            .get_category(category_id.trim(), true)
            .await?
            .ok_or_else(|| {
                AppError::validation("Post validation failed")
                    .with_errors(json!({ "categoryId": [format!("unknown category: {category_id}")] }))
                    .into_anyhow()
            })
    }

    /// Compress off the async workers. Undecodable input is a validation error.
    async fn prepare(&self, file: Option<ImageFile>, field: &str) -> AppResult<Option<ImageFile>> {
        let Some(file) = file else {
            return Ok(None);
        };

        let options = self.compression.clone();
        let result = tokio::task::spawn_blocking(move || smart_compress(&file, options))
            .await
            .map_err(|e| {
                AppError::general("Image compression task failed")
                    .with_source(e.into())
                    .into_anyhow()
            })?
            .map_err(|e| compress_error(field, e))?;

        debug!(
            field,
            original = result.original_size,
            compressed = result.compressed_size,
            ratio = result.compression_ratio,
            quality = result.quality,
            "image.compressed"
        );
        Ok(Some(result.file))
    }

    async fn upload_images(&self, featured: Option<ImageFile>, author: Option<ImageFile>) -> AppResult<Uploads> {
        let mut uploads = Uploads::default();

        if let Some(file) = featured {
            uploads.featured = Some(self.upload(&file).await?);
        }
        if let Some(file) = author {
            match self.upload(&file).await {
                Ok(url) => uploads.author = Some(url),
                Err(err) => {
                    self.discard_uploads(&uploads).await;
                    return Err(err);
                }
            }
        }

        Ok(uploads)
    }

    async fn upload(&self, file: &ImageFile) -> AppResult<String> {
        let uploaded = self.storage.upload(file).await.map_err(storage_error)?;
        Ok(uploaded.url)
    }

    async fn discard_uploads(&self, uploads: &Uploads) -> Vec<CleanupWarning> {
        let mut warnings = Vec::new();
        for url in uploads.urls() {
            if let Err(err) = self.storage.delete_by_url(url).await {
                warn!(url, error = %err, "image.cleanup: orphaned upload could not be deleted");
                warnings.push(CleanupWarning {
                    url: url.to_string(),
                    action: CleanupAction::DeleteOrphan,
                    message: err.to_string(),
                });
            }
        }
        warnings
    }

    /// Delete a blob `owner` no longer needs unless someone still uses it.
    async fn release_blob(&self, url: &str, owner: &BlogPost, action: CleanupAction) -> Option<CleanupWarning> {
        if !self.storage.owns_url(url) {
            debug!(url, "image.cleanup: external URL, nothing to delete");
            return None;
        }

        let still_on_owner = action != CleanupAction::DeleteCascade
            && (owner.image_url() == Some(url) || owner.author_image_url() == Some(url));

        let in_use = match self.repo.image_references(url, &owner.id).await {
            Ok(n) => n + usize::from(still_on_owner),
            Err(err) => {
                warn!(url, error = %err, "image.cleanup: reference check failed, keeping blob");
                return Some(CleanupWarning {
                    url: url.to_string(),
                    action,
                    message: format!("reference check failed: {err}"),
                });
            }
        };

        if in_use > 0 {
            info!(url, in_use, "image.cleanup: blob still referenced, kept");
            return Some(CleanupWarning {
                url: url.to_string(),
                action: CleanupAction::SkippedInUse,
                message: format!("still referenced by {in_use} post(s)"),
            });
        }

        match self.storage.delete_by_url(url).await {
            Ok(()) => {
                debug!(url, ?action, "image.cleanup.deleted");
                None
            }
            Err(err) => {
                warn!(url, ?action, error = %err, "image.cleanup: blob delete failed");
                Some(CleanupWarning {
                    url: url.to_string(),
                    action,
                    message: err.to_string(),
                })
            }
        }
    }
}

/// An uploaded file wins over the remove flag, which wins over the payload.
fn desired(uploaded: &Option<String>, remove: bool, payload: &Option<String>) -> Option<String> {
    uploaded
        .clone()
        .or_else(|| remove.then(String::new))
        .or_else(|| payload.clone())
}

fn compress_error(field: &str, err: CompressError) -> anyhow::Error {
    match err {
        CompressError::Decode(_) | CompressError::Empty => AppError::validation("image could not be decoded")
            .with_errors(json!({ field: [err.to_string()] }))
            .into_anyhow(),
        CompressError::Encode(_) | CompressError::WebP(_) => AppError::general("image could not be re-encoded")
            .with_source(err.into())
            .into_anyhow(),
    }
}

fn storage_error(err: BlobError) -> anyhow::Error {
    AppError::storage(format!("Image upload failed: {err}"))
        .with_source(err.into())
        .into_anyhow()
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "https://cdn/o/blog-images%2F1-a.jpg?alt=media";
    const B: &str = "https://cdn/o/blog-images%2F2-b.jpg?alt=media";

    #[test]
    fn omitted_or_equal_value_is_unchanged() {
        assert_eq!(ImageDisposition::resolve(Some(A), None), ImageDisposition::Unchanged);
        assert_eq!(ImageDisposition::resolve(Some(A), Some(A)), ImageDisposition::Unchanged);
        assert_eq!(ImageDisposition::resolve(None, Some("")), ImageDisposition::Unchanged);
        assert_eq!(ImageDisposition::resolve(Some(""), Some("")), ImageDisposition::Unchanged);
    }

    #[test]
    fn different_url_replaces_and_empty_removes() {
        assert_eq!(
            ImageDisposition::resolve(Some(A), Some(B)),
            ImageDisposition::Replaced {
                previous: Some(A.to_string()),
                next: B.to_string()
            }
        );
        assert_eq!(
            ImageDisposition::resolve(None, Some(B)),
            ImageDisposition::Replaced {
                previous: None,
                next: B.to_string()
            }
        );
        assert_eq!(
            ImageDisposition::resolve(Some(A), Some("")),
            ImageDisposition::Removed {
                previous: A.to_string()
            }
        );
    }

    #[test]
    fn apply_and_released_follow_disposition() {
        let current = Some(A.to_string());

        assert_eq!(ImageDisposition::Unchanged.apply(current.clone()), current);
        assert!(ImageDisposition::Unchanged.released().is_none());

        let removed = ImageDisposition::resolve(Some(A), Some(""));
        assert_eq!(removed.apply(current.clone()).as_deref(), Some(""));
        assert_eq!(removed.released(), Some((A, CleanupAction::DeleteRemoved)));

        let first_image = ImageDisposition::resolve(None, Some(B));
        assert!(first_image.released().is_none());
    }

    #[test]
    fn upload_beats_remove_flag_beats_payload() {
        let uploaded = Some(B.to_string());
        let payload = Some(A.to_string());
        assert_eq!(desired(&uploaded, true, &payload), uploaded);
        assert_eq!(desired(&None, true, &payload).as_deref(), Some(""));
        assert_eq!(desired(&None, false, &payload), payload);
        assert_eq!(desired(&None, false, &None), None);
    }
}
