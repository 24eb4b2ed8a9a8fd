//! Read and write access to posts and categories.
//!
//! Listing issues one store query ordered by a single timestamp field, fetching
//! `limit * overfetch_factor` candidates, and applies the published / featured /
//! category filters in process. The store never sees a compound query on that
//! path, so no composite index is needed. Pages may come back short even when
//! more matching posts exist; `has_more` says whether another page might.

use std::collections::HashSet;
use std::sync::Arc;

use absterco_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::fallback::{sample_categories, sample_posts};
use crate::model::{BlogPost, Category};
use crate::store::{Direction, DocumentStore, Query};

pub const POSTS: &str = "blogPosts";
pub const CATEGORIES: &str = "categories";

pub const DEFAULT_OVERFETCH_FACTOR: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostOrder {
    #[default]
    PublishedAt,
    UpdatedAt,
    CreatedAt,
}

impl PostOrder {
    pub fn field(&self) -> &'static str {
        match self {
            PostOrder::PublishedAt => "publishedAt",
            PostOrder::UpdatedAt => "updatedAt",
            PostOrder::CreatedAt => "createdAt",
        }
    }

    fn key(&self, post: &BlogPost) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            PostOrder::PublishedAt => post.published_at,
            PostOrder::UpdatedAt => Some(post.updated_at),
            PostOrder::CreatedAt => post.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListPostsQuery {
    pub published: Option<bool>,
    pub featured: Option<bool>,
    pub category_id: Option<String>,
    pub limit: usize,
    pub order_by: PostOrder,
    pub direction: Direction,
    pub use_fallback: bool,
    pub overfetch_factor: usize,
}

impl Default for ListPostsQuery {
    fn default() -> Self {
        Self {
            published: None,
            featured: None,
            category_id: None,
            limit: 10,
            order_by: PostOrder::PublishedAt,
            direction: Direction::Desc,
            use_fallback: true,
            overfetch_factor: DEFAULT_OVERFETCH_FACTOR,
        }
    }
}

impl ListPostsQuery {
    fn matches(&self, post: &BlogPost) -> bool {
        self.published.is_none_or(|p| post.is_published == p)
            && self.featured.is_none_or(|f| post.is_featured == f)
            && self
                .category_id
                .as_deref()
                .is_none_or(|c| post.category.id == c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSource {
    Live,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<BlogPost>,
    pub has_more: bool,
    pub source: PostSource,
}

pub struct ContentRepository {
    store: Arc<dyn DocumentStore>,
}

impl ContentRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn list_posts(&self, query: &ListPostsQuery) -> AppResult<PostPage> {
        let limit = query.limit.max(1);
        let candidates = limit.saturating_mul(query.overfetch_factor.max(1));

        let store_query = Query::new()
            .order_by(query.order_by.field(), query.direction)
            .limit(candidates);

        let rows = match self.store.query(POSTS, &store_query).await {
            Ok(rows) => rows,
            Err(err) if query.use_fallback => {
                warn!(error = %err, "posts.list: store query failed, serving fallback");
                return Ok(Self::fallback_page(query, limit));
            }
            Err(err) => return Err(err),
        };

        let fetched = rows.len();
        let mut posts: Vec<BlogPost> = decode_rows(rows)
            .into_iter()
            .filter(|p| query.matches(p))
            .collect();

        if posts.is_empty() && query.use_fallback {
            debug!(fetched, "posts.list: no live matches, serving fallback");
            return Ok(Self::fallback_page(query, limit));
        }

        let has_more = fetched >= candidates || posts.len() > limit;
        posts.truncate(limit);

        Ok(PostPage {
            posts,
            has_more,
            source: PostSource::Live,
        })
    }

    fn fallback_page(query: &ListPostsQuery, limit: usize) -> PostPage {
        let mut posts: Vec<BlogPost> = sample_posts()
            .into_iter()
            .filter(|p| query.matches(p))
            .collect();

        let order = query.order_by;
        posts.sort_by(|a, b| match (order.key(a), order.key(b)) {
            (Some(a), Some(b)) => match query.direction {
                Direction::Asc => a.cmp(&b),
                Direction::Desc => b.cmp(&a),
            },
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        let has_more = posts.len() > limit;
        posts.truncate(limit);

        PostPage {
            posts,
            has_more,
            source: PostSource::Fallback,
        }
    }

    /// First published post with `slug`. Duplicate slugs cannot be written, so
    /// at most one live post matches.
    pub async fn get_post_by_slug(&self, slug: &str, use_fallback: bool) -> AppResult<Option<BlogPost>> {
        let query = Query::new()
            .where_eq("slug", slug)
            .where_eq("isPublished", true)
            .limit(1);

        let live = match self.store.query(POSTS, &query).await {
            Ok(rows) => decode_rows(rows).into_iter().next(),
            Err(err) if use_fallback => {
                warn!(error = %err, slug, "posts.by_slug: store query failed, trying fallback");
                None
            }
            Err(err) => return Err(err),
        };

        if live.is_some() || !use_fallback {
            return Ok(live);
        }

        Ok(sample_posts()
            .into_iter()
            .find(|p| p.slug == slug && p.is_published))
    }

    pub async fn get_post(&self, id: &str) -> AppResult<Option<BlogPost>> {
        match self.store.get(POSTS, id).await? {
            Some(doc) => decode(doc).map(Some),
            None => Ok(None),
        }
    }

    pub async fn require_post(&self, id: &str) -> AppResult<BlogPost> {
        self.get_post(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Post not found: {id}")).into_anyhow())
    }

    /// Every live post, most recently updated first. No fallback.
    pub async fn all_posts(&self) -> AppResult<Vec<BlogPost>> {
        let rows = self
            .store
            .query(POSTS, &Query::new().order_by("updatedAt", Direction::Desc))
            .await?;
        Ok(decode_rows(rows))
    }

    /// Slugs held by posts other than `exclude_id`.
    pub async fn taken_slugs(&self, exclude_id: Option<&str>) -> AppResult<HashSet<String>> {
        Ok(self
            .all_posts()
            .await?
            .into_iter()
            .filter(|p| Some(p.id.as_str()) != exclude_id)
            .map(|p| p.slug)
            .collect())
    }

    /// Number of posts other than `exclude_id` that use `url` as featured or
    /// author image.
    pub async fn image_references(&self, url: &str, exclude_id: &str) -> AppResult<usize> {
        Ok(self
            .all_posts()
            .await?
            .iter()
            .filter(|p| p.id != exclude_id)
            .filter(|p| p.image_url() == Some(url) || p.author_image_url() == Some(url))
            .count())
    }

    pub async fn create_post(&self, post: &BlogPost) -> AppResult<BlogPost> {
        let doc = serde_json::to_value(post).map_err(encode_error)?;
        decode(self.store.create(POSTS, doc).await?)
    }

    pub async fn update_post(&self, id: &str, patch: Value) -> AppResult<BlogPost> {
        decode(self.store.update(POSTS, id, patch).await?)
    }

    pub async fn delete_post(&self, id: &str) -> AppResult<()> {
        self.store.delete(POSTS, id).await
    }

    pub async fn list_categories(&self, use_fallback: bool) -> AppResult<Vec<Category>> {
        let query = Query::new().order_by("name", Direction::Asc);
        match self.store.query(CATEGORIES, &query).await {
            Ok(rows) => {
                let categories: Vec<Category> = rows
                    .into_iter()
                    .filter_map(|row| serde_json::from_value(row).ok())
                    .collect();
                if categories.is_empty() && use_fallback {
                    Ok(sample_categories())
                } else {
                    Ok(categories)
                }
            }
            Err(err) if use_fallback => {
                warn!(error = %err, "categories.list: store query failed, serving fallback");
                Ok(sample_categories())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get_category(&self, id: &str, use_fallback: bool) -> AppResult<Option<Category>> {
        let live = match self.store.get(CATEGORIES, id).await {
            Ok(Some(doc)) => Some(decode::<Category>(doc)?),
            Ok(None) => None,
            Err(err) if use_fallback => {
                warn!(error = %err, category_id = id, "categories.get: store read failed");
                None
            }
            Err(err) => return Err(err),
        };

        if live.is_some() || !use_fallback {
            return Ok(live);
        }
        Ok(sample_categories().into_iter().find(|c| c.id == id))
    }
}

fn decode<T: serde::de::DeserializeOwned>(doc: Value) -> AppResult<T> {
    serde_json::from_value(doc).map_err(|e| {
        AppError::repository("Stored document has an unexpected shape")
            .with_source(e.into())
            .into_anyhow()
    })
}

/// Malformed rows are skipped rather than failing the whole listing.
fn decode_rows(rows: Vec<Value>) -> Vec<BlogPost> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            match serde_json::from_value::<BlogPost>(row) {
                Ok(post) => Some(post),
                Err(e) => {
                    warn!(post_id = %id, error = %e, "posts: skipping malformed document");
                    None
                }
            }
        })
        .collect()
}

fn encode_error(e: serde_json::Error) -> anyhow::Error {
    AppError::repository("Failed to encode post document")
        .with_source(e.into())
        .into_anyhow()
}
