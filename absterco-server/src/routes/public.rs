// Public blog API. Reads fall back to sample content when the store is empty
// or unreachable.

use absterco_content::{BlogPost, Direction, ListPostsQuery, PostOrder, PostPage};
use absterco_core::AppError;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{map_query_rejection, ApiResult};
use crate::state::AppState;

pub const MAX_PAGE_SIZE: usize = 50;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts))
        .route("/api/posts/{slug}", get(post_by_slug))
        .route("/api/categories", get(list_categories))
        .route("/health", get(|| async { "ok" }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostsParams {
    published: Option<bool>,
    featured: Option<bool>,
    category_id: Option<String>,
    limit: Option<usize>,
    order_by: Option<PostOrder>,
    direction: Option<Direction>,
}

impl PostsParams {
    fn into_query(self) -> Result<ListPostsQuery, AppError> {
        if self.published == Some(false) {
            return Err(AppError::bad_request("Unpublished posts are only available to administrators"));
        }
        let defaults = ListPostsQuery::default();
        Ok(ListPostsQuery {
            published: Some(true),
            featured: self.featured,
            category_id: self.category_id.filter(|c| !c.is_empty()),
            limit: self.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_SIZE),
            order_by: self.order_by.unwrap_or(defaults.order_by),
            direction: self.direction.unwrap_or(defaults.direction),
            use_fallback: true,
            ..defaults
        })
    }
}

async fn list_posts(
    State(state): State<AppState>,
    params: Result<Query<PostsParams>, QueryRejection>,
) -> ApiResult<Json<PostPage>> {
    let Query(params) = params.map_err(map_query_rejection)?;
    let query = params.into_query().map_err(AppError::into_anyhow)?;
    Ok(Json(state.repo.list_posts(&query).await?))
}

async fn post_by_slug(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<BlogPost>> {
    let post = state
        .repo
        .get_post_by_slug(&slug, true)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Post not found: {slug}")).into_anyhow())?;
    Ok(Json(post))
}

async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let categories = state.repo.list_categories(true).await?;
    Ok(Json(json!({ "categories": categories })))
}
