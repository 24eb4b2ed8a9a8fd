// Post management for the admin console. Reads never fall back to sample
// content here.

use absterco_content::{BlogPost, CleanupWarning, LifecycleOutcome};
use absterco_core::AppError;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiResult;
use crate::guard::AdminSession;
use crate::multipart::PostForm;
use crate::state::AppState;

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/admin/posts", get(list_posts).post(create_post))
        .route(
            "/api/admin/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[derive(Debug, Serialize)]
struct PostResponse {
    post: BlogPost,
    warnings: Vec<CleanupWarning>,
}

impl From<LifecycleOutcome<BlogPost>> for PostResponse {
    fn from(outcome: LifecycleOutcome<BlogPost>) -> Self {
        Self {
            post: outcome.value,
            warnings: outcome.warnings,
        }
    }
}

async fn list_posts(AdminSession(_admin): AdminSession, State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let posts = state.repo.all_posts().await?;
    Ok(Json(json!({ "posts": posts })))
}

async fn get_post(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BlogPost>> {
    Ok(Json(state.repo.require_post(&id).await?))
}

async fn create_post(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<PostResponse>)> {
    let input = PostForm::parse(&headers, body).await?.into_create()?;
    let outcome = state.lifecycle.create(input).await?;
    info!(by = %admin.email, post_id = %outcome.value.id, "admin.post_created");
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

async fn update_post(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<PostResponse>> {
    if id.trim().is_empty() {
        return Err(AppError::bad_request("Post id is required").into_anyhow().into());
    }
    let input = PostForm::parse(&headers, body).await?.into_update()?;
    let outcome = state.lifecycle.update(&id, input).await?;
    info!(by = %admin.email, post_id = %id, warnings = outcome.warnings.len(), "admin.post_updated");
    Ok(Json(outcome.into()))
}

async fn delete_post(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let outcome = state.lifecycle.delete(&id).await?;
    info!(by = %admin.email, post_id = %id, warnings = outcome.warnings.len(), "admin.post_deleted");
    Ok(Json(json!({
        "success": true,
        "post": outcome.value,
        "warnings": outcome.warnings,
    })))
}
