// Admin user directory endpoints. Every route requires an admin session.

use absterco_content::{AdminUser, EditAdminUser, NewAdminUser, Role, SetupReport};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{map_json_rejection, map_query_rejection, ApiResult};
use crate::guard::AdminSession;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/setup", post(setup))
        .route("/api/admin/add-user", post(add_user))
        .route("/api/admin/update-role", post(update_role))
        .route("/api/admin/edit-user", post(edit_user))
        .route("/api/admin/delete-user", delete(delete_user))
        .route("/api/admin/users", get(list_users))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRoleRequest {
    user_id: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditUserRequest {
    user_id: String,
    #[serde(flatten)]
    changes: EditAdminUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdQuery {
    user_id: String,
}

async fn setup(AdminSession(admin): AdminSession, State(state): State<AppState>) -> ApiResult<Json<SetupReport>> {
    let report = state.users.setup(&state.bootstrap_admins).await?;
    info!(by = %admin.email, created = report.created.len(), existing = report.existing, "admin.setup");
    Ok(Json(report))
}

async fn add_user(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    body: Result<Json<NewAdminUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AdminUser>)> {
    let Json(input) = body.map_err(map_json_rejection)?;
    let user = state.users.add(input).await?;
    info!(by = %admin.email, user_id = %user.id, "admin.user_added");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_role(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    body: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> ApiResult<Json<AdminUser>> {
    let Json(req) = body.map_err(map_json_rejection)?;
    Ok(Json(state.users.update_role(&req.user_id, req.role).await?))
}

async fn edit_user(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    body: Result<Json<EditUserRequest>, JsonRejection>,
) -> ApiResult<Json<AdminUser>> {
    let Json(req) = body.map_err(map_json_rejection)?;
    Ok(Json(state.users.edit(&req.user_id, req.changes).await?))
}

async fn delete_user(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    query: Result<Query<UserIdQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query.map_err(map_query_rejection)?;
    let user = state.users.delete(&query.user_id).await?;
    info!(by = %admin.email, user_id = %user.id, "admin.user_deleted");
    Ok(Json(json!({ "success": true, "user": user })))
}

async fn list_users(AdminSession(_admin): AdminSession, State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "users": state.users.list().await? })))
}
