use absterco_auth::{SessionContext, SessionCookie};
use absterco_core::AppResult;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{map_json_rejection, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/verify", post(verify))
        .route("/api/auth/status", get(status))
        .route("/api/auth/logout", post(logout))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest {
    #[serde(default)]
    id_token: String,
}

async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<(HeaderMap, Json<Value>)> {
    let Json(body) = body.map_err(map_json_rejection)?;
    let mut ctx = SessionContext::new(state.gate.login_path());
    let session = state.gate.sign_in(&mut ctx, &body.id_token).await?;

    let mut payload = json!({
        "success": true,
        "user": session.user,
        "bypass": session.bypass,
    });
    if let Some(delay) = state.gate.bypass_redirect_delay() {
        payload["redirectDelayMs"] = json!(delay.as_millis() as u64);
    }

    Ok((set_cookies(&[session.cookie])?, Json(payload)))
}

async fn status(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let mut ctx = SessionContext::new(state.gate.login_path());
    let user = state.gate.refresh(&mut ctx, &headers).await?;
    let mut payload = json!({
        "authenticated": ctx.is_authenticated(),
        "bypass": state.gate.is_bypass(),
    });
    if let Some(user) = user {
        payload["user"] = json!(user);
    }
    Ok(Json(payload))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<(HeaderMap, Json<Value>)> {
    let cleared = state.gate.sign_out(&headers).await;
    Ok((
        set_cookies(&cleared)?,
        Json(json!({ "success": true, "redirect": state.gate.login_path() })),
    ))
}

fn set_cookies(cookies: &[SessionCookie]) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        headers.append(SET_COOKIE, cookie.to_header_value()?);
    }
    Ok(headers)
}
