use absterco_core::AppError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Any handler error, rendered as `{name, message, code, className, data?, errors?}`.
#[derive(Debug)]
pub struct ApiError(pub anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let app = match AppError::from_anyhow(&self.0) {
            Some(app) => app.sanitize_for_client(),
            None => {
                // Anything that is not an AppError is unexpected; do not leak its text.
                error!(error = ?self.0, "http.unhandled_error");
                AppError::general("Internal server error")
            }
        };

        if app.code() >= 500 {
            error!(name = app.name(), message = %app.message, "http.server_error");
        }

        let status = StatusCode::from_u16(app.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(app.to_json())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn map_json_rejection(rejection: JsonRejection) -> ApiError {
    AppError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({ "_schema": [rejection.body_text()] }))
        .into_anyhow()
        .into()
}

pub fn map_query_rejection(rejection: QueryRejection) -> ApiError {
    AppError::bad_request("Invalid query parameters")
        .with_errors(json!({ "_query": [rejection.body_text()] }))
        .into_anyhow()
        .into()
}
