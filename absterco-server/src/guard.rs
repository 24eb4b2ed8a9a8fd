// Admin route guard.

use absterco_auth::UserSnapshot;
use absterco_core::{AppError, ErrorKind};
use axum::extract::FromRequestParts;
use axum::http::header::ACCEPT;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// The signed-in administrator of an admin request.
///
/// Without a valid session the request is answered with 401 and
/// `data.redirect`, or with a 303 to the login page when the client asked
/// for HTML.
#[derive(Clone, Debug)]
pub struct AdminSession(pub UserSnapshot);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.gate.authenticate(&parts.headers).await {
            Ok(user) => Ok(AdminSession(user)),
            Err(err) if AppError::kind_of(&err) == ErrorKind::AuthInvalid && wants_html(parts) => {
                Err(Redirect::to(state.gate.login_path()).into_response())
            }
            Err(err) => Err(ApiError(err).into_response()),
        }
    }
}

fn wants_html(parts: &Parts) -> bool {
    parts
        .headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}
