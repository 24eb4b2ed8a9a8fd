use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod admin_posts;
mod admin_users;
mod auth;
mod public;

pub use public::MAX_PAGE_SIZE;

/// Response header present on every response while the auth bypass is active.
pub const BYPASS_HEADER: &str = "x-auth-bypass";

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(public::routes())
        .merge(auth::routes())
        .merge(admin_users::routes())
        .merge(admin_posts::routes(state.server.max_upload_bytes))
        .with_state(state.clone());

    if state.gate.is_bypass() {
        router = router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(BYPASS_HEADER),
            HeaderValue::from_static("active"),
        ));
    }

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}
