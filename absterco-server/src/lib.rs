//! # absterco-server
//!
//! axum HTTP surface of the Absterco site backend:
//!
//! - `/api/auth/*`: session verification, status and sign-out
//! - `/api/admin/*`: admin users and post management, session required
//! - `/api/posts`, `/api/categories`: public blog reads with sample fallback
//!
//! [`build`] wires everything from configuration; tests use
//! [`AbstercoApp::new`] with hand-built state.

pub mod allowlist;
pub mod config;
pub mod error;
pub mod guard;
pub mod multipart;
pub mod routes;
pub mod state;

use absterco_core::AppConfigSnapshot;
use anyhow::Result;
use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{info, warn};

pub use config::Settings;
pub use error::ApiError;
pub use state::AppState;

#[derive(Clone)]
pub struct AbstercoApp {
    pub state: AppState,
    pub router: Router,
}

impl AbstercoApp {
    pub fn new(state: AppState) -> Self {
        let router = routes::router(state.clone());
        Self { state, router }
    }

    pub async fn listen<A>(self, addr: A) -> Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "http.listening");
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

/// Build the app from configuration, connecting to the configured backends.
pub async fn build(cfg: &AppConfigSnapshot) -> Result<AbstercoApp> {
    let settings = Settings::from_config(cfg)?;
    let state = AppState::connect(&settings).await?;
    if state.gate.is_bypass() {
        warn!("auth.bypass_active: every response carries x-auth-bypass: active");
    }
    Ok(AbstercoApp::new(state))
}
