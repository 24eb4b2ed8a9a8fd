// Verification strategies. Chosen once at startup, never switched at runtime.

use std::sync::Arc;
use std::time::Duration;

use absterco_core::{AppError, AppResult};
use tracing::{error, warn};

use crate::options::{AuthOptions, Environment};
use crate::provider::{IdentityProvider, JwtIdentityProvider};
use crate::session::UserSnapshot;

pub const BYPASS_UID: &str = "dev-bypass-admin";
pub const BYPASS_EMAIL: &str = "admin@absterco.dev";
pub const BYPASS_NAME: &str = "Development Admin";

/// Real verification against the identity provider.
#[derive(Clone)]
pub struct VerifiedStrategy {
    provider: Arc<dyn IdentityProvider>,
}

impl VerifiedStrategy {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }
}

/// Development bypass: a fixed mock administrator and no cryptography.
#[derive(Clone, Debug)]
pub struct BypassStrategy {
    user: UserSnapshot,
    redirect_delay: Duration,
}

impl BypassStrategy {
    pub fn new(redirect_delay: Duration) -> Self {
        Self {
            user: UserSnapshot {
                uid: BYPASS_UID.to_string(),
                email: BYPASS_EMAIL.to_string(),
                name: BYPASS_NAME.to_string(),
                is_admin: true,
            },
            redirect_delay,
        }
    }

    pub fn user(&self) -> &UserSnapshot {
        &self.user
    }

    pub fn redirect_delay(&self) -> Duration {
        self.redirect_delay
    }
}

#[derive(Clone)]
pub enum AuthStrategy {
    Verified(VerifiedStrategy),
    Bypass(BypassStrategy),
}

impl AuthStrategy {
    /// Pick the strategy for this process.
    ///
    /// `provider` is only invoked on the verified path, so a development
    /// setup running in bypass mode needs no secrets.
    pub fn select<F>(options: &AuthOptions, provider: F) -> AppResult<Self>
    where
        F: FnOnce() -> AppResult<Arc<dyn IdentityProvider>>,
    {
        if bypass_permitted(options)? {
            warn!(
                uid = BYPASS_UID,
                email = BYPASS_EMAIL,
                "auth.bypass_active: admin authentication is DISABLED, never deploy this configuration"
            );
            return Ok(AuthStrategy::Bypass(BypassStrategy::new(options.bypass_redirect_delay)));
        }

        Ok(AuthStrategy::Verified(VerifiedStrategy::new(provider()?)))
    }

    /// Select with the bundled [`JwtIdentityProvider`].
    pub fn from_options(options: &AuthOptions) -> AppResult<Self> {
        Self::select(options, || {
            let provider: Arc<dyn IdentityProvider> = Arc::new(JwtIdentityProvider::new(options)?);
            Ok(provider)
        })
    }

    pub fn is_bypass(&self) -> bool {
        matches!(self, AuthStrategy::Bypass(_))
    }
}

fn bypass_permitted(options: &AuthOptions) -> AppResult<bool> {
    if !options.bypass {
        return Ok(false);
    }
    if options.environment == Environment::Production {
        return Err(AppError::general(
            "Authentication bypass cannot be enabled when environment is production",
        )
        .into_anyhow());
    }
    if cfg!(not(debug_assertions)) {
        error!("auth.bypass_ignored: bypass flag set on a release build, using verified authentication");
        return Ok(false);
    }
    Ok(true)
}
