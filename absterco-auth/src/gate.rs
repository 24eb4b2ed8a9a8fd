//! Server side of admin authentication.
//!
//! The gate authenticates anyone the identity provider knows but only
//! authorizes emails on the [`AdminAllowList`]. A valid token for any other
//! identity is rejected with [`ADMINISTRATORS_ONLY`] and no cookie is issued.

use std::sync::Arc;
use std::time::Duration;

use absterco_core::{AppError, AppResult, ErrorKind};
use http::HeaderMap;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::allowlist::AdminAllowList;
use crate::cookie::{read_cookie, SessionCookie};
use crate::options::{AuthOptions, CookieOptions};
use crate::provider::VerifiedIdentity;
use crate::session::{RejectReason, SessionContext, UserSnapshot};
use crate::strategy::{AuthStrategy, BypassStrategy, VerifiedStrategy};

pub const ADMINISTRATORS_ONLY: &str = "Access denied: administrators only";

/// Value of the bypass flag cookie.
const BYPASS_FLAG: &str = "1";

/// Successful verification: the user and the cookie to set.
#[derive(Clone, Debug)]
pub struct VerifiedSession {
    pub user: UserSnapshot,
    pub cookie: SessionCookie,
    pub bypass: bool,
}

pub struct SessionGate {
    strategy: AuthStrategy,
    allow_list: Arc<dyn AdminAllowList>,
    cookies: CookieOptions,
    session_ttl: Duration,
    login_path: String,
}

impl SessionGate {
    pub fn new(options: &AuthOptions, strategy: AuthStrategy, allow_list: Arc<dyn AdminAllowList>) -> Self {
        Self {
            strategy,
            allow_list,
            cookies: options.cookie.clone(),
            session_ttl: options.session.expires_in,
            login_path: options.login_path.clone(),
        }
    }

    pub fn is_bypass(&self) -> bool {
        self.strategy.is_bypass()
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Delay the login page waits before jumping to the admin area in bypass mode.
    pub fn bypass_redirect_delay(&self) -> Option<Duration> {
        match &self.strategy {
            AuthStrategy::Bypass(bypass) => Some(bypass.redirect_delay()),
            AuthStrategy::Verified(_) => None,
        }
    }

    /// Exchange a client id token for an admin session.
    pub async fn verify(&self, id_token: &str) -> AppResult<VerifiedSession> {
        match &self.strategy {
            AuthStrategy::Bypass(bypass) => Ok(self.bypass_session(bypass)),
            AuthStrategy::Verified(verified) => self.verified_session(verified, id_token).await,
        }
    }

    /// [`verify`](Self::verify) driven through `ctx`: `Verifying`, then
    /// `Authenticated` or `Rejected` with the reason.
    pub async fn sign_in(&self, ctx: &mut SessionContext, id_token: &str) -> AppResult<VerifiedSession> {
        ctx.begin_verification()
            .map_err(|e| AppError::conflict(e.to_string()).into_anyhow())?;

        let result = self.verify(id_token).await;
        let outcome = match &result {
            Ok(session) => Ok(session.user.clone()),
            Err(err) => Err(reject_reason(err)),
        };
        ctx.resolve(outcome)
            .map_err(|e| AppError::general(e.to_string()).into_anyhow())?;
        result
    }

    /// [`status`](Self::status) applied to `ctx`.
    pub async fn refresh(&self, ctx: &mut SessionContext, headers: &HeaderMap) -> AppResult<Option<UserSnapshot>> {
        let user = self.status(headers).await?;
        ctx.apply_status(user.clone());
        Ok(user)
    }

    /// Re-validate the cookies of a request. `None` means no valid session.
    pub async fn status(&self, headers: &HeaderMap) -> AppResult<Option<UserSnapshot>> {
        match &self.strategy {
            AuthStrategy::Bypass(bypass) => {
                let flagged = read_cookie(headers, &self.cookies.bypass_name).as_deref() == Some(BYPASS_FLAG);
                Ok(flagged.then(|| bypass.user().clone()))
            }
            AuthStrategy::Verified(verified) => {
                let Some(cookie) = read_cookie(headers, &self.cookies.name) else {
                    return Ok(None);
                };
                let identity = match verified.provider().verify_session_cookie(&cookie, true).await {
                    Ok(identity) => identity,
                    Err(err) => {
                        debug!(error = %err, "auth.session_invalid");
                        return Ok(None);
                    }
                };
                let Some(email) = identity.email.clone() else {
                    return Ok(None);
                };
                // Removal from the allow-list ends existing sessions too.
                if !self.allow_list.is_admin(&email).await? {
                    debug!(uid = %identity.uid, email = %email, "auth.session_no_longer_admin");
                    return Ok(None);
                }
                Ok(Some(snapshot(&identity, email)))
            }
        }
    }

    /// Like [`status`](Self::status) but a missing session is an `AuthInvalid` error.
    pub async fn authenticate(&self, headers: &HeaderMap) -> AppResult<UserSnapshot> {
        let mut ctx = SessionContext::new(self.login_path.clone());
        if let Some(user) = self.refresh(&mut ctx, headers).await? {
            return Ok(user);
        }
        Err(AppError::auth_invalid("Authentication required")
            .with_data(json!({ "redirect": ctx.on_unauthorized() }))
            .into_anyhow())
    }

    /// End the session of a request. Returns the cookies that clear it.
    ///
    /// Revoking the provider tokens is best effort: the cookies are cleared
    /// regardless.
    pub async fn sign_out(&self, headers: &HeaderMap) -> Vec<SessionCookie> {
        if let AuthStrategy::Verified(verified) = &self.strategy {
            if let Some(cookie) = read_cookie(headers, &self.cookies.name) {
                match verified.provider().verify_session_cookie(&cookie, false).await {
                    Ok(identity) => {
                        if let Err(err) = verified.provider().revoke_refresh_tokens(&identity.uid).await {
                            warn!(uid = %identity.uid, error = %err, "auth.revoke_failed");
                        } else {
                            info!(uid = %identity.uid, "auth.signed_out");
                        }
                    }
                    Err(err) => debug!(error = %err, "auth.sign_out_without_valid_session"),
                }
            }
        }

        vec![
            SessionCookie::clear(self.cookies.name.clone(), &self.cookies),
            SessionCookie::clear(self.cookies.bypass_name.clone(), &self.cookies),
        ]
    }

    fn bypass_session(&self, bypass: &BypassStrategy) -> VerifiedSession {
        warn!(uid = %bypass.user().uid, "auth.bypass_verification: issuing mock admin session");
        VerifiedSession {
            user: bypass.user().clone(),
            cookie: SessionCookie::new(self.cookies.bypass_name.clone(), BYPASS_FLAG, &self.cookies)
                .with_max_age(self.session_ttl),
            bypass: true,
        }
    }

    async fn verified_session(&self, verified: &VerifiedStrategy, id_token: &str) -> AppResult<VerifiedSession> {
        if id_token.trim().is_empty() {
            return Err(AppError::bad_request("idToken is required").into_anyhow());
        }

        let provider = verified.provider();
        let identity = provider.verify_id_token(id_token, true).await?;
        let email = identity
            .email
            .clone()
            .ok_or_else(|| AppError::auth_invalid("Token carries no email address").into_anyhow())?;

        if !self.allow_list.is_admin(&email).await? {
            warn!(uid = %identity.uid, email = %email, "auth.rejected_non_admin");
            return Err(AppError::auth_rejected(ADMINISTRATORS_ONLY)
                .with_data(json!({ "email": email }))
                .into_anyhow());
        }

        let session = provider.create_session_cookie(id_token, self.session_ttl).await?;
        info!(uid = %identity.uid, email = %email, "auth.session_created");

        Ok(VerifiedSession {
            user: snapshot(&identity, email),
            cookie: SessionCookie::new(self.cookies.name.clone(), session, &self.cookies)
                .with_max_age(self.session_ttl),
            bypass: false,
        })
    }
}

fn reject_reason(err: &absterco_core::errors::AnyError) -> RejectReason {
    match AppError::from_anyhow(err) {
        Some(app) if app.kind == ErrorKind::AuthRejected => RejectReason::NotAdministrator {
            email: app
                .data
                .as_ref()
                .and_then(|d| d.get("email"))
                .and_then(|e| e.as_str())
                .unwrap_or_default()
                .to_string(),
        },
        Some(app) => RejectReason::Invalid {
            message: app.message.clone(),
        },
        None => RejectReason::Invalid {
            message: err.to_string(),
        },
    }
}

fn snapshot(identity: &VerifiedIdentity, email: String) -> UserSnapshot {
    let name = identity
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    UserSnapshot {
        uid: identity.uid.clone(),
        email,
        name,
        is_admin: true,
    }
}
