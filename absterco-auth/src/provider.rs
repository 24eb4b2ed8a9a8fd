// Identity provider: id token verification, session cookie minting and
// per-user revocation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use absterco_core::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::options::AuthOptions;

/// Identity extracted from a verified id token or session cookie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub email_verified: bool,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Check signature, expiry, issuer and audience of a client id token.
    async fn verify_id_token(&self, token: &str, check_revoked: bool) -> AppResult<VerifiedIdentity>;

    /// Exchange a valid id token for a signed session cookie value.
    async fn create_session_cookie(&self, id_token: &str, expires_in: Duration) -> AppResult<String>;

    async fn verify_session_cookie(&self, cookie: &str, check_revoked: bool) -> AppResult<VerifiedIdentity>;

    /// Invalidate every token and session issued to `uid` up to now.
    async fn revoke_refresh_tokens(&self, uid: &str) -> AppResult<()>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    aud: String,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

impl From<Claims> for VerifiedIdentity {
    fn from(c: Claims) -> Self {
        Self {
            uid: c.sub,
            email: c.email,
            name: c.name,
            email_verified: c.email_verified,
            issued_at: c.iat,
            expires_at: c.exp,
        }
    }
}

/// Which key and expectations a token is checked against
struct TokenKind<'a> {
    secret: &'a str,
    issuer: &'a str,
    audience: &'a str,
}

trait TokenCodec: Send + Sync {
    fn sign(&self, kind: &TokenKind<'_>, claims: &Claims) -> AppResult<String>;
    fn verify(&self, kind: &TokenKind<'_>, token: &str) -> AppResult<Claims>;
}

#[cfg(not(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto")))]
struct NoTokenCodec;

#[cfg(not(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto")))]
impl TokenCodec for NoTokenCodec {
    fn sign(&self, _kind: &TokenKind<'_>, _claims: &Claims) -> AppResult<String> {
        Err(AppError::general(
            "JWT support is disabled. Enable feature `jwt-aws-lc-rs` or `jwt-rust-crypto`.",
        )
        .into_anyhow())
    }

    fn verify(&self, _kind: &TokenKind<'_>, _token: &str) -> AppResult<Claims> {
        Err(AppError::general(
            "JWT support is disabled. Enable feature `jwt-aws-lc-rs` or `jwt-rust-crypto`.",
        )
        .into_anyhow())
    }
}

#[cfg(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto"))]
struct JsonwebtokenCodec;

#[cfg(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto"))]
impl TokenCodec for JsonwebtokenCodec {
    fn sign(&self, kind: &TokenKind<'_>, claims: &Claims) -> AppResult<String> {
        use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(kind.secret.as_bytes()),
        )
        .map_err(|e| AppError::general(format!("Failed to sign token: {e}")).into_anyhow())
    }

    fn verify(&self, kind: &TokenKind<'_>, token: &str) -> AppResult<Claims> {
        use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[kind.issuer]);
        validation.set_audience(&[kind.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(kind.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AppError::auth_invalid(format!("Invalid token: {e}")).into_anyhow())?;
        Ok(decoded.claims)
    }
}

fn default_codec() -> Arc<dyn TokenCodec> {
    #[cfg(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto"))]
    {
        Arc::new(JsonwebtokenCodec)
    }

    #[cfg(not(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto")))]
    {
        Arc::new(NoTokenCodec)
    }
}

/// HMAC-signed JWT identity provider.
///
/// Id tokens and session cookies use separate secrets, so a raw id token is
/// never accepted where a session is expected. Revocation is kept in memory
/// as a per-uid "valid after" timestamp.
pub struct JwtIdentityProvider {
    id_secret: String,
    id_issuer: String,
    audience: String,
    session_secret: String,
    session_issuer: String,
    revoked: RwLock<HashMap<String, i64>>,
    codec: Arc<dyn TokenCodec>,
}

impl JwtIdentityProvider {
    pub fn new(options: &AuthOptions) -> AppResult<Self> {
        options
            .validate()
            .map_err(|e| AppError::general(format!("Invalid auth configuration: {e}")).into_anyhow())?;

        Ok(Self {
            id_secret: options.id_token.secret.clone().unwrap_or_default(),
            id_issuer: options.id_token.issuer.clone(),
            audience: options.id_token.audience.clone(),
            session_secret: options.session.secret.clone().unwrap_or_default(),
            session_issuer: options.session.issuer.clone(),
            revoked: RwLock::new(HashMap::new()),
            codec: default_codec(),
        })
    }

    /// Mint an id token the way the provider's client SDK would. Used by tests
    /// and local tooling.
    pub fn sign_id_token(
        &self,
        uid: &str,
        email: Option<&str>,
        name: Option<&str>,
        ttl: Duration,
    ) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: uid.to_string(),
            iss: self.id_issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
            email: email.map(str::to_string),
            name: name.map(str::to_string),
            email_verified: email.is_some(),
        };
        self.codec.sign(&self.id_kind(), &claims)
    }

    fn id_kind(&self) -> TokenKind<'_> {
        TokenKind {
            secret: &self.id_secret,
            issuer: &self.id_issuer,
            audience: &self.audience,
        }
    }

    fn session_kind(&self) -> TokenKind<'_> {
        TokenKind {
            secret: &self.session_secret,
            issuer: &self.session_issuer,
            audience: &self.audience,
        }
    }

    fn ensure_not_revoked(&self, claims: &Claims) -> AppResult<()> {
        let revoked_at = self
            .revoked
            .read()
            .map_err(|_| AppError::general("Revocation list lock poisoned").into_anyhow())?
            .get(&claims.sub)
            .copied();

        match revoked_at {
            Some(at) if claims.iat <= at => {
                debug!(uid = %claims.sub, "auth.token_revoked");
                Err(AppError::auth_invalid("Token has been revoked").into_anyhow())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify_id_token(&self, token: &str, check_revoked: bool) -> AppResult<VerifiedIdentity> {
        let claims = self.codec.verify(&self.id_kind(), token)?;
        if check_revoked {
            self.ensure_not_revoked(&claims)?;
        }
        Ok(claims.into())
    }

    async fn create_session_cookie(&self, id_token: &str, expires_in: Duration) -> AppResult<String> {
        let identity = self.codec.verify(&self.id_kind(), id_token)?;
        self.ensure_not_revoked(&identity)?;

        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: self.session_issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + expires_in.as_secs() as i64,
            ..identity
        };
        self.codec.sign(&self.session_kind(), &claims)
    }

    async fn verify_session_cookie(&self, cookie: &str, check_revoked: bool) -> AppResult<VerifiedIdentity> {
        let claims = self.codec.verify(&self.session_kind(), cookie)?;
        if check_revoked {
            self.ensure_not_revoked(&claims)?;
        }
        Ok(claims.into())
    }

    async fn revoke_refresh_tokens(&self, uid: &str) -> AppResult<()> {
        let now = Utc::now().timestamp();
        self.revoked
            .write()
            .map_err(|_| AppError::general("Revocation list lock poisoned").into_anyhow())?
            .insert(uid.to_string(), now);
        info!(uid, "auth.tokens_revoked");
        Ok(())
    }
}
