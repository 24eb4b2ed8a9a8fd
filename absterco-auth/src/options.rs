// Session gate options and configuration.

use std::str::FromStr;
use std::time::Duration;

use absterco_core::AppConfigSnapshot;
use serde::{Deserialize, Serialize};

/// Deployment environment the process runs in
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("Unknown environment '{other}'")),
        }
    }
}

/// `SameSite` attribute of issued cookies
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => Err(format!("Unknown SameSite value '{other}'")),
        }
    }
}

/// Identity tokens minted by the identity provider's client SDK
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdTokenOptions {
    /// HMAC secret shared with the provider
    pub secret: Option<String>,
    /// Expected `iss` claim
    pub issuer: String,
    /// Expected `aud` claim (the project id)
    pub audience: String,
}

impl Default for IdTokenOptions {
    fn default() -> Self {
        Self {
            secret: None,
            issuer: "https://securetoken.absterco.dev".to_string(),
            audience: "absterco-site".to_string(),
        }
    }
}

/// Session cookies issued by this server after verification
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionOptions {
    /// HMAC secret for session cookies, distinct from the id token secret
    pub secret: Option<String>,
    /// `iss` claim written into session cookies
    pub issuer: String,
    /// Session lifetime
    #[serde(with = "humantime_serde")]
    pub expires_in: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            secret: None,
            issuer: "absterco-session".to_string(),
            expires_in: Duration::from_secs(5 * 24 * 60 * 60), // 5 days
        }
    }
}

/// Cookie names and attributes
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CookieOptions {
    /// Signed session cookie
    pub name: String,
    /// Non-cryptographic flag cookie used in bypass mode
    pub bypass_name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "__session".to_string(),
            bypass_name: "absterco_bypass".to_string(),
            secure: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
        }
    }
}

/// Main session gate configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthOptions {
    /// Development bypass flag. Read once at startup.
    pub bypass: bool,
    pub environment: Environment,
    /// Emails always allowed into the admin console
    pub admin_emails: Vec<String>,
    pub id_token: IdTokenOptions,
    pub session: SessionOptions,
    pub cookie: CookieOptions,
    /// Where unauthenticated admin requests are sent
    pub login_path: String,
    /// Cosmetic delay the login page waits before redirecting in bypass mode
    #[serde(with = "humantime_serde")]
    pub bypass_redirect_delay: Duration,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            bypass: false,
            environment: Environment::Development,
            admin_emails: Vec::new(),
            id_token: IdTokenOptions::default(),
            session: SessionOptions::default(),
            cookie: CookieOptions::default(),
            login_path: "/admin/login".to_string(),
            bypass_redirect_delay: Duration::from_millis(1000),
        }
    }
}

impl AuthOptions {
    /// Build from `auth.*` configuration keys; unset keys keep their defaults.
    pub fn from_config(cfg: &AppConfigSnapshot) -> Result<Self, String> {
        let mut options = Self::default();

        if let Some(bypass) = cfg.get_bool("auth.bypass") {
            options.bypass = bypass;
        }
        if let Some(env) = cfg.get("auth.environment") {
            options.environment = env.parse()?;
        }
        options.admin_emails = cfg
            .get_list("auth.admin_emails")
            .into_iter()
            .map(|e| e.to_lowercase())
            .collect();

        if let Some(secret) = cfg.get_string("auth.id_token.secret") {
            options.id_token.secret = Some(secret);
        }
        if let Some(issuer) = cfg.get_string("auth.id_token.issuer") {
            options.id_token.issuer = issuer;
        }
        if let Some(audience) = cfg.get_string("auth.id_token.audience") {
            options.id_token.audience = audience;
        }

        if let Some(secret) = cfg.get_string("auth.session.secret") {
            options.session.secret = Some(secret);
        }
        if let Some(issuer) = cfg.get_string("auth.session.issuer") {
            options.session.issuer = issuer;
        }
        if let Some(expires_in) = cfg.get("auth.session.expires_in") {
            options.session.expires_in = parse_duration("auth.session.expires_in", expires_in)?;
        }

        if let Some(name) = cfg.get_string("auth.cookie.name") {
            options.cookie.name = name;
        }
        if let Some(name) = cfg.get_string("auth.cookie.bypass_name") {
            options.cookie.bypass_name = name;
        }
        if let Some(secure) = cfg.get_bool("auth.cookie.secure") {
            options.cookie.secure = secure;
        }
        if let Some(same_site) = cfg.get("auth.cookie.same_site") {
            options.cookie.same_site = same_site.parse()?;
        }
        if let Some(path) = cfg.get_string("auth.cookie.path") {
            options.cookie.path = path;
        }

        if let Some(path) = cfg.get_string("auth.login_path") {
            options.login_path = path;
        }
        if let Some(delay) = cfg.get("auth.bypass_redirect_delay") {
            options.bypass_redirect_delay = parse_duration("auth.bypass_redirect_delay", delay)?;
        }

        Ok(options)
    }

    /// Validate the configuration for the verified (non-bypass) path
    pub fn validate(&self) -> Result<(), String> {
        if self.id_token.secret.as_deref().is_none_or(|s| s.is_empty()) {
            return Err("auth.id_token.secret is required".to_string());
        }
        if self.session.secret.as_deref().is_none_or(|s| s.is_empty()) {
            return Err("auth.session.secret is required".to_string());
        }
        if self.id_token.issuer.is_empty() || self.id_token.audience.is_empty() {
            return Err("Identity token issuer and audience cannot be empty".to_string());
        }
        if self.session.expires_in.as_secs() == 0 {
            return Err("Session expiration must be greater than 0".to_string());
        }
        if self.cookie.name.is_empty() || self.cookie.bypass_name.is_empty() {
            return Err("Cookie names cannot be empty".to_string());
        }
        if self.cookie.name == self.cookie.bypass_name {
            return Err("Session and bypass cookies must have different names".to_string());
        }
        if self.cookie.same_site == SameSite::None && !self.cookie.secure {
            return Err("SameSite=None cookies must be Secure".to_string());
        }
        if !self.login_path.starts_with('/') {
            return Err("Login path must be an absolute path".to_string());
        }
        Ok(())
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value)
        .map_err(|e| format!("Invalid duration for {key}: {e}"))
}
