//! # Errors
//!
//! Every layer of the backend reports failures as an [`AppError`] carried inside
//! `anyhow::Error`. The kind decides the HTTP status and the client-facing name:
//!
//! - `Validation`: bad or missing input, raised before any side effect
//! - `Storage`: blob upload/delete failure
//! - `Repository`: document read/write failure
//! - `NotFound`: the targeted document does not exist
//! - `AuthInvalid`: a token or session failed verification
//! - `AuthRejected`: a verified identity that is not an administrator
//!
//! The transport decides how to serialize; `to_json()` gives the canonical shape.

use std::fmt;

pub use anyhow::Error as AnyError;
use serde_json::Value;

/// Result type for the backend crates.
pub type AppResult<T> = std::result::Result<T, AnyError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,   // 400
    AuthInvalid,  // 401
    AuthRejected, // 403
    NotFound,     // 404
    Conflict,     // 409
    Validation,   // 422
    General,      // 500
    Storage,      // 502
    Repository,   // 503
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::AuthInvalid => 401,
            ErrorKind::AuthRejected => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Validation => 422,
            ErrorKind::General => 500,
            ErrorKind::Storage => 502,
            ErrorKind::Repository => 503,
        }
    }

    /// Error `name` as seen by clients (e.g. "ValidationError").
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::AuthInvalid => "AuthInvalid",
            ErrorKind::AuthRejected => "AuthRejected",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::General => "GeneralError",
            ErrorKind::Storage => "StorageError",
            ErrorKind::Repository => "RepositoryError",
        }
    }

    /// Kebab-cased `className`.
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::AuthInvalid => "auth-invalid",
            ErrorKind::AuthRejected => "auth-rejected",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::General => "general-error",
            ErrorKind::Storage => "storage",
            ErrorKind::Repository => "repository",
        }
    }
}

/// A structured error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<Value>,
    pub errors: Option<Value>,
    pub source: Option<AnyError>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            errors: None,
            source: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find an `AppError` anywhere in the chain of an `anyhow::Error`.
    pub fn from_anyhow(err: &AnyError) -> Option<&AppError> {
        err.chain().find_map(|e| e.downcast_ref::<AppError>())
    }

    /// Kind of an `anyhow::Error`, `General` when it carries no `AppError`.
    pub fn kind_of(err: &AnyError) -> ErrorKind {
        Self::from_anyhow(err).map(|e| e.kind).unwrap_or(ErrorKind::General)
    }

    /// Turn any error into an AppError:
    /// - if it is already an AppError, keep it
    /// - otherwise wrap as `General`
    pub fn normalize(err: AnyError) -> AppError {
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => AppError::general(other.to_string()).with_source(other),
        }
    }

    /// Client-safe copy: the inner `source` is dropped.
    pub fn sanitize_for_client(&self) -> AppError {
        AppError {
            kind: self.kind,
            message: self.message.clone(),
            data: self.data.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    pub fn to_json(&self) -> Value {
        use serde_json::json;

        let mut base = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });

        if let Some(d) = &self.data {
            base["data"] = d.clone();
        }
        if let Some(e) = &self.errors {
            base["errors"] = e.clone();
        }
        base
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, msg)
    }
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Repository, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn auth_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthInvalid, msg)
    }
    pub fn auth_rejected(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthRejected, msg)
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }
    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::General, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Return early with an `AppError` of the given constructor.
#[macro_export]
macro_rules! bail_app {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::AppError::$ctor($msg).into_anyhow())
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::AppError::$ctor(format!($fmt, $($arg)*)).into_anyhow())
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use serde_json::json;

    #[test]
    fn from_anyhow_sees_through_context_layers() {
        let err: AnyError = AppError::not_found("Post not found: p1").into_anyhow();
        let err = Err::<(), _>(err).context("loading post").unwrap_err();

        let app = AppError::from_anyhow(&err).expect("AppError in chain");
        assert_eq!(app.kind, ErrorKind::NotFound);
        assert_eq!(AppError::kind_of(&err), ErrorKind::NotFound);
    }

    #[test]
    fn normalize_wraps_foreign_errors_as_general() {
        let app = AppError::normalize(anyhow::anyhow!("boom"));
        assert_eq!(app.kind, ErrorKind::General);
        assert_eq!(app.code(), 500);
        assert!(app.source.is_some());
        assert!(app.sanitize_for_client().source.is_none());
    }

    #[test]
    fn to_json_carries_taxonomy_name_and_details() {
        let body = AppError::validation("Post validation failed")
            .with_errors(json!({"title": ["is required"]}))
            .to_json();

        assert_eq!(body["name"], "ValidationError");
        assert_eq!(body["code"], 422);
        assert_eq!(body["className"], "validation");
        assert_eq!(body["errors"]["title"][0], "is required");
        assert!(body.get("data").is_none());
    }

    #[test]
    fn bail_macro_returns_app_error() {
        fn check(flag: bool) -> AppResult<()> {
            if flag {
                bail_app!(auth_rejected, "Access denied: {} only", "administrators");
            }
            Ok(())
        }

        let err = check(true).unwrap_err();
        let app = AppError::from_anyhow(&err).unwrap();
        assert_eq!(app.kind, ErrorKind::AuthRejected);
        assert_eq!(app.message, "Access denied: administrators only");
        assert!(check(false).is_ok());
    }
}
