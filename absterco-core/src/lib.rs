//! absterco-core: error taxonomy, configuration and validation shared by every
//! Absterco backend crate.

pub mod config;
pub mod errors;
pub mod validation;

pub use config::{AppConfig, AppConfigSnapshot};
pub use errors::{AppError, AppResult, ErrorKind};
pub use validation::validate;
