// Typed settings built once at startup from the `ABSTERCO__*` configuration.

use std::time::Duration;

use absterco_auth::AuthOptions;
use absterco_blob::{BlobConfig, CompressionOptions, OutputFormat, S3Config};
use absterco_content::FirestoreSettings;
use absterco_core::{AppConfigSnapshot, AppError, AppResult};

/// Environment prefix of every configuration variable.
pub const ENV_PREFIX: &str = "ABSTERCO__";

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Request body limit of the post upload endpoints
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            max_upload_bytes: 25 * 1024 * 1024, // 25MB
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub enum StoreSettings {
    Memory,
    Firestore(FirestoreSettings),
}

#[derive(Debug, Clone)]
pub enum BlobBackend {
    Memory,
    S3(S3Config),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthOptions,
    pub store: StoreSettings,
    pub blob: BlobConfig,
    pub blob_backend: BlobBackend,
    pub compression: CompressionOptions,
}

impl Settings {
    pub fn from_config(cfg: &AppConfigSnapshot) -> AppResult<Self> {
        let mut auth = AuthOptions::from_config(cfg).map_err(|e| AppError::bad_request(e).into_anyhow())?;
        if let Some(path) = cfg.get_string("http.login_path") {
            auth.login_path = path;
        }

        Ok(Self {
            server: server_settings(cfg)?,
            auth,
            store: store_settings(cfg)?,
            blob: blob_config(cfg),
            blob_backend: blob_backend(cfg)?,
            compression: compression_options(cfg)?,
        })
    }
}

fn server_settings(cfg: &AppConfigSnapshot) -> AppResult<ServerSettings> {
    let mut server = ServerSettings::default();
    if let Some(host) = cfg.get_string("http.host") {
        server.host = host;
    }
    if let Some(port) = cfg.get("http.port") {
        server.port = port
            .parse()
            .map_err(|_| AppError::bad_request(format!("Invalid http.port '{port}'")).into_anyhow())?;
    }
    if let Some(bytes) = cfg.get_usize("http.max_upload_bytes") {
        server.max_upload_bytes = bytes;
    }
    Ok(server)
}

fn store_settings(cfg: &AppConfigSnapshot) -> AppResult<StoreSettings> {
    match cfg.get("store.backend").unwrap_or("memory") {
        "memory" => Ok(StoreSettings::Memory),
        "firestore" => {
            let project_id = cfg
                .get_string("firestore.project_id")
                .ok_or_else(|| AppError::bad_request("firestore.project_id is required").into_anyhow())?;
            let mut settings = FirestoreSettings::new(project_id);
            if let Some(database) = cfg.get_string("firestore.database") {
                settings.database = database;
            }
            settings.emulator_host = cfg.get_string("firestore.emulator_host");
            settings.access_token = cfg.get_string("firestore.access_token");
            if let Some(secs) = cfg.get_u64("firestore.timeout_secs") {
                settings.timeout = Duration::from_secs(secs);
            }
            Ok(StoreSettings::Firestore(settings))
        }
        other => Err(AppError::bad_request(format!("Unknown store.backend '{other}'")).into_anyhow()),
    }
}

fn blob_config(cfg: &AppConfigSnapshot) -> BlobConfig {
    let mut blob = BlobConfig::new();
    if let Some(folder) = cfg.get_string("blob.folder") {
        blob = blob.with_folder(folder);
    }
    if let Some(base) = cfg.get_string("blob.public_base_url") {
        blob = blob.with_public_base_url(base);
    }
    if let Some(bytes) = cfg.get_u64("blob.max_blob_bytes") {
        blob = blob.with_max_blob_bytes(bytes);
    }
    blob
}

fn blob_backend(cfg: &AppConfigSnapshot) -> AppResult<BlobBackend> {
    match cfg.get("blob.backend").unwrap_or("memory") {
        "memory" => Ok(BlobBackend::Memory),
        "s3" => {
            let required = |key: &str| {
                cfg.get_string(key)
                    .ok_or_else(|| AppError::bad_request(format!("{key} is required")).into_anyhow())
            };
            Ok(BlobBackend::S3(S3Config {
                region: cfg.get_string("s3.region").unwrap_or_else(|| "us-east-1".to_string()),
                endpoint_url: cfg.get_string("s3.endpoint_url"),
                access_key_id: required("s3.access_key_id")?,
                secret_access_key: required("s3.secret_access_key")?,
                bucket: cfg
                    .get_string("blob.bucket")
                    .or_else(|| cfg.get_string("s3.bucket"))
                    .ok_or_else(|| AppError::bad_request("blob.bucket is required").into_anyhow())?,
                force_path_style: cfg.get_bool("s3.force_path_style").unwrap_or(true),
            }))
        }
        other => Err(AppError::bad_request(format!("Unknown blob.backend '{other}'")).into_anyhow()),
    }
}

fn compression_options(cfg: &AppConfigSnapshot) -> AppResult<CompressionOptions> {
    let mut options = CompressionOptions::default();
    if let Some(w) = cfg.get_u64("images.max_width") {
        options.max_width = w as u32;
    }
    if let Some(h) = cfg.get_u64("images.max_height") {
        options.max_height = h as u32;
    }
    if let Some(q) = cfg.get_f64("images.quality") {
        if !(0.0..=1.0).contains(&q) {
            return Err(AppError::bad_request("images.quality must be between 0 and 1").into_anyhow());
        }
        options.quality = q as f32;
    }
    if let Some(mb) = cfg.get_f64("images.max_size_mb") {
        options.max_size_mb = mb;
    }
    if let Some(format) = cfg.get("images.format") {
        options.format = match format.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => OutputFormat::Jpeg,
            "png" => OutputFormat::Png,
            "webp" => OutputFormat::WebP,
            "webp-lossless" => OutputFormat::WebPLossless,
            other => {
                return Err(AppError::bad_request(format!("Unknown images.format '{other}'")).into_anyhow())
            }
        };
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use absterco_core::AppConfig;

    #[test]
    fn defaults_to_in_memory_backends() {
        let settings = Settings::from_config(&AppConfig::new().snapshot()).unwrap();
        assert!(matches!(settings.store, StoreSettings::Memory));
        assert!(matches!(settings.blob_backend, BlobBackend::Memory));
        assert_eq!(settings.server.addr(), "127.0.0.1:3030");
        assert_eq!(settings.compression, CompressionOptions::default());
    }

    #[test]
    fn env_variables_map_to_nested_keys() {
        let cfg = AppConfig::from_pairs(
            vec![
                ("ABSTERCO__HTTP__PORT".to_string(), "8080".to_string()),
                ("ABSTERCO__HTTP__LOGIN_PATH".to_string(), "/login".to_string()),
                ("ABSTERCO__STORE__BACKEND".to_string(), "firestore".to_string()),
                ("ABSTERCO__FIRESTORE__PROJECT_ID".to_string(), "absterco-site".to_string()),
                ("ABSTERCO__FIRESTORE__EMULATOR_HOST".to_string(), "localhost:8081".to_string()),
                ("ABSTERCO__IMAGES__FORMAT".to_string(), "webp".to_string()),
                ("UNRELATED".to_string(), "x".to_string()),
            ],
            ENV_PREFIX,
        );
        let settings = Settings::from_config(&cfg.snapshot()).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.auth.login_path, "/login");
        assert_eq!(settings.compression.format, OutputFormat::WebP);
        match settings.store {
            StoreSettings::Firestore(fs) => {
                assert_eq!(fs.project_id, "absterco-site");
                assert_eq!(fs.emulator_host.as_deref(), Some("localhost:8081"));
            }
            StoreSettings::Memory => panic!("expected firestore"),
        }
    }

    #[test]
    fn incomplete_backends_are_rejected() {
        let mut cfg = AppConfig::new();
        cfg.set("blob.backend", "s3");
        assert!(Settings::from_config(&cfg.snapshot()).is_err());

        let mut cfg = AppConfig::new();
        cfg.set("store.backend", "postgres");
        assert!(Settings::from_config(&cfg.snapshot()).is_err());

        let mut cfg = AppConfig::new();
        cfg.set("images.quality", "85");
        assert!(Settings::from_config(&cfg.snapshot()).is_err());
    }
}
