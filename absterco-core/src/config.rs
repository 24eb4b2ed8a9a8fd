//! # Configuration
//!
//! A flat string key/value store. Keys are dotted (`auth.bypass`,
//! `blob.public_base_url`); typed option structs are built from a
//! [`AppConfigSnapshot`] once at startup.
//!
//! Environment variables map onto keys by stripping a prefix, lowercasing and
//! turning `__` into `.`:
//!
//! ```rust
//! use absterco_core::AppConfig;
//!
//! let cfg = AppConfig::from_pairs(
//!     [("ABSTERCO__HTTP__PORT".to_string(), "8080".to_string())],
//!     "ABSTERCO__",
//! );
//! assert_eq!(cfg.get("http.port"), Some("8080"));
//! ```

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Load every `PREFIX...` variable from the process environment.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_pairs(std::env::vars(), prefix)
    }

    pub fn from_pairs<I>(pairs: I, prefix: &str) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut cfg = Self::new();
        for (key, value) in pairs {
            if let Some(stripped) = key.strip_prefix(prefix) {
                // ABSTERCO__AUTH__BYPASS -> auth.bypass
                let normalized = stripped.to_lowercase().replace("__", ".");
                cfg.set(normalized, value);
            }
        }
        cfg
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn snapshot(&self) -> AppConfigSnapshot {
        AppConfigSnapshot::new(self.values.clone())
    }
}

/// Immutable view handed to option builders.
#[derive(Debug, Clone, Default)]
pub struct AppConfigSnapshot {
    map: HashMap<String, String>,
}

impl AppConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|s| s.to_string())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse::<f64>().ok())
    }

    /// Accepts `true/false`, `1/0`, `yes/no` and `on/off`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    /// Comma-separated list, blanks dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_pairs_are_normalized_and_foreign_keys_ignored() {
        let cfg = AppConfig::from_pairs(
            [
                ("ABSTERCO__AUTH__BYPASS".to_string(), "true".to_string()),
                ("ABSTERCO__BLOB__PUBLIC_BASE_URL".to_string(), "http://x".to_string()),
                ("PATH".to_string(), "/usr/bin".to_string()),
            ],
            "ABSTERCO__",
        );

        assert_eq!(cfg.get("auth.bypass"), Some("true"));
        assert_eq!(cfg.get("blob.public_base_url"), Some("http://x"));
        assert!(!cfg.has("path"));
    }

    #[test]
    fn snapshot_typed_getters() {
        let mut cfg = AppConfig::new();
        cfg.set("a.flag", "YES");
        cfg.set("a.bad", "maybe");
        cfg.set("a.n", "42");
        cfg.set("a.f", "0.85");
        cfg.set("a.list", "one@x.com, ,two@x.com");
        cfg.set("a.blank", "   ");

        let snap = cfg.snapshot();
        assert_eq!(snap.get_bool("a.flag"), Some(true));
        assert_eq!(snap.get_bool("a.bad"), None);
        assert_eq!(snap.get_usize("a.n"), Some(42));
        assert_eq!(snap.get_f64("a.f"), Some(0.85));
        assert_eq!(snap.get_list("a.list"), vec!["one@x.com", "two@x.com"]);
        assert_eq!(snap.get("a.blank"), None);
        assert!(snap.get_list("missing").is_empty());
    }
}
