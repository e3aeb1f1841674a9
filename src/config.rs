//! Configuration loaded from `fieldops.toml`.
//!
//! Every field has a default. `FIELDOPS_API_URL`, `FIELDOPS_API_TOKEN` and
//! `FIELDOPS_TENANT_KEY` take precedence over the file. There is no default
//! tenant key: commands that touch the offline queue fail until one is set.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::api::ApiClient;
use crate::error::FieldopsError;
use crate::offline::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_STORAGE_KEY, KdfParams, QueueOptions, TenantKey,
};

pub const DEFAULT_CONFIG_FILE: &str = "fieldops.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct FieldopsConfig {
    /// Base URL of the backend REST API, e.g. `https://api.example.com/v1`.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Bearer token sent with every backend request.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Secret the offline queue key is derived from.
    #[serde(default)]
    pub tenant_key: Option<String>,

    /// Directory holding the sealed queue file.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Storage key of the queue; the file is `<queue_key>.dat`.
    #[serde(default = "default_queue_key")]
    pub queue_key: String,

    /// Failed replays before a sale is set aside as failed.
    #[serde(default = "default_max_replay_attempts")]
    pub max_replay_attempts: u32,

    /// Argon2id memory cost in KiB.
    #[serde(default = "default_kdf_memory_kib")]
    pub kdf_memory_kib: u32,

    /// Argon2id passes.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// The `[logging]` table.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default storage directory: `.fieldops` under the working directory.
fn default_storage_dir() -> PathBuf {
    PathBuf::from(".fieldops")
}

// Default queue key: "offline_sales".
fn default_queue_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

// Default attempt budget: 5.
fn default_max_replay_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

// Default memory cost: 19 MiB.
fn default_kdf_memory_kib() -> u32 {
    KdfParams::default().memory_kib
}

// Default passes: 2.
fn default_kdf_iterations() -> u32 {
    KdfParams::default().iterations
}

// Default log level: "info".
fn default_log_level() -> String {
    "info".to_string()
}

// Default log format: "pretty".
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for FieldopsConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            tenant_key: None,
            storage_dir: default_storage_dir(),
            queue_key: default_queue_key(),
            max_replay_attempts: default_max_replay_attempts(),
            kdf_memory_kib: default_kdf_memory_kib(),
            kdf_iterations: default_kdf_iterations(),
            logging: LoggingConfig::default(),
        }
    }
}

impl FieldopsConfig {
    /// Load from `path`, or from `fieldops.toml` in the current directory.
    /// A missing default file means defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, FieldopsError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, FieldopsError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FieldopsError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Environment values win over the file; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = get("FIELDOPS_API_URL") {
            self.api_url = Some(url);
        }
        if let Some(token) = get("FIELDOPS_API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(key) = get("FIELDOPS_TENANT_KEY") {
            self.tenant_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), FieldopsError> {
        if self.max_replay_attempts == 0 {
            return Err(FieldopsError::Config(
                "max_replay_attempts must be at least 1".into(),
            ));
        }
        if self.queue_key.trim().is_empty() {
            return Err(FieldopsError::Config("queue_key must not be empty".into()));
        }
        Ok(())
    }

    pub fn tenant_key(&self) -> Result<TenantKey, FieldopsError> {
        let secret = self
            .tenant_key
            .clone()
            .ok_or(FieldopsError::MissingSetting("tenant_key"))?;
        Ok(TenantKey::new(secret)?)
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            storage_key: self.queue_key.clone(),
            max_attempts: self.max_replay_attempts,
            kdf: KdfParams {
                memory_kib: self.kdf_memory_kib,
                iterations: self.kdf_iterations,
            },
        }
    }

    pub fn api_client(&self) -> Result<ApiClient, FieldopsError> {
        let url = self
            .api_url
            .clone()
            .ok_or(FieldopsError::MissingSetting("api_url"))?;
        Ok(ApiClient::new(url, self.api_token.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let config = FieldopsConfig::default();
        assert_eq!(config.queue_key, "offline_sales");
        assert_eq!(config.max_replay_attempts, 5);
        assert_eq!(config.storage_dir, PathBuf::from(".fieldops"));
        assert_eq!(config.kdf_memory_kib, 19456);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.tenant_key.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_url = "https://api.example.com/v1"
            max_replay_attempts = 8

            [logging]
            format = "json"
        "#;
        let config: FieldopsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_url.as_deref(), Some("https://api.example.com/v1"));
        assert_eq!(config.max_replay_attempts, 8);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.queue_key, "offline_sales");
    }

    #[test]
    fn env_overrides_file() {
        let mut config: FieldopsConfig = toml::from_str(r#"tenant_key = "from-file""#).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("FIELDOPS_TENANT_KEY", "from-env"),
            ("FIELDOPS_API_URL", "http://localhost:8080"),
            ("FIELDOPS_API_TOKEN", ""),
        ]);
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.tenant_key.as_deref(), Some("from-env"));
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:8080"));
        assert!(config.api_token.is_none());
    }

    #[test]
    fn tenant_key_is_required() {
        let config = FieldopsConfig::default();
        assert!(matches!(
            config.tenant_key(),
            Err(FieldopsError::MissingSetting("tenant_key"))
        ));

        let config = FieldopsConfig {
            tenant_key: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(config.tenant_key(), Err(FieldopsError::Queue(_))));
    }

    #[test]
    fn zero_attempts_is_invalid() {
        let config = FieldopsConfig {
            max_replay_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "queue_key = \"pos_queue\"\nkdf_iterations = 3\n").unwrap();

        let config = FieldopsConfig::load(Some(&path)).unwrap();
        assert_eq!(config.queue_key, "pos_queue");
        assert_eq!(config.queue_options().kdf.iterations, 3);
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let result = FieldopsConfig::load(Some(Path::new("/nonexistent/fieldops.toml")));
        assert!(matches!(result, Err(FieldopsError::Config(_))));
    }
}
