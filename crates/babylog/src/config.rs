//! Configuration management for babylog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "babylog";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "babylog.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "BABYLOG_";

/// Separator between nested keys in environment variable names.
const ENV_SEPARATOR: &str = "__";

/// Allowed characters in a cache version.
const CACHE_VERSION_PATTERN: &str = r"^[A-Za-z0-9._-]+$";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `BABYLOG_`, nested keys joined by `__`)
/// 2. TOML config file at `~/.config/babylog/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Background worker configuration.
    pub worker: WorkerConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/babylog/babylog.db`
    pub database_path: Option<PathBuf>,
}

/// Background worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Register the worker at startup.
    pub enabled: bool,
    /// Cache bucket name. Changing it invalidates everything cached.
    pub cache_version: String,
    /// Origin relative request URLs are resolved against.
    pub origin: String,
    /// URLs fetched and cached at install.
    pub precache: Vec<String>,
    /// JSON precache manifest appended to `precache`.
    pub precache_manifest: Option<PathBuf>,
    /// Network request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Capacity of the worker's event queue.
    pub channel_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_version: "baby-log-v1".to_string(),
            origin: "http://localhost:5173".to_string(),
            precache: Vec::new(),
            precache_manifest: None,
            request_timeout_secs: 30,
            channel_capacity: 64,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `BABYLOG_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: PathBuf) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let worker = &self.worker;

        let version_pattern = Regex::new(CACHE_VERSION_PATTERN)
            .map_err(|e| Error::internal(format!("cache version pattern: {e}")))?;
        if !version_pattern.is_match(&worker.cache_version) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "cache_version must be non-empty and contain only letters, digits, '.', '_' or '-': {:?}",
                    worker.cache_version
                ),
            });
        }

        if worker.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_secs must be greater than 0".to_string(),
            });
        }

        if worker.channel_capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "channel_capacity must be greater than 0".to_string(),
            });
        }

        if !(worker.origin.starts_with("http://") || worker.origin.starts_with("https://")) {
            return Err(Error::ConfigValidation {
                message: format!("origin must be an http(s) URL: {}", worker.origin),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.worker.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert!(config.worker.enabled);
        assert_eq!(config.worker.cache_version, "baby-log-v1");
        assert_eq!(config.worker.origin, "http://localhost:5173");
        assert!(config.worker.precache.is_empty());
        assert_eq!(config.worker.request_timeout_secs, 30);
        assert_eq!(config.worker.channel_capacity, 64);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_cache_version() {
        let mut config = Config::default();
        config.worker.cache_version = String::new();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("cache_version"));
    }

    #[test]
    fn test_validate_malformed_cache_version() {
        let mut config = Config::default();
        config.worker.cache_version = "baby log/v2".to_string();
        assert!(config.validate().is_err());

        config.worker.cache_version = "baby-log_v2.1".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.worker.request_timeout_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("request_timeout_secs"));
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = Config::default();
        config.worker.channel_capacity = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("channel_capacity"));
    }

    #[test]
    fn test_validate_origin_scheme() {
        let mut config = Config::default();
        config.worker.origin = "localhost:5173".to_string();
        assert!(config.validate().is_err());

        config.worker.origin = "https://baby.example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("babylog.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_request_timeout() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("babylog"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_default_data_dir() {
        let path = Config::default_data_dir();
        assert!(path.to_string_lossy().contains("babylog"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.worker, WorkerConfig::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let file = write_config(
            r#"
[storage]
database_path = "/tmp/baby.db"

[worker]
cache_version = "baby-log-v2"
precache = ["/", "/index.html"]
channel_capacity = 8
"#,
        );

        let config: Config = Config::figment(file.path().to_path_buf())
            .extract()
            .unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/tmp/baby.db"));
        assert_eq!(config.worker.cache_version, "baby-log-v2");
        assert_eq!(config.worker.precache, vec!["/", "/index.html"]);
        assert_eq!(config.worker.channel_capacity, 8);
        assert_eq!(config.worker.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let file = write_config("[worker]\ncache_version = \"\"\n");
        let result = Config::load_from(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(Error::ConfigValidation { .. })));
    }

    #[test]
    fn test_load_rejects_wrong_types() {
        let file = write_config("[worker]\nenabled = \"sometimes\"\n");
        let result = Config::load_from(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(Error::ConfigLoad(_))));
    }

    #[test]
    fn test_worker_config_deserialize_partial() {
        let json = r#"{"enabled": false, "precache_manifest": "/srv/app/precache.json"}"#;
        let worker: WorkerConfig = serde_json::from_str(json).unwrap();

        assert!(!worker.enabled);
        assert_eq!(
            worker.precache_manifest,
            Some(PathBuf::from("/srv/app/precache.json"))
        );
        assert_eq!(worker.cache_version, "baby-log-v1");
    }

    #[test]
    fn test_config_serialize_to_toml_shape() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json["worker"]["cache_version"].is_string());
        assert!(json["storage"].get("database_path").is_some());
    }
}
