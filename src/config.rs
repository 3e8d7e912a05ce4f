//! Configuration types for the collector and its host bridge.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TrackerError};

/// Default cadence between acquisition attempts (10 s).
pub const DEFAULT_INTERVAL_MILLIS: u64 = 10_000;

/// Default bounded wait for a single fix.
pub const DEFAULT_ACQUISITION_TIMEOUT_MILLIS: u64 = 5_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Collection cadence and acquisition bounds.
    pub collection: CollectionConfig,
    /// Sample store settings.
    pub storage: StorageConfig,
    /// Host command channel settings.
    pub host: HostConfig,
    /// Log filtering and optional file output.
    pub logging: LoggingConfig,
}

/// Collection loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Interval used when `collection.start` carries no explicit interval.
    pub default_interval_ms: u64,
    /// Upper bound on a single fix request.
    ///
    /// Clamped to the active interval so an attempt never outlives its slot.
    pub acquisition_timeout_ms: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: DEFAULT_INTERVAL_MILLIS,
            acquisition_timeout_ms: DEFAULT_ACQUISITION_TIMEOUT_MILLIS,
        }
    }
}

impl CollectionConfig {
    #[must_use]
    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition_timeout_ms.max(1))
    }
}

/// Which sample store backend to open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Durable SQLite file.
    #[default]
    Sqlite,
    /// Process-local arena; history is lost on exit.
    Memory,
}

/// Sample store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file (None = `data_dir()/samples.db`).
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    #[must_use]
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(crate::app_dirs::samples_db_path)
    }
}

/// Host command channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Pending command requests buffered before senders wait.
    pub request_capacity: usize,
    /// Event broadcast buffer; slow subscribers lag past this.
    pub event_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            request_capacity: 64,
            event_capacity: 128,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Directory for daily-rotated log files (None = stderr only).
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            file_dir: None,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| TrackerError::Config(e.to_string()))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &std::path::Path) -> Result<Self> {
        match std::fs::metadata(path) {
            Ok(_) => Self::from_file(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TrackerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `config_dir()/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_dir().join("config.toml")
    }

    /// Reject values the collector cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.collection.default_interval_ms == 0 {
            return Err(TrackerError::Config(
                "collection.default_interval_ms must be positive".to_owned(),
            ));
        }
        if self.collection.acquisition_timeout_ms == 0 {
            return Err(TrackerError::Config(
                "collection.acquisition_timeout_ms must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collection.default_interval_ms, 10_000);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.host.event_capacity > 0);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = TrackerConfig::from_file(std::path::Path::new("/nonexistent/geotrail.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_or_default_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = TrackerConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.collection.default_interval_ms, DEFAULT_INTERVAL_MILLIS);
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").expect("write");

        let result = TrackerConfig::from_file(&path);
        assert!(matches!(result, Err(TrackerError::Config(_))));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut config = TrackerConfig::default();
        config.collection.default_interval_ms = 60_000;
        config.storage.backend = StorageBackend::Memory;
        config.save_to_file(&path).expect("save");

        let loaded = TrackerConfig::from_file(&path).expect("load");
        assert_eq!(loaded.collection.default_interval_ms, 60_000);
        assert_eq!(loaded.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[collection]
default_interval_ms = 300000
"#;
        let config: TrackerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.collection.default_interval_ms, 300_000);
        assert_eq!(
            config.collection.acquisition_timeout_ms,
            DEFAULT_ACQUISITION_TIMEOUT_MILLIS
        );
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn zero_interval_fails_validation() {
        let mut config = TrackerConfig::default();
        config.collection.default_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = TrackerConfig::default_config_path();
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
