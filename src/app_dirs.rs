//! Centralized application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/geotrail/` | `~/.local/share/geotrail/` |
//! | Config | `~/Library/Application Support/geotrail/` | `~/.config/geotrail/` |
//!
//! Overrides for tests and custom deployments:
//! - `GEOTRAIL_DATA_DIR`: overrides [`data_dir`]
//! - `GEOTRAIL_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root: sample database and logs.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("GEOTRAIL_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("geotrail"))
        .unwrap_or_else(|| PathBuf::from("/tmp/geotrail-data"))
}

/// Application config directory (holds `config.toml`).
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("GEOTRAIL_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("geotrail"))
        .unwrap_or_else(|| PathBuf::from("/tmp/geotrail-config"))
}

/// Default sample database (`data_dir()/samples.db`).
#[must_use]
pub fn samples_db_path() -> PathBuf {
    data_dir().join("samples.db")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}
