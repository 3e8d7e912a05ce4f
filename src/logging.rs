//! Tracing subscriber setup.
//!
//! Diagnostics always go to stderr so stdout stays a clean protocol channel
//! for the host bridge. When `logging.file_dir` is set, a daily-rotated file
//! layer is added as well.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;
use crate::error::{Result, TrackerError};

/// Log file name prefix inside the configured directory.
pub const LOG_FILE_PREFIX: &str = "geotrail.log";

/// Keeps the non-blocking file writer alive. Dropping it flushes the file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Build the env filter: `RUST_LOG` wins, otherwise the configured directive.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<LoggingGuard> {
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, file_guard) = match config.file_dir.as_deref() {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| TrackerError::Config(format!("cannot install tracing subscriber: {e}")))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn file_writer(
    dir: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_writer_creates_log_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("logs");
        let (_writer, _guard) = file_writer(&dir).expect("file writer");
        assert!(dir.is_dir());
    }
}
