//! Error types for the geotrail collector.

use crate::store::StoreError;

/// Top-level error type for the location collection engine.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Collection interval must be a positive number of milliseconds.
    #[error("invalid collection interval: {0} ms")]
    InvalidInterval(u64),

    /// A second collection loop was about to be started while one is live.
    ///
    /// This is a contract fault in the controller, never a user error.
    #[error("collection loop already running; concurrent start rejected")]
    ConcurrentStart,

    /// Sample store error.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Host command surface error (bad payload, unknown command).
    #[error("host error: {0}")]
    Host(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TrackerError>;
