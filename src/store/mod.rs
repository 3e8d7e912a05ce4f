//! Append-only location sample storage.
//!
//! Sub-modules:
//! - `schema`: SQLite DDL definitions.
//! - `sqlite`: durable `SqliteSampleStore`.
//! - `memory`: in-process `MemorySampleStore` arena.
//!
//! The [`SampleStore`] contract has no update or delete path. Rows are
//! written once and only read afterwards.

pub(crate) mod schema;
pub mod memory;
pub mod sqlite;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StorageBackend, StorageConfig};
use crate::sample::{LocationSample, NewSample, SampleId};

pub use memory::MemorySampleStore;
pub use sqlite::SqliteSampleStore;

/// Storage fault raised by a [`SampleStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("lock poisoned: {0}")]
    Lock(String),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Durable, append-friendly table of location samples.
#[async_trait]
pub trait SampleStore: Send + Sync + 'static {
    /// Insert a sample and return its newly assigned identifier.
    async fn append(&self, sample: NewSample) -> Result<SampleId, StoreError>;

    /// All samples ascending by timestamp, ties broken by insertion order.
    async fn scan_all_ordered_by_time(&self) -> Result<Vec<LocationSample>, StoreError>;

    /// The sample with the greatest timestamp, or `None` if empty.
    ///
    /// When several samples share the greatest timestamp the most recently
    /// inserted one wins, matching the last element of the ordered scan.
    async fn latest(&self) -> Result<Option<LocationSample>, StoreError>;

    /// Number of stored samples.
    async fn len(&self) -> Result<u64, StoreError>;

    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }
}

/// Open the store described by `config`.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn SampleStore>, StoreError> {
    match config.backend {
        StorageBackend::Sqlite => {
            let path = config.resolved_database_path();
            open_sqlite(&path)
        }
        StorageBackend::Memory => Ok(Arc::new(MemorySampleStore::new())),
    }
}

fn open_sqlite(path: &Path) -> Result<Arc<dyn SampleStore>, StoreError> {
    Ok(Arc::new(SqliteSampleStore::open(path)?))
}
