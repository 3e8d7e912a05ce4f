//! SQLite-backed sample store.
//!
//! Backed by a single database file. Every call runs on the blocking
//! thread pool so the collector's runtime worker never waits on disk I/O.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use super::schema::{apply_schema, read_schema_version};
use super::{SampleStore, StoreError};
use crate::sample::{LocationSample, NewSample, SampleId};

const SELECT_COLUMNS: &str = "SELECT id, latitude, longitude, precision, timestamp \
                              FROM location_samples";

/// SQLite-backed location sample store.
///
/// Thread-safe via an internal `Mutex<Connection>`. A row is inserted in a
/// single statement while the mutex is held, so readers never see it half
/// written.
pub struct SqliteSampleStore {
    path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSampleStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database. Contents vanish on drop.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            path: None,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the schema version stamp.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = lock(&self.conn)?;
        Ok(read_schema_version(&conn)?)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl SampleStore for SqliteSampleStore {
    async fn append(&self, sample: NewSample) -> Result<SampleId, StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO location_samples (latitude, longitude, precision, timestamp) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    sample.latitude,
                    sample.longitude,
                    sample.precision,
                    sample.timestamp_ms
                ],
            )?;
            let rowid = conn.last_insert_rowid();
            SampleId::try_from(rowid)
                .map_err(|_| StoreError::Io(format!("negative rowid {rowid} assigned")))
        })
        .await
    }

    async fn scan_all_ordered_by_time(&self) -> Result<Vec<LocationSample>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} ORDER BY timestamp ASC, id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_sample)?;

            let mut samples = Vec::new();
            for r in rows {
                samples.push(r?);
            }
            Ok(samples)
        })
        .await
    }

    async fn latest(&self) -> Result<Option<LocationSample>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} ORDER BY timestamp DESC, id DESC LIMIT 1");
            Ok(conn.query_row(&sql, [], row_to_sample).optional()?)
        })
        .await
    }

    async fn len(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: u64 =
                conn.query_row("SELECT COUNT(*) FROM location_samples", [], |row| {
                    row.get(0)
                })?;
            Ok(count)
        })
        .await
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
    conn.lock().map_err(|e| StoreError::Lock(e.to_string()))
}

fn row_to_sample(row: &rusqlite::Row<'_>) -> rusqlite::Result<LocationSample> {
    Ok(LocationSample {
        id: row.get(0)?,
        latitude: row.get(1)?,
        longitude: row.get(2)?,
        precision: row.get(3)?,
        timestamp_ms: row.get(4)?,
    })
}
