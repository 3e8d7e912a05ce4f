//! In-process sample arena.
//!
//! A growable `Vec` guarded by an `RwLock` plus an atomic id counter. Used by
//! tests and by hosts that do not need history to outlive the process.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{SampleStore, StoreError};
use crate::sample::{LocationSample, NewSample, SampleId};

/// Append-only in-memory store. Rows are kept in insertion order.
#[derive(Debug, Default)]
pub struct MemorySampleStore {
    rows: RwLock<Vec<LocationSample>>,
    next_id: AtomicU64,
}

impl MemorySampleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SampleStore for MemorySampleStore {
    async fn append(&self, sample: NewSample) -> Result<SampleId, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        rows.push(sample.with_id(id));
        Ok(id)
    }

    async fn scan_all_ordered_by_time(&self) -> Result<Vec<LocationSample>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        let mut ordered = rows.clone();
        // Stable sort keeps insertion order for equal timestamps.
        ordered.sort_by_key(|s| s.timestamp_ms);
        Ok(ordered)
    }

    async fn latest(&self) -> Result<Option<LocationSample>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        // `max_by_key` returns the last maximum, i.e. the newest insert on ties.
        Ok(rows.iter().max_by_key(|s| s.timestamp_ms).copied())
    }

    async fn len(&self) -> Result<u64, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        Ok(rows.len() as u64)
    }
}
