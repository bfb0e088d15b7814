//! In-memory [`SeriesStore`].

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use esett_ingestor::models::{range::TimeRange, row::Row, series::SeriesKey};

use crate::{
    interval::merge_into,
    store::{SeriesStore, StoreError},
};

#[derive(Debug, Default)]
struct State {
    rows: HashMap<SeriesKey, BTreeMap<DateTime<Utc>, Row>>,
    coverage: HashMap<SeriesKey, Vec<TimeRange>>,
}

/// Rows and coverage held in process memory. Lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows stored for `key`.
    pub fn len(&self, key: SeriesKey) -> usize {
        self.lock().rows.get(&key).map_or(0, BTreeMap::len)
    }

    /// True when nothing is stored for `key`.
    pub fn is_empty(&self, key: SeriesKey) -> bool {
        self.len(key) == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SeriesStore for MemoryStore {
    async fn upsert(&self, rows: &[Row]) -> Result<usize, StoreError> {
        let mut state = self.lock();
        for row in rows {
            state
                .rows
                .entry(row.key())
                .or_default()
                .insert(row.time, row.clone());
        }
        Ok(rows.len())
    }

    async fn read_range(&self, key: SeriesKey, range: TimeRange) -> Result<Vec<Row>, StoreError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.lock();
        Ok(state
            .rows
            .get(&key)
            .map(|rows| rows.range(range.start..range.end).map(|(_, row)| row.clone()).collect())
            .unwrap_or_default())
    }

    async fn coverage(&self, key: SeriesKey) -> Result<Vec<TimeRange>, StoreError> {
        Ok(self.lock().coverage.get(&key).cloned().unwrap_or_default())
    }

    async fn record_coverage(&self, key: SeriesKey, range: TimeRange) -> Result<(), StoreError> {
        merge_into(self.lock().coverage.entry(key).or_default(), range);
        Ok(())
    }
}
