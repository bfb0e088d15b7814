//! Interval Store: per series-key sets of cached `[start, end)` ranges.
//!
//! Each key owns a sorted, disjoint, non-adjacent `Vec<TimeRange>`. Inserts
//! merge with every overlapping or touching neighbour, so the set stays
//! minimal. Gap queries align the request outward to the series' granularity
//! and return the complement of the cached set within it.
//!
//! Locking is two-level: a map-wide `RwLock` only guards key creation, and
//! each key has its own `Mutex`, so unrelated keys never contend and
//! `mark_covered` calls for one key are serialized. No lock is held across an
//! `.await`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use esett_ingestor::models::{range::TimeRange, series::SeriesKey};

use crate::bucket;

/// Insert `range` into the sorted, disjoint set `intervals`, merging with any
/// interval it overlaps or touches. Empty ranges are ignored.
pub fn merge_into(intervals: &mut Vec<TimeRange>, range: TimeRange) {
    if range.is_empty() {
        return;
    }
    // First interval whose end reaches the new start (touching counts).
    let lo = intervals.partition_point(|iv| iv.end < range.start);
    // One past the last interval whose start is within reach of the new end.
    let hi = intervals.partition_point(|iv| iv.start <= range.end);

    let mut merged = range;
    if lo < hi {
        merged.start = merged.start.min(intervals[lo].start);
        merged.end = merged.end.max(intervals[hi - 1].end);
    }
    intervals.splice(lo..hi, std::iter::once(merged));
}

/// Sub-ranges of `range` not covered by the sorted, disjoint set `covered`.
pub fn complement(range: TimeRange, covered: &[TimeRange]) -> Vec<TimeRange> {
    let mut gaps = Vec::new();
    if range.is_empty() {
        return gaps;
    }
    let mut cursor = range.start;
    for iv in covered.iter().filter(|iv| iv.intersects(&range)) {
        if iv.start > cursor {
            gaps.push(TimeRange {
                start: cursor,
                end: iv.start,
            });
        }
        cursor = cursor.max(iv.end);
        if cursor >= range.end {
            return gaps;
        }
    }
    if cursor < range.end {
        gaps.push(TimeRange {
            start: cursor,
            end: range.end,
        });
    }
    gaps
}

#[derive(Debug, Default)]
struct KeyState {
    intervals: Vec<TimeRange>,
    hydrated: bool,
}

/// In-memory index of which ranges are fully cached, per series-key.
#[derive(Debug, Default)]
pub struct IntervalStore {
    keys: RwLock<HashMap<SeriesKey, Arc<Mutex<KeyState>>>>,
}

impl IntervalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: SeriesKey) -> Arc<Mutex<KeyState>> {
        if let Some(slot) = self
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return slot.clone();
        }
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone()
    }

    fn with_key<T>(&self, key: SeriesKey, f: impl FnOnce(&mut KeyState) -> T) -> T {
        let slot = self.slot(key);
        let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Cached intervals for `key`, ascending and disjoint.
    pub fn covered(&self, key: SeriesKey) -> Vec<TimeRange> {
        self.with_key(key, |state| state.intervals.clone())
    }

    /// Uncached sub-ranges of `range`, after aligning it outward to the
    /// series' granularity. An empty `range` has no gaps.
    pub fn gaps(&self, key: SeriesKey, range: TimeRange) -> Vec<TimeRange> {
        if range.is_empty() {
            return Vec::new();
        }
        let aligned = bucket::align_outward(range, key.series.granularity());
        self.with_key(key, |state| complement(aligned, &state.intervals))
    }

    /// Record `range` as cached, merging with neighbours.
    pub fn mark_covered(&self, key: SeriesKey, range: TimeRange) {
        self.with_key(key, |state| merge_into(&mut state.intervals, range));
    }

    /// True when every instant of `range` is cached.
    pub fn is_covered(&self, key: SeriesKey, range: TimeRange) -> bool {
        self.gaps(key, range).is_empty()
    }

    /// Whether persisted coverage has been loaded for `key`.
    pub fn is_hydrated(&self, key: SeriesKey) -> bool {
        self.with_key(key, |state| state.hydrated)
    }

    /// Merge persisted coverage for `key` and mark it hydrated. Idempotent.
    pub fn hydrate(&self, key: SeriesKey, persisted: impl IntoIterator<Item = TimeRange>) {
        self.with_key(key, |state| {
            for range in persisted {
                merge_into(&mut state.intervals, range);
            }
            state.hydrated = true;
        });
    }
}
