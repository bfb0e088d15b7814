//! Half-open UTC time ranges.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Returned when a range would end before it starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("range end {end} is before start {start}")]
pub struct InvertedRangeError {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A half-open interval `[start, end)` in UTC.
///
/// `start == end` is a valid, empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvertedRangeError> {
        if end < start {
            return Err(InvertedRangeError { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// True when both ranges are non-empty and share at least one instant.
    pub fn intersects(&self, other: &TimeRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
