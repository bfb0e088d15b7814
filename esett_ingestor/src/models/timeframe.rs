//! Fixed-width bucket sizes for upstream series.

use std::fmt;

use chrono::{DateTime, Utc};

/// A fixed bucket width. eSett publishes every supported series hourly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeFrame {
    seconds: i64,
}

impl TimeFrame {
    /// One-hour buckets.
    pub const fn hour() -> Self {
        Self { seconds: 60 * 60 }
    }

    /// Bucket width in whole seconds.
    pub const fn seconds(&self) -> i64 {
        self.seconds
    }

    /// True when `ts` sits exactly on a bucket boundary (Unix epoch anchored).
    pub fn is_aligned(&self, ts: DateTime<Utc>) -> bool {
        ts.timestamp_subsec_nanos() == 0 && ts.timestamp().rem_euclid(self.seconds) == 0
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.seconds / 3600)
    }
}
