//! UTC bucket alignment
//!
//! - One stable epoch: Unix (1970-01-01T00:00:00Z).
//! - Fixed-size frames only: second-based math.
//! - Ranges are aligned outward so that gaps are whole-bucket multiples.
//!
//! All functions assume the input timestamp is UTC.

use chrono::{DateTime, Duration, Utc};
use esett_ingestor::models::{range::TimeRange, timeframe::TimeFrame};

/// Compute the bucket id for a UTC timestamp. Negative before the epoch.
pub fn bucket_id(ts_utc: DateTime<Utc>, tf: TimeFrame) -> i64 {
    ts_utc.timestamp().div_euclid(tf.seconds())
}

/// Get the UTC start instant for a bucket id.
pub fn bucket_start_utc(id: i64, tf: TimeFrame) -> DateTime<Utc> {
    // i128 keeps extreme ids from wrapping; out-of-range saturates.
    let secs = (id as i128) * (tf.seconds() as i128);
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or(if secs < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

/// Start of the bucket containing `ts`.
pub fn floor(ts: DateTime<Utc>, tf: TimeFrame) -> DateTime<Utc> {
    bucket_start_utc(bucket_id(ts, tf), tf)
}

/// Smallest bucket boundary `>= ts`.
pub fn ceil(ts: DateTime<Utc>, tf: TimeFrame) -> DateTime<Utc> {
    if tf.is_aligned(ts) {
        return ts;
    }
    let start = floor(ts, tf);
    start
        .checked_add_signed(Duration::seconds(tf.seconds()))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Round `range` outward: floor the start, ceil the end.
pub fn align_outward(range: TimeRange, tf: TimeFrame) -> TimeRange {
    TimeRange {
        start: floor(range.start, tf),
        end: ceil(range.end, tf),
    }
}
