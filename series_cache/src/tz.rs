//! Timestamp parsing and formatting at the edges.
//!
//! - [`parse_ts_to_utc`]: RFC 3339 with an explicit offset, converted to UTC.
//! - [`parse_utc_lenient`]: additionally accepts offset-less date-times and
//!   bare dates, both read as UTC. Used for query bounds from the CLI.
//! - [`to_rfc3339_millis`]: the storage format. Fixed width, so lexical order
//!   equals time order.
//!
//! All bucket math and all database values are UTC. Local wall-clock times
//! are never accepted.

use anyhow::{Context, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse RFC 3339, a naive date-time, or a date. Offset-less input is UTC.
pub fn parse_utc_lenient(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = parse_ts_to_utc(s) {
        return Ok(dt);
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    bail!("unrecognized timestamp `{s}`; expected RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`")
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
