//! Query-string construction and time-window pagination for eSett requests.

use chrono::{DateTime, Duration, Utc};

use crate::models::{range::TimeRange, zone::Zone};

/// Format a timestamp the way the eSett API expects: `yyyy-MM-ddTHH:mm:ss.000Z`.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

/// Query parameters for one window of one zone.
pub fn construct_params(zone: Zone, window: TimeRange) -> Vec<(&'static str, String)> {
    vec![
        ("start", format_ts(window.start)),
        ("end", format_ts(window.end)),
        ("mba", zone.eic_code().to_string()),
    ]
}

/// Splits a range into consecutive windows no wider than `span`.
///
/// The cursor is the start of the next window. eSett has no server-side
/// continuation token, so the window start plays that role.
#[derive(Debug, Clone)]
pub struct WindowCursor {
    next: DateTime<Utc>,
    end: DateTime<Utc>,
    span: Duration,
}

impl WindowCursor {
    pub fn new(range: TimeRange, span: Duration) -> Self {
        // A non-positive span would never advance.
        let span = if span <= Duration::zero() {
            Duration::hours(1)
        } else {
            span
        };
        Self {
            next: range.start,
            end: range.end,
            span,
        }
    }

    fn is_done(&self) -> bool {
        self.next >= self.end
    }
}

impl Iterator for WindowCursor {
    type Item = TimeRange;

    fn next(&mut self) -> Option<TimeRange> {
        if self.is_done() {
            return None;
        }
        let start = self.next;
        let end = start
            .checked_add_signed(self.span)
            .map_or(self.end, |candidate| candidate.min(self.end));
        self.next = end;
        Some(TimeRange { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn formats_with_fixed_milliseconds() {
        assert_eq!(format_ts(ts(2, 13)), "2024-01-02T13:00:00.000Z");
    }

    #[test]
    fn params_carry_eic_code() {
        let window = TimeRange::new(ts(1, 0), ts(2, 0)).unwrap();
        let params = construct_params(Zone::Se3, window);
        assert_eq!(
            params,
            vec![
                ("start", "2024-01-01T00:00:00.000Z".to_string()),
                ("end", "2024-01-02T00:00:00.000Z".to_string()),
                ("mba", "10Y1001A1001A46L".to_string()),
            ]
        );
    }

    #[test]
    fn cursor_splits_range_into_spans() {
        let range = TimeRange::new(ts(1, 0), ts(17, 0)).unwrap();
        let windows: Vec<_> = WindowCursor::new(range, Duration::days(7)).collect();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], TimeRange::new(ts(1, 0), ts(8, 0)).unwrap());
        assert_eq!(windows[1], TimeRange::new(ts(8, 0), ts(15, 0)).unwrap());
        assert_eq!(windows[2], TimeRange::new(ts(15, 0), ts(17, 0)).unwrap());
    }

    #[test]
    fn empty_range_yields_no_windows() {
        let range = TimeRange::new(ts(1, 0), ts(1, 0)).unwrap();
        assert_eq!(WindowCursor::new(range, Duration::days(7)).count(), 0);
    }
}
