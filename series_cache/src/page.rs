//! Continuation tokens and paginated responses.
//!
//! A token is the (timestamp, ordinal) of the first row of the next page,
//! rendered as `"<unix seconds>.<ordinal>"`. The ordinal counts rows sharing
//! that timestamp which were already served; with one row per bucket it is
//! always zero. Tokens stay valid while no write lands strictly before the
//! cursor, which holds because cache rows only overwrite fixed keys.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use esett_ingestor::models::row::Row;
use serde::Serialize;
use thiserror::Error;

/// Returned when a page token does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed page token `{0}`")]
pub struct PageTokenError(pub String);

/// Cursor into an ordered row sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageToken {
    /// Timestamp of the first row of the next page.
    pub time: DateTime<Utc>,
    /// Rows at `time` to skip.
    pub ordinal: u32,
}

impl PageToken {
    /// Token pointing at `rows[index]`.
    pub fn at(rows: &[Row], index: usize) -> Option<Self> {
        let time = rows.get(index)?.time;
        let ordinal = rows[..index]
            .iter()
            .rev()
            .take_while(|row| row.time == time)
            .count();
        Some(Self {
            time,
            ordinal: u32::try_from(ordinal).unwrap_or(u32::MAX),
        })
    }

    /// Index in `rows` (ascending by time) where this cursor resumes.
    pub fn position(&self, rows: &[Row]) -> usize {
        let first = rows.partition_point(|row| row.time < self.time);
        (first + self.ordinal as usize).min(rows.len())
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.time.timestamp(), self.ordinal)
    }
}

impl FromStr for PageToken {
    type Err = PageTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || PageTokenError(s.to_string());
        let (secs, ordinal) = s.trim().split_once('.').ok_or_else(bad)?;
        let secs: i64 = secs.parse().map_err(|_| bad())?;
        let ordinal: u32 = ordinal.parse().map_err(|_| bad())?;
        let time = DateTime::from_timestamp(secs, 0).ok_or_else(bad)?;
        Ok(Self { time, ordinal })
    }
}

/// One page of a query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Rows, ascending by time.
    pub data: Vec<Row>,
    /// Pass back to fetch the next page; `None` on the last page.
    pub next_page_token: Option<String>,
    /// Rows in the whole aligned window.
    pub total: usize,
    /// Whether the window was fully cached before this query ran.
    pub cached: bool,
}

impl Page {
    /// A page with no rows and no continuation.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            next_page_token: None,
            total: 0,
            cached: true,
        }
    }

    /// Slice `rows` starting at `cursor` into a page of at most `page_size`.
    pub fn slice(rows: Vec<Row>, cursor: Option<PageToken>, page_size: usize, cached: bool) -> Self {
        let total = rows.len();
        let start = cursor.map_or(0, |c| c.position(&rows));
        let end = start.saturating_add(page_size).min(total);
        let next_page_token = PageToken::at(&rows, end).map(|t| t.to_string());
        let data = rows.into_iter().skip(start).take(end - start).collect();
        Self {
            data,
            next_page_token,
            total,
            cached,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use esett_ingestor::models::{
        row::{PriceValues, RowValues},
        zone::Zone,
    };

    use super::*;

    fn rows(n: u32) -> Vec<Row> {
        (0..n)
            .map(|h| Row {
                time: Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap(),
                zone: Zone::Se4,
                values: RowValues::Prices(PriceValues::default()),
            })
            .collect()
    }

    #[test]
    fn token_text_form() {
        let token = PageToken {
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ordinal: 0,
        };
        assert_eq!(token.to_string(), "1704067200.0");
        assert_eq!("1704067200.0".parse::<PageToken>().unwrap(), token);
        assert!("1704067200".parse::<PageToken>().is_err());
        assert!("abc.0".parse::<PageToken>().is_err());
    }

    #[test]
    fn pages_walk_the_whole_sequence() {
        let all = rows(5);
        let first = Page::slice(all.clone(), None, 2, false);
        assert_eq!(first.data, all[0..2]);
        assert_eq!(first.total, 5);

        let token: PageToken = first.next_page_token.unwrap().parse().unwrap();
        let second = Page::slice(all.clone(), Some(token), 2, false);
        assert_eq!(second.data, all[2..4]);

        let token: PageToken = second.next_page_token.unwrap().parse().unwrap();
        let last = Page::slice(all.clone(), Some(token), 2, false);
        assert_eq!(last.data, all[4..5]);
        assert_eq!(last.next_page_token, None);
    }

    #[test]
    fn exact_fit_has_no_next_token() {
        let page = Page::slice(rows(4), None, 4, true);
        assert_eq!(page.data.len(), 4);
        assert!(page.next_page_token.is_none());
    }
}
