#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use esett_ingestor::{
    codec::RawRecord,
    models::{
        range::TimeRange,
        series::{Series, SeriesKey},
        zone::Zone,
    },
    providers::{
        ExhaustedSnafu, PageStream, ProviderError, RejectedSnafu, UpstreamSource,
    },
};
use futures::{StreamExt, stream};
use serde_json::{Value, json};
use series_cache::{
    CacheSynchronizer, SyncSettings,
    db::connection,
    store::{SeriesStore, SqliteStore},
};
use tempfile::TempDir;
use tokio::sync::Semaphore;

// ----- time helpers -----

/// 2024-01-01T00:00:00Z plus `hours`.
pub fn h(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hours)
}

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

pub fn range(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeRange {
    TimeRange::new(start, end).unwrap()
}

// ----- scripted upstream -----

/// How a scripted call fails.
#[derive(Debug, Clone)]
pub enum Failure {
    /// Retries exhausted on a 503.
    Unavailable,
    /// Non-retryable client error.
    Rejected(u16),
    /// A record with an unparseable timestamp.
    Malformed,
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    zone: Option<Zone>,
    after_pages: usize,
    failure: Failure,
}

/// Fake upstream that serves hourly records for any range, counts calls,
/// can fail on demand, and can hold every fetch until released.
pub struct ScriptedUpstream {
    calls: AtomicUsize,
    requested: Mutex<Vec<(SeriesKey, TimeRange)>>,
    failures: Mutex<Vec<ScriptedFailure>>,
    gate: Option<Arc<Semaphore>>,
    page_hours: i64,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            gate: None,
            page_hours: 24,
        }
    }

    /// Every fetch waits for one permit on the returned semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let upstream = Self {
            gate: Some(gate.clone()),
            ..Self::new()
        };
        (upstream, gate)
    }

    pub fn with_page_hours(mut self, page_hours: i64) -> Self {
        self.page_hours = page_hours;
        self
    }

    /// Fail the next call (any zone) with `failure` before any page.
    pub fn fail_next(&self, failure: Failure) {
        self.fail_after(None, 0, failure);
    }

    /// Fail the next call for `zone` (or any zone) after `after_pages` pages.
    pub fn fail_after(&self, zone: Option<Zone>, after_pages: usize, failure: Failure) {
        self.failures.lock().unwrap().push(ScriptedFailure {
            zone,
            after_pages,
            failure,
        });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<(SeriesKey, TimeRange)> {
        self.requested.lock().unwrap().clone()
    }

    fn take_failure(&self, zone: Zone) -> Option<ScriptedFailure> {
        let mut failures = self.failures.lock().unwrap();
        let idx = failures
            .iter()
            .position(|f| f.zone.is_none_or(|z| z == zone))?;
        Some(failures.remove(idx))
    }
}

/// Hourly records from `range.start` through `range.end` inclusive, the way
/// eSett treats its `end` parameter.
pub fn hourly_records(series: Series, range: TimeRange) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut t = range.start;
    while t <= range.end {
        records.push(record(series, t, (t.timestamp() / 3600) as f64));
        t += chrono::Duration::hours(1);
    }
    records
}

pub fn record(series: Series, time: DateTime<Utc>, v: f64) -> RawRecord {
    let ts = time.format("%Y-%m-%dT%H:%M:%S.000Z").to_string();
    let value = match series {
        Series::Production => json!({ "timestampUTC": ts, "total": v, "hydro": v / 2.0 }),
        Series::Consumption => json!({ "timestampUTC": ts, "total": v, "metered": v }),
        Series::Prices => json!({ "timestampUTC": ts, "upRegPrice": v, "downRegPrice": -v }),
    };
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn provider_error(failure: &Failure) -> ProviderError {
    match failure {
        Failure::Unavailable => ExhaustedSnafu {
            attempts: 4u32,
            message: "HTTP 503 Service Unavailable",
        }
        .build(),
        Failure::Rejected(status) => RejectedSnafu {
            status: *status,
            message: "rejected by script",
        }
        .build(),
        Failure::Malformed => unreachable!("malformed is served as a page"),
    }
}

impl UpstreamSource for ScriptedUpstream {
    fn fetch_page_sequence(&self, series: Series, zone: Zone, range: TimeRange) -> PageStream<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap()
            .push((SeriesKey::new(series, zone), range));

        let records = hourly_records(series, range);
        let mut items: Vec<Result<Vec<RawRecord>, ProviderError>> = records
            .chunks(self.page_hours.max(1) as usize)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();

        if let Some(scripted) = self.take_failure(zone) {
            items.truncate(scripted.after_pages);
            match scripted.failure {
                Failure::Malformed => {
                    let mut bad = record(series, range.start, 0.0);
                    bad.insert("timestampUTC".into(), json!("not a time"));
                    items.push(Ok(vec![bad]));
                }
                other => items.push(Err(provider_error(&other))),
            }
        }

        let gate = self.gate.clone();
        let gated = async move {
            if let Some(gate) = gate {
                if let Ok(permit) = gate.acquire_owned().await {
                    permit.forget();
                }
            }
            stream::iter(items)
        };
        stream::once(gated).flatten().boxed()
    }
}

// ----- synchronizer helpers -----

pub fn fast_settings() -> SyncSettings {
    SyncSettings {
        fetch_deadline: Duration::from_secs(10),
        ..SyncSettings::default()
    }
}

pub fn synchronizer(
    upstream: Arc<ScriptedUpstream>,
    store: Arc<dyn SeriesStore>,
    settings: SyncSettings,
) -> CacheSynchronizer {
    CacheSynchronizer::new(upstream, store, settings)
}

/// Poll `cond` until it holds, up to two seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// ----- sqlite helpers -----

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

impl TestDb {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let mut p = PathBuf::from(dir.path());
        p.push("test.db");
        let path = p.to_string_lossy().to_string();
        Self { _dir: dir, path }
    }

    pub fn store(&self) -> Arc<SqliteStore> {
        Arc::new(SqliteStore::open(&self.path).expect("open store"))
    }

    pub fn connect(&self) -> SqliteConnection {
        connection::connect_sqlite(&self.path).expect("connect")
    }
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}
