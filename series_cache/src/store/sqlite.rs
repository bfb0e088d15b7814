//! SQLite [`SeriesStore`] backed by diesel.
//!
//! A single connection is shared behind a mutex and every statement runs on
//! tokio's blocking pool. Row upserts and the coverage update of one gap run
//! in one transaction, so "covered" implies "durably persisted".

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use diesel::{SqliteConnection, insert_into, prelude::*};
use esett_ingestor::models::{
    range::TimeRange,
    row::Row,
    series::{Series, SeriesKey},
};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    db::{connection::connect_sqlite, migrate},
    interval::merge_into,
    schema::{consumption, covered_interval, imbalance_price, production},
    store::{
        JoinSnafu, QuerySnafu, SeriesStore, StoreError,
        models::{
            ConsumptionRecord, CoveredIntervalRecord, PriceRecord, ProductionRecord, SeriesRecord,
        },
    },
    tz::to_rfc3339_millis,
};

/// Durable store in a single SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<SqliteConnection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url` and apply
    /// pending migrations.
    pub fn open(database_url: &str) -> Result<Self, StoreError> {
        let mut conn = connect_sqlite(database_url)?;
        let applied = migrate::run_pending(&mut conn)?;
        debug!(database_url, applied, "sqlite store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .context(JoinSnafu)?
    }
}

fn upsert_record(conn: &mut SqliteConnection, record: &SeriesRecord) -> QueryResult<usize> {
    match record {
        SeriesRecord::Production(r) => insert_into(production::table)
            .values(r)
            .on_conflict((production::zone, production::time))
            .do_update()
            .set(r)
            .execute(conn),
        SeriesRecord::Consumption(r) => insert_into(consumption::table)
            .values(r)
            .on_conflict((consumption::zone, consumption::time))
            .do_update()
            .set(r)
            .execute(conn),
        SeriesRecord::Price(r) => insert_into(imbalance_price::table)
            .values(r)
            .on_conflict((imbalance_price::zone, imbalance_price::time))
            .do_update()
            .set(r)
            .execute(conn),
    }
}

fn upsert_all(conn: &mut SqliteConnection, records: &[SeriesRecord]) -> Result<usize, StoreError> {
    let mut written = 0;
    for record in records {
        written += upsert_record(conn, record).context(QuerySnafu)?;
    }
    Ok(written)
}

fn load_rows(
    conn: &mut SqliteConnection,
    key: SeriesKey,
    range: TimeRange,
) -> Result<Vec<Row>, StoreError> {
    let zone = key.zone.as_str();
    let start = to_rfc3339_millis(range.start);
    let end = to_rfc3339_millis(range.end);

    match key.series {
        Series::Production => production::table
            .filter(production::zone.eq(zone))
            .filter(production::time.ge(&start))
            .filter(production::time.lt(&end))
            .order(production::time.asc())
            .select(ProductionRecord::as_select())
            .load(conn)
            .context(QuerySnafu)?
            .into_iter()
            .map(Row::try_from)
            .collect(),
        Series::Consumption => consumption::table
            .filter(consumption::zone.eq(zone))
            .filter(consumption::time.ge(&start))
            .filter(consumption::time.lt(&end))
            .order(consumption::time.asc())
            .select(ConsumptionRecord::as_select())
            .load(conn)
            .context(QuerySnafu)?
            .into_iter()
            .map(Row::try_from)
            .collect(),
        Series::Prices => imbalance_price::table
            .filter(imbalance_price::zone.eq(zone))
            .filter(imbalance_price::time.ge(&start))
            .filter(imbalance_price::time.lt(&end))
            .order(imbalance_price::time.asc())
            .select(PriceRecord::as_select())
            .load(conn)
            .context(QuerySnafu)?
            .into_iter()
            .map(Row::try_from)
            .collect(),
    }
}

fn load_coverage(conn: &mut SqliteConnection, key: SeriesKey) -> Result<Vec<TimeRange>, StoreError> {
    covered_interval::table
        .filter(covered_interval::series.eq(key.series.as_str()))
        .filter(covered_interval::zone.eq(key.zone.as_str()))
        .order(covered_interval::start_ts.asc())
        .select(CoveredIntervalRecord::as_select())
        .load(conn)
        .context(QuerySnafu)?
        .into_iter()
        .map(TimeRange::try_from)
        .collect()
}

/// Merge `range` into the stored set for `key` and rewrite it. Call inside a
/// transaction.
fn merge_coverage(
    conn: &mut SqliteConnection,
    key: SeriesKey,
    range: TimeRange,
) -> Result<(), StoreError> {
    let mut intervals = load_coverage(conn, key)?;
    merge_into(&mut intervals, range);

    diesel::delete(
        covered_interval::table.filter(
            covered_interval::series
                .eq(key.series.as_str())
                .and(covered_interval::zone.eq(key.zone.as_str())),
        ),
    )
    .execute(conn)
    .context(QuerySnafu)?;

    let records: Vec<CoveredIntervalRecord> = intervals
        .iter()
        .map(|iv| CoveredIntervalRecord {
            series: key.series.as_str().to_string(),
            zone: key.zone.as_str().to_string(),
            start_ts: to_rfc3339_millis(iv.start),
            end_ts: to_rfc3339_millis(iv.end),
        })
        .collect();
    insert_into(covered_interval::table)
        .values(&records)
        .execute(conn)
        .context(QuerySnafu)?;
    Ok(())
}

/// Run `f` in an immediate transaction, keeping `StoreError` as the error type.
fn transaction<T>(
    conn: &mut SqliteConnection,
    f: impl FnOnce(&mut SqliteConnection) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut inner: Option<StoreError> = None;
    let result = conn.immediate_transaction(|conn| {
        f(conn).map_err(|e| {
            inner = Some(e);
            diesel::result::Error::RollbackTransaction
        })
    });
    match result {
        Ok(value) => Ok(value),
        Err(source) => match inner {
            Some(err) => Err(err),
            None => Err(source).context(QuerySnafu),
        },
    }
}

#[async_trait]
impl SeriesStore for SqliteStore {
    async fn upsert(&self, rows: &[Row]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let records: Vec<SeriesRecord> = rows.iter().map(SeriesRecord::from).collect();
        self.with_conn(move |conn| transaction(conn, |conn| upsert_all(conn, &records)))
            .await
    }

    async fn read_range(&self, key: SeriesKey, range: TimeRange) -> Result<Vec<Row>, StoreError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(move |conn| load_rows(conn, key, range)).await
    }

    async fn coverage(&self, key: SeriesKey) -> Result<Vec<TimeRange>, StoreError> {
        self.with_conn(move |conn| load_coverage(conn, key)).await
    }

    async fn record_coverage(&self, key: SeriesKey, range: TimeRange) -> Result<(), StoreError> {
        if range.is_empty() {
            return Ok(());
        }
        self.with_conn(move |conn| transaction(conn, |conn| merge_coverage(conn, key, range)))
            .await
    }

    async fn commit(&self, key: SeriesKey, range: TimeRange, rows: &[Row]) -> Result<(), StoreError> {
        let records: Vec<SeriesRecord> = rows.iter().map(SeriesRecord::from).collect();
        self.with_conn(move |conn| {
            transaction(conn, |conn| {
                let written = upsert_all(conn, &records)?;
                if !range.is_empty() {
                    merge_coverage(conn, key, range)?;
                }
                debug!(%key, %range, written, "committed gap");
                Ok(())
            })
        })
        .await
    }
}
