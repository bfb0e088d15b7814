//! Time-Series Store Adapter.
//!
//! [`SeriesStore`] persists normalized rows keyed by (series, zone, time) and
//! the interval metadata that says which ranges are fully cached. Two
//! implementations ship with the crate:
//! - [`sqlite::SqliteStore`]: diesel + embedded migrations, one transaction per
//!   committed gap.
//! - [`memory::MemoryStore`]: `BTreeMap`-backed, for tests and ephemeral runs.

pub mod memory;
pub(crate) mod models;
pub mod sqlite;

use async_trait::async_trait;
use esett_ingestor::models::{range::TimeRange, row::Row, series::SeriesKey};
use snafu::{Backtrace, Snafu};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors raised by a [`SeriesStore`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// Could not open the database.
    #[snafu(display("Failed to connect to {url}: {source}"))]
    Connect {
        /// Database URL or path.
        url: String,
        /// Underlying diesel error.
        source: diesel::ConnectionError,
        /// Captured backtrace.
        backtrace: Backtrace,
    },

    /// A statement failed.
    #[snafu(display("Query failed: {source}"))]
    Query {
        /// Underlying diesel error.
        source: diesel::result::Error,
        /// Captured backtrace.
        backtrace: Backtrace,
    },

    /// Embedded migrations could not be applied.
    #[snafu(display("Migration failed: {message}"))]
    Migration {
        /// Migration harness message.
        message: String,
    },

    /// A persisted value could not be turned back into a domain value.
    #[snafu(display("Corrupt stored value: {message}"))]
    Corrupt {
        /// What was wrong.
        message: String,
    },

    /// The blocking worker panicked or was cancelled.
    #[snafu(display("Store worker failed: {source}"))]
    Join {
        /// Tokio join error.
        source: tokio::task::JoinError,
    },

    /// Injected or backend-specific failure without a richer source.
    #[snafu(display("Store unavailable: {message}"))]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

/// Persistent storage for rows and coverage metadata.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Insert or overwrite rows (last write wins). Returns rows written.
    async fn upsert(&self, rows: &[Row]) -> Result<usize, StoreError>;

    /// Rows of `key` with `range.start <= time < range.end`, ascending by time.
    async fn read_range(&self, key: SeriesKey, range: TimeRange) -> Result<Vec<Row>, StoreError>;

    /// Persisted covered intervals of `key`, ascending and disjoint.
    async fn coverage(&self, key: SeriesKey) -> Result<Vec<TimeRange>, StoreError>;

    /// Merge `range` into the persisted coverage of `key`.
    async fn record_coverage(&self, key: SeriesKey, range: TimeRange) -> Result<(), StoreError>;

    /// Persist the rows of one fetched gap, then record its coverage.
    ///
    /// Coverage is only written after the rows are acknowledged. An empty
    /// `range` writes rows only. Transactional stores override this with a
    /// single transaction.
    async fn commit(&self, key: SeriesKey, range: TimeRange, rows: &[Row]) -> Result<(), StoreError> {
        self.upsert(rows).await?;
        if !range.is_empty() {
            self.record_coverage(key, range).await?;
        }
        Ok(())
    }
}
