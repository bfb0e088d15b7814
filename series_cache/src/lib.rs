//! Read-through cache for eSett Nordic energy series.
//!
//! A query for (series, zone, time range) is answered from local storage.
//! Only the sub-ranges the cache lacks are fetched upstream, and concurrent
//! queries for overlapping cold ranges share one fetch. The pieces, leaves
//! first:
//! - [`interval`]: which ranges are cached, per series-key, and their gaps.
//! - [`coordinator`]: at most one in-flight fetch per overlapping range.
//! - [`store`]: durable rows and coverage metadata (SQLite or in-memory).
//! - [`synchronizer`]: the query path tying it all together.
//!
//! The upstream client, data model and codec live in `esett_ingestor`.

#![deny(missing_docs)]

pub mod bucket;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod errors;
pub mod interval;
pub mod page;
#[allow(missing_docs)]
pub mod schema;
pub mod store;
pub mod synchronizer;
pub mod tz;

pub use errors::{ErrorKind, SyncError};
pub use synchronizer::{CacheSynchronizer, QueryRequest, SyncSettings};
