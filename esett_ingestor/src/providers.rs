//! Upstream source abstraction for eSett-style time-series feeds.
//!
//! [`UpstreamSource`] is the seam between the cache and the network: it turns
//! a (series, zone, range) request into a lazy, finite stream of pages of raw
//! JSON records. Each call restarts from the beginning of the range, so a
//! failed fetch can simply be retried by calling again.
//!
//! The trait is object safe and `Send + Sync`, so the cache can hold an
//! `Arc<dyn UpstreamSource>` and swap the live provider for a scripted one in
//! tests.
//!
//! # Example
//!
//! ```rust
//! use esett_ingestor::models::{range::TimeRange, series::Series, zone::Zone};
//! use esett_ingestor::providers::{PageStream, UpstreamSource};
//! use futures::StreamExt;
//!
//! struct Empty;
//!
//! impl UpstreamSource for Empty {
//!     fn fetch_page_sequence(&self, _: Series, _: Zone, _: TimeRange) -> PageStream<'_> {
//!         futures::stream::empty().boxed()
//!     }
//! }
//! ```

pub mod esett_rest;

use futures::stream::BoxStream;
use snafu::{Backtrace, Snafu};

use crate::{
    codec::RawRecord,
    models::{range::TimeRange, series::Series, zone::Zone},
};

/// A lazy sequence of pages. The stream ends after the last page; an `Err`
/// item is terminal.
pub type PageStream<'a> = BoxStream<'a, Result<Vec<RawRecord>, ProviderError>>;

/// Source of raw upstream pages for one series-key and time range.
pub trait UpstreamSource: Send + Sync {
    /// Start paginating `range` for `series` in `zone`.
    ///
    /// Pages arrive in ascending time order. Records may fall slightly
    /// outside `range` (upstream bounds are inclusive); callers filter.
    fn fetch_page_sequence(&self, series: Series, zone: Zone, range: TimeRange) -> PageStream<'_>;
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The configured base URL does not parse or cannot carry a path.
    #[snafu(display("Invalid base URL `{url}`: {message}"))]
    InvalidBaseUrl {
        url: String,
        message: String,
        backtrace: Backtrace,
    },
}

/// Errors surfaced by an [`UpstreamSource`] page stream.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// The upstream refused the request; retrying will not help.
    #[snafu(display("Upstream rejected request with status {status}: {message}"))]
    Rejected {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// Transient failures persisted past the retry budget.
    #[snafu(display("Upstream unavailable after {attempts} attempt(s): {message}"))]
    Exhausted {
        attempts: u32,
        message: String,
        backtrace: Backtrace,
    },

    /// The request could not be sent at all (malformed URL or parameters).
    #[snafu(display("Failed to build upstream request: {message}"))]
    Transport {
        message: String,
        backtrace: Backtrace,
    },

    /// A successful response carried a body that is not a JSON array of objects.
    #[snafu(display("Malformed upstream payload: {message}"))]
    Payload {
        message: String,
        backtrace: Backtrace,
    },
}
