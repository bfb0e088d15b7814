//! Cache Synchronizer: answers a (series, zone, range) query with a complete,
//! ordered window, fetching only what the cache lacks.
//!
//! Per query:
//! 1. validate and align the range outward to the series' granularity;
//! 2. hydrate the key's interval set from persisted coverage (first touch);
//! 3. compute gaps and hand each to the [`FetchCoordinator`], concurrently;
//! 4. owners fetch on a spawned task, decode, commit rows plus coverage, then
//!    mark the interval covered and resolve; joiners wait for that outcome;
//! 5. read the aligned window from the store and slice one page.
//!
//! Any gap failure fails the whole query. Failed gaps are never marked
//! covered, so the next identical query simply retries them.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use esett_ingestor::{
    codec::decode,
    models::{
        range::TimeRange,
        row::Row,
        series::{Series, SeriesKey},
        zone::Zone,
    },
    providers::UpstreamSource,
};
use futures::{TryStreamExt, future::join_all};
use tracing::{Instrument, debug, error, info, info_span};

use crate::{
    bucket,
    coordinator::{Claim, FetchCoordinator, FetchLease},
    errors::SyncError,
    interval::IntervalStore,
    page::{Page, PageToken},
    store::SeriesStore,
    tz::parse_utc_lenient,
};

/// Tunables for [`CacheSynchronizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Upper bound on one gap fetch, including retries.
    pub fetch_deadline: Duration,
    /// Page size when the caller gives none.
    pub default_page_size: usize,
    /// Largest accepted page size.
    pub max_page_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            fetch_deadline: Duration::from_secs(120),
            default_page_size: 1000,
            max_page_size: 10_000,
        }
    }
}

/// One query as received from the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Series to read.
    pub series: Series,
    /// Bidding zone.
    pub zone: Zone,
    /// Inclusive start of the window.
    pub start: DateTime<Utc>,
    /// Exclusive end of the window.
    pub end: DateTime<Utc>,
    /// Rows per page; `None` uses the configured default.
    pub page_size: Option<usize>,
    /// Continuation token from a previous page.
    pub page_token: Option<String>,
}

impl QueryRequest {
    /// First page of `[start, end)` with the default page size.
    pub fn new(series: Series, zone: Zone, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            series,
            zone,
            start,
            end,
            page_size: None,
            page_token: None,
        }
    }

    /// Parse untyped edge input. Unknown series or zone and unparseable
    /// timestamps are [`SyncError::InvalidRange`].
    pub fn parse(series: &str, zone: &str, start: &str, end: &str) -> Result<Self, SyncError> {
        let series: Series = series
            .parse()
            .map_err(|e| SyncError::InvalidRange(format!("{e}")))?;
        let zone: Zone = zone
            .parse()
            .map_err(|e| SyncError::InvalidRange(format!("{e}")))?;
        let start =
            parse_utc_lenient(start).map_err(|e| SyncError::InvalidRange(format!("{e:#}")))?;
        let end = parse_utc_lenient(end).map_err(|e| SyncError::InvalidRange(format!("{e:#}")))?;
        Ok(Self::new(series, zone, start, end))
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Continue from `token`.
    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    /// Series-key of this request.
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.series, self.zone)
    }
}

/// Everything an owner fetch needs, shareable with a spawned task.
struct FetchContext {
    upstream: Arc<dyn UpstreamSource>,
    store: Arc<dyn SeriesStore>,
    intervals: Arc<IntervalStore>,
    deadline: Duration,
}

/// Read-through cache over an [`UpstreamSource`].
pub struct CacheSynchronizer {
    ctx: Arc<FetchContext>,
    coordinator: FetchCoordinator,
    settings: SyncSettings,
}

impl CacheSynchronizer {
    /// Build a synchronizer over `upstream` and `store`.
    pub fn new(
        upstream: Arc<dyn UpstreamSource>,
        store: Arc<dyn SeriesStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            ctx: Arc::new(FetchContext {
                upstream,
                store,
                intervals: Arc::new(IntervalStore::new()),
                deadline: settings.fetch_deadline,
            }),
            coordinator: FetchCoordinator::new(),
            settings,
        }
    }

    /// The in-memory interval index.
    pub fn intervals(&self) -> &IntervalStore {
        &self.ctx.intervals
    }

    /// The fetch coordinator.
    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    /// Answer `request` with one page of rows covering exactly
    /// `[floor(start), ceil(end))`, fetching missing ranges first.
    pub async fn query(&self, request: QueryRequest) -> Result<Page, SyncError> {
        let page_size = self.validate_page_size(request.page_size)?;
        if request.start > request.end {
            return Err(SyncError::InvalidRange(format!(
                "start {} is after end {}",
                request.start, request.end
            )));
        }
        if request.start == request.end {
            return Ok(Page::empty());
        }

        let key = request.key();
        let aligned = bucket::align_outward(
            TimeRange {
                start: request.start,
                end: request.end,
            },
            key.series.granularity(),
        );
        let cursor = parse_cursor(request.page_token.as_deref(), aligned)?;

        let span = info_span!("query", %key, range = %aligned, page_size);
        async move {
            self.hydrate(key).await?;

            let gaps = self.ctx.intervals.gaps(key, aligned);
            let cached = gaps.is_empty();
            debug!(gaps = gaps.len(), cached, "computed gaps");

            let outcomes = join_all(gaps.into_iter().map(|gap| self.sync_gap(key, gap))).await;
            if let Some(err) = outcomes.into_iter().find_map(Result::err) {
                error!(error.kind = %err.kind(), error = %err, "query failed");
                return Err(err);
            }

            let rows = self.ctx.store.read_range(key, aligned).await?;
            let page = Page::slice(rows, cursor, page_size, cached);
            debug!(total = page.total, returned = page.data.len(), "query served");
            Ok(page)
        }
        .instrument(span)
        .await
    }

    fn validate_page_size(&self, requested: Option<usize>) -> Result<usize, SyncError> {
        let page_size = requested.unwrap_or(self.settings.default_page_size);
        if page_size == 0 || page_size > self.settings.max_page_size {
            return Err(SyncError::InvalidRange(format!(
                "page_size must be between 1 and {}, got {page_size}",
                self.settings.max_page_size
            )));
        }
        Ok(page_size)
    }

    /// Load persisted coverage for `key` on first touch.
    async fn hydrate(&self, key: SeriesKey) -> Result<(), SyncError> {
        if self.ctx.intervals.is_hydrated(key) {
            return Ok(());
        }
        let persisted = self.ctx.store.coverage(key).await?;
        debug!(%key, intervals = persisted.len(), "hydrated coverage");
        self.ctx.intervals.hydrate(key, persisted);
        Ok(())
    }

    /// Resolve one gap: own the uncovered parts, join the rest, wait for all.
    async fn sync_gap(&self, key: SeriesKey, gap: TimeRange) -> Result<(), SyncError> {
        let mut waiters = Vec::new();
        for claim in self.coordinator.acquire_or_join(key, gap) {
            match claim {
                Claim::Owner(lease) => {
                    waiters.push(lease.waiter());
                    let ctx = self.ctx.clone();
                    let span = info_span!("fetch", %key, range = %lease.range());
                    // Detached so a caller that stops waiting never cancels a
                    // fetch other callers joined.
                    tokio::spawn(run_fetch(ctx, lease).instrument(span));
                }
                Claim::Joined(waiter) => waiters.push(waiter),
            }
        }
        for waiter in waiters {
            waiter.wait().await?;
        }
        Ok(())
    }
}

fn parse_cursor(token: Option<&str>, window: TimeRange) -> Result<Option<PageToken>, SyncError> {
    let Some(token) = token else {
        return Ok(None);
    };
    let cursor: PageToken = token
        .parse()
        .map_err(|e| SyncError::InvalidRange(format!("{e}")))?;
    if !window.contains(cursor.time) {
        return Err(SyncError::InvalidRange(format!(
            "page token {token} lies outside {window}"
        )));
    }
    Ok(Some(cursor))
}

/// Owner side of a gap: fetch within the deadline, then resolve the lease.
async fn run_fetch(ctx: Arc<FetchContext>, lease: FetchLease) {
    let key = lease.key();
    let range = lease.range();

    // Another owner may have filled some of this range between gap
    // computation and acquisition; fetch only what is still missing.
    let missing = ctx.intervals.gaps(key, range);
    if missing.is_empty() {
        debug!("range already covered, skipping fetch");
        lease.resolve(Ok(()));
        return;
    }
    if missing.len() != 1 || missing[0] != range {
        debug!(pieces = missing.len(), "range partly covered meanwhile");
    }

    let fetch = async {
        for piece in missing {
            ctx.fetch_and_commit(key, piece).await?;
        }
        Ok::<_, SyncError>(())
    };
    let outcome = match tokio::time::timeout(ctx.deadline, fetch).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::UpstreamUnavailable(format!(
            "fetch of {range} for {key} exceeded deadline of {:?}",
            ctx.deadline
        ))),
    };
    if let Err(err) = &outcome {
        error!(error.kind = %err.kind(), error = %err, "upstream fetch failed");
    }
    lease.resolve(outcome);
}

impl FetchContext {
    /// Pull every page of `range`, decode, persist, and mark covered.
    ///
    /// Coverage stops at the current bucket so not-yet-published hours are
    /// fetched again later.
    async fn fetch_and_commit(&self, key: SeriesKey, range: TimeRange) -> Result<(), SyncError> {
        info!("fetching from upstream");
        let mut pages = self
            .upstream
            .fetch_page_sequence(key.series, key.zone, range);

        let mut rows: Vec<Row> = Vec::new();
        let mut page_count = 0usize;
        while let Some(page) = pages.try_next().await? {
            page_count += 1;
            for raw in &page {
                let row = decode(key.series, key.zone, raw)?;
                if range.contains(row.time) {
                    rows.push(row);
                }
            }
        }
        drop(pages);

        let horizon = bucket::floor(Utc::now(), key.series.granularity());
        let coverage = TimeRange {
            start: range.start,
            end: range.end.min(horizon).max(range.start),
        };

        self.store.commit(key, coverage, &rows).await?;
        if !coverage.is_empty() {
            self.intervals.mark_covered(key, coverage);
        }
        info!(pages = page_count, rows = rows.len(), covered = %coverage, "fetch committed");
        Ok(())
    }
}
