//! Fetch Coordinator: at most one in-flight upstream fetch per overlapping
//! range of a series-key.
//!
//! [`FetchCoordinator::acquire_or_join`] splits a gap into pieces. Pieces that
//! intersect a fetch already in flight become [`Claim::Joined`] handles that
//! wait for that fetch's outcome. The remaining, uncovered pieces are
//! registered as new in-flight records and handed back as [`Claim::Owner`]
//! leases; the caller must fetch them and then [`FetchLease::resolve`].
//!
//! Each in-flight record carries a `watch` channel used as a notify-once
//! broadcast: the owner publishes a single outcome, every waiter observes it.
//! A lease dropped without resolving publishes `UpstreamUnavailable`, so
//! waiters are never stranded.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use esett_ingestor::models::{range::TimeRange, series::SeriesKey};
use tokio::sync::watch;
use tracing::debug;

use crate::{errors::SyncError, interval::complement};

/// Result of one fetch, shared with every joined caller.
pub type FetchOutcome = Result<(), SyncError>;

type OutcomeSlot = Option<FetchOutcome>;

#[derive(Debug)]
struct InFlight {
    id: u64,
    range: TimeRange,
    outcome: watch::Receiver<OutcomeSlot>,
}

type KeySlot = Arc<Mutex<Vec<InFlight>>>;

/// Deduplicates concurrent upstream fetches per series-key.
#[derive(Debug, Default)]
pub struct FetchCoordinator {
    keys: RwLock<HashMap<SeriesKey, KeySlot>>,
    next_id: AtomicU64,
}

/// One piece of a gap, as assigned by [`FetchCoordinator::acquire_or_join`].
#[derive(Debug)]
pub enum Claim {
    /// The caller must fetch this range and resolve the lease.
    Owner(FetchLease),
    /// Another caller is already fetching an overlapping range.
    Joined(FetchWaiter),
}

impl FetchCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: SeriesKey) -> KeySlot {
        if let Some(slot) = self
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return slot.clone();
        }
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone()
    }

    /// Take ownership of the uncovered parts of `gap` and join the rest.
    ///
    /// Returns one [`Claim::Joined`] per in-flight fetch that intersects
    /// `gap`, and one [`Claim::Owner`] per maximal sub-range of `gap` that no
    /// in-flight fetch covers. An empty `gap` yields no claims.
    pub fn acquire_or_join(&self, key: SeriesKey, gap: TimeRange) -> Vec<Claim> {
        if gap.is_empty() {
            return Vec::new();
        }
        let slot = self.slot(key);
        let mut in_flight = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let mut overlapping: Vec<&InFlight> =
            in_flight.iter().filter(|f| f.range.intersects(&gap)).collect();
        overlapping.sort_by_key(|f| f.range.start);

        let mut claims: Vec<Claim> = overlapping
            .iter()
            .map(|f| {
                debug!(%key, %gap, joined = %f.range, "joining in-flight fetch");
                Claim::Joined(FetchWaiter {
                    range: f.range,
                    outcome: f.outcome.clone(),
                })
            })
            .collect();

        // In-flight ranges for one key may overlap each other, so flatten
        // them before taking the complement.
        let mut busy = Vec::with_capacity(overlapping.len());
        for f in &overlapping {
            crate::interval::merge_into(&mut busy, f.range);
        }

        for residual in complement(gap, &busy) {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = watch::channel(None);
            in_flight.push(InFlight {
                id,
                range: residual,
                outcome: rx,
            });
            debug!(%key, range = %residual, "acquired fetch ownership");
            claims.push(Claim::Owner(FetchLease {
                key,
                range: residual,
                id,
                slot: slot.clone(),
                tx,
                finished: false,
            }));
        }

        claims
    }

    /// Number of fetches currently in flight for `key`.
    pub fn in_flight(&self, key: SeriesKey) -> usize {
        self.slot(key)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Ownership of one in-flight fetch. Resolve exactly once; dropping without
/// resolving reports the fetch as abandoned.
#[derive(Debug)]
pub struct FetchLease {
    key: SeriesKey,
    range: TimeRange,
    id: u64,
    slot: KeySlot,
    tx: watch::Sender<OutcomeSlot>,
    finished: bool,
}

impl FetchLease {
    /// Series-key being fetched.
    pub fn key(&self) -> SeriesKey {
        self.key
    }

    /// Range this lease is responsible for.
    pub fn range(&self) -> TimeRange {
        self.range
    }

    /// A handle that observes this lease's outcome.
    pub fn waiter(&self) -> FetchWaiter {
        FetchWaiter {
            range: self.range,
            outcome: self.tx.subscribe(),
        }
    }

    /// Publish `outcome` to every waiter and retire the in-flight record.
    pub fn resolve(mut self, outcome: FetchOutcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: FetchOutcome) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|f| f.id != self.id);
        self.tx.send_replace(Some(outcome));
    }
}

impl Drop for FetchLease {
    fn drop(&mut self) {
        if !self.finished {
            debug!(key = %self.key, range = %self.range, "fetch lease dropped unresolved");
            self.finish(Err(SyncError::UpstreamUnavailable(format!(
                "fetch of {} for {} was abandoned",
                self.range, self.key
            ))));
        }
    }
}

/// Waits for the outcome of a fetch owned by someone else.
#[derive(Debug, Clone)]
pub struct FetchWaiter {
    range: TimeRange,
    outcome: watch::Receiver<OutcomeSlot>,
}

impl FetchWaiter {
    /// Range of the fetch being waited on.
    pub fn range(&self) -> TimeRange {
        self.range
    }

    /// Wait for the owner to resolve. Dropping the future just stops waiting.
    pub async fn wait(mut self) -> FetchOutcome {
        match self.outcome.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone().unwrap_or_else(|| {
                Err(SyncError::UpstreamUnavailable(
                    "fetch resolved without an outcome".into(),
                ))
            }),
            Err(_) => Err(SyncError::UpstreamUnavailable(format!(
                "fetch of {} ended without publishing a result",
                self.range
            ))),
        }
    }
}
