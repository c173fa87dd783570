//! Orphan reconciliation primitives.
//!
//! This library compares three views of the world and converges the
//! reservation registry toward the allocator's truth:
//!
//! - **Allocator listing**: reservations the external allocator still holds.
//! - **Live jobs**: jobs this process currently knows are running.
//! - **Registry**: reservations tracked on behalf of those jobs.
//!
//! A held reservation whose owner is not a live job is orphaned. Orphans are
//! flagged first and released later, so the node list survives until the
//! allocator has actually freed the nodes.
//!
//! # Invariants
//!
//! - All operations are idempotent
//! - Decisions are deterministic given the same inputs
//! - Nothing is released before it has been orphaned for the grace period

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::{Duration, Instant};

use alps_reservation::{
    JobId, Orphan, Reservation, ReservationError, ReservationId, ReservationRegistry,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The registry rejected an update.
    #[error("registry error: {0}")]
    Registry(#[from] ReservationError),

    /// The allocator could not list or release reservations.
    #[error("allocator error: {0}")]
    Allocator(String),

    /// Live jobs could not be listed.
    #[error("job source error: {0}")]
    JobSource(String),

    /// Release retries exhausted for a reservation.
    #[error("release of reservation {rsv_id} failed {attempts} times, retries exhausted")]
    RetriesExhausted { rsv_id: String, attempts: u32 },
}

/// Convergence status of the registry against the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// Every held reservation belongs to a live job.
    Converged,

    /// Orphans exist and are waiting for release.
    Converging,

    /// Orphans exist whose release keeps failing (requires intervention).
    Diverged,
}

impl ConvergenceStatus {
    /// Returns true if nothing is left to clean up.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Returns true if cleanup is still in progress.
    pub fn is_converging(&self) -> bool {
        matches!(self, Self::Converging)
    }
}

/// A reservation the allocator reports as held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldReservation {
    pub id: ReservationId,

    /// Owner as reported by the allocator, when it knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owning_job: Option<JobId>,
}

impl HeldReservation {
    pub fn new(id: ReservationId, owning_job: Option<JobId>) -> Self {
        Self { id, owning_job }
    }
}

/// Outcome of one orphan scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanScan {
    /// Held and owned by a live job.
    pub owned: Vec<ReservationId>,

    /// Flagged orphaned by this scan.
    pub newly_orphaned: Vec<ReservationId>,

    /// Already flagged before this scan and still orphaned.
    pub still_orphaned: Vec<ReservationId>,

    /// Previously orphaned, owner live again; flag cleared.
    pub recovered: Vec<ReservationId>,

    /// Tracked or flagged, but no longer held by the allocator; dropped.
    pub stale: Vec<String>,
}

impl OrphanScan {
    /// Total orphans after the scan.
    pub fn orphan_count(&self) -> usize {
        self.newly_orphaned.len() + self.still_orphaned.len()
    }

    pub fn status(&self) -> ConvergenceStatus {
        if self.orphan_count() == 0 {
            ConvergenceStatus::Converged
        } else {
            ConvergenceStatus::Converging
        }
    }
}

/// Compare the allocator's listing with live jobs and update orphan flags.
///
/// - Held with a live owner: owned; any stale orphan flag is cleared.
/// - Held without a live owner: flagged orphaned (retaining the best known
///   owner). The entry, if any, is kept for the later release.
/// - Tracked or flagged but not held: the allocator already let go, so the
///   entry and flag are dropped. An entry whose owner is live is kept, since
///   the listing may predate it; only a stray orphan flag on it is cleared.
///
/// The tracked entry's owner takes precedence over the allocator's.
pub fn scan_orphans(
    registry: &ReservationRegistry,
    held: &[HeldReservation],
    live_jobs: &HashSet<JobId>,
) -> Result<OrphanScan, ReconcileError> {
    let mut scan = OrphanScan::default();

    let held: BTreeMap<&str, &HeldReservation> =
        held.iter().map(|h| (h.id.as_str(), h)).collect();

    for (&id, holding) in &held {
        let owner = registry
            .get(id)
            .map(|rsv| rsv.owning_job_id())
            .filter(JobId::is_set)
            .or(holding.owning_job.filter(JobId::is_set));
        let was_orphaned = registry.is_orphaned(id).is_some();

        if owner.is_some_and(|job| live_jobs.contains(&job)) {
            if was_orphaned {
                registry.mark_not_orphaned(id);
                scan.recovered.push(holding.id.clone());
            }
            scan.owned.push(holding.id.clone());
            continue;
        }

        registry.mark_orphaned(id, owner)?;
        if was_orphaned {
            scan.still_orphaned.push(holding.id.clone());
        } else {
            debug!(rsv_id = id, job_id = ?owner, "Reservation orphaned");
            scan.newly_orphaned.push(holding.id.clone());
        }
    }

    let owner_live = |id: &str| {
        registry
            .get(id)
            .is_some_and(|rsv| live_jobs.contains(&rsv.owning_job_id()))
    };

    let mut gone = BTreeSet::new();
    gone.extend(
        registry
            .snapshot()
            .into_iter()
            .filter(|rsv| !held.contains_key(rsv.id()))
            .filter(|rsv| !live_jobs.contains(&rsv.owning_job_id()))
            .map(|rsv| rsv.id().to_string()),
    );
    for id in registry.orphaned_ids() {
        if held.contains_key(id.as_str()) {
            continue;
        }
        if owner_live(id.as_str()) {
            debug!(rsv_id = %id, "Clearing orphan flag on live job's reservation");
            registry.mark_not_orphaned(&id);
        } else {
            gone.insert(id);
        }
    }

    for id in gone {
        registry.release(&id);
        scan.stale.push(id);
    }

    Ok(scan)
}

/// When an orphan may be handed to the allocator for release.
#[derive(Debug, Clone)]
pub struct ReleasePolicy {
    /// How long an id must stay orphaned before it is released.
    ///
    /// Covers the window after a restart where jobs are still being reloaded
    /// and their reservations look ownerless.
    pub grace: chrono::Duration,
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        Self {
            grace: chrono::Duration::seconds(DEFAULT_ORPHAN_GRACE.as_secs() as i64),
        }
    }
}

impl ReleasePolicy {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace: chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Returns true once `orphan` has been flagged for at least the grace
    /// period.
    pub fn is_due(&self, orphan: &Orphan, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(orphan.flagged_at) >= self.grace
    }

    /// Orphans due for release at `now`, in input order.
    pub fn due<I>(&self, orphans: I, now: DateTime<Utc>) -> Vec<Orphan>
    where
        I: IntoIterator<Item = Orphan>,
    {
        orphans
            .into_iter()
            .filter(|orphan| self.is_due(orphan, now))
            .collect()
    }
}

/// What the allocator needs to release an orphan.
///
/// The node list comes from the tracked entry when there is one; orphans the
/// allocator reported on its own release by id alone.
pub fn release_target(orphan: &Orphan) -> Reservation {
    orphan
        .reservation
        .clone()
        .unwrap_or_else(|| Reservation::new(orphan.owner, orphan.id.as_str()))
}

/// Failed release attempts for one reservation.
#[derive(Debug, Clone, Copy)]
struct FailureWindow {
    attempts: u32,
    first_failure: Instant,
}

/// Retry tracker for failed releases, keyed by reservation.
#[derive(Debug, Clone)]
pub struct RetryTracker {
    /// Maximum retries per reservation.
    max_retries: u32,

    /// Retry window duration.
    window: Duration,

    failures: BTreeMap<ReservationId, FailureWindow>,
}

impl RetryTracker {
    pub fn new(max_retries: u32, window: Duration) -> Self {
        Self {
            max_retries,
            window,
            failures: BTreeMap::new(),
        }
    }

    /// Record a failed release of `rsv_id`.
    ///
    /// Returns the attempts made in the current window, or
    /// [`ReconcileError::RetriesExhausted`] once they exceed the limit.
    pub fn record_failure(&mut self, rsv_id: &ReservationId) -> Result<u32, ReconcileError> {
        let now = Instant::now();

        let failure = self
            .failures
            .entry(rsv_id.clone())
            .or_insert(FailureWindow {
                attempts: 0,
                first_failure: now,
            });

        // Start over once the window has passed
        if now.duration_since(failure.first_failure) > self.window {
            failure.attempts = 0;
            failure.first_failure = now;
        }

        failure.attempts += 1;
        if failure.attempts > self.max_retries {
            Err(ReconcileError::RetriesExhausted {
                rsv_id: rsv_id.to_string(),
                attempts: failure.attempts,
            })
        } else {
            Ok(failure.attempts)
        }
    }

    /// Check if retries are exhausted for a reservation.
    pub fn is_exhausted(&self, rsv_id: &str) -> bool {
        self.failures.get(rsv_id).is_some_and(|failure| {
            Instant::now().duration_since(failure.first_failure) <= self.window
                && failure.attempts > self.max_retries
        })
    }

    /// Failures recorded for a reservation in the current window.
    pub fn failures(&self, rsv_id: &str) -> u32 {
        self.failures.get(rsv_id).map_or(0, |failure| failure.attempts)
    }

    /// Forget a reservation after a successful release.
    pub fn clear(&mut self, rsv_id: &str) {
        self.failures.remove(rsv_id);
    }

    /// Drop expired windows and reservations the registry no longer holds
    /// as orphaned (recovered, or dropped as stale).
    pub fn retain_orphaned(&mut self, registry: &ReservationRegistry) {
        let now = Instant::now();
        self.failures.retain(|id, failure| {
            now.duration_since(failure.first_failure) <= self.window
                && registry.is_orphaned(id.as_str()).is_some()
        });
    }

    /// Number of reservations with recorded failures.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Default reconciliation interval.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Default release retry limit per reservation.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default retry window.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(10 * 60); // 10 minutes

/// Default time an id stays orphaned before release.
pub const DEFAULT_ORPHAN_GRACE: Duration = Duration::from_secs(60);
