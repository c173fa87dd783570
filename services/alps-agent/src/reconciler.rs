//! Reconciliation loop for releasing orphaned reservations.
//!
//! Each pass:
//! - Tracks the reservation of every live job
//! - Lists what the allocator holds and flags holdings with no live owner
//! - Releases orphans that are past the grace period, retrying failures
//!   within a bounded window

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alps_reconcile::{
    release_target, scan_orphans, ConvergenceStatus, ReconcileError, ReleasePolicy, RetryTracker,
    DEFAULT_MAX_RETRIES, DEFAULT_RECONCILE_INTERVAL, DEFAULT_RETRY_WINDOW,
};
use alps_reservation::{JobId, ReservationRegistry};
use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::allocator::Allocator;
use crate::config::Config;
use crate::jobs::JobSource;

/// Reconciliation loop configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Interval between passes.
    pub reconcile_interval: Duration,

    /// Release attempts per orphan within the retry window.
    pub max_retries: u32,

    /// Retry window.
    pub retry_window: Duration,

    /// Time an id stays orphaned before it is released.
    pub orphan_grace: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_window: DEFAULT_RETRY_WINDOW,
            orphan_grace: alps_reconcile::DEFAULT_ORPHAN_GRACE,
        }
    }
}

impl From<&Config> for ReconcilerConfig {
    fn from(config: &Config) -> Self {
        Self {
            reconcile_interval: Duration::from_secs(config.reconcile_interval_secs),
            max_retries: config.release_max_retries,
            retry_window: Duration::from_secs(config.release_retry_window_secs),
            orphan_grace: Duration::from_secs(config.orphan_grace_secs),
        }
    }
}

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub jobs_tracked: usize,
    pub jobs_without_reservation: usize,
    pub orphans_flagged: usize,
    pub orphans_recovered: usize,
    pub stale_dropped: usize,
    pub orphans_pending_grace: usize,
    pub released: usize,
    pub release_failures: usize,
    pub skipped_exhausted: usize,
}

/// Reconciler for releasing orphaned reservations.
pub struct Reconciler {
    registry: Arc<ReservationRegistry>,
    allocator: Arc<dyn Allocator>,
    jobs: Arc<dyn JobSource>,
    policy: ReleasePolicy,
    retries: Mutex<RetryTracker>,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        registry: Arc<ReservationRegistry>,
        allocator: Arc<dyn Allocator>,
        jobs: Arc<dyn JobSource>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            registry,
            allocator,
            jobs,
            policy: ReleasePolicy::new(config.orphan_grace),
            retries: Mutex::new(RetryTracker::new(config.max_retries, config.retry_window)),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ReservationRegistry> {
        &self.registry
    }

    /// Run the reconciliation loop until shutdown.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            reconcile_interval_secs = self.config.reconcile_interval.as_secs(),
            orphan_grace_secs = self.config.orphan_grace.as_secs(),
            max_retries = self.config.max_retries,
            "Starting reconciliation loop"
        );

        let mut interval = tokio::time::interval(self.config.reconcile_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.reconcile_once().await {
                        Ok(stats) => {
                            if stats != ReconcileStats::default() {
                                info!(
                                    jobs_tracked = stats.jobs_tracked,
                                    orphans_flagged = stats.orphans_flagged,
                                    orphans_recovered = stats.orphans_recovered,
                                    stale_dropped = stats.stale_dropped,
                                    released = stats.released,
                                    release_failures = stats.release_failures,
                                    "Reconciliation pass complete"
                                );
                            }
                        }
                        Err(e) => error!(error = %e, "Reconciliation failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Reconciler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Perform a single reconciliation pass.
    pub async fn reconcile_once(&self) -> Result<ReconcileStats, ReconcileError> {
        let mut stats = ReconcileStats::default();

        let jobs = self.jobs.live_jobs().await.map_err(|e| {
            warn!(error = %e, "Failed to list live jobs, will retry");
            ReconcileError::JobSource(e.to_string())
        })?;

        let mut live = HashSet::with_capacity(jobs.len());
        for job in &jobs {
            live.insert(job.internal_id);
            match self.registry.track(job) {
                Ok(_) => stats.jobs_tracked += 1,
                Err(e) if e.is_no_reservation() => stats.jobs_without_reservation += 1,
                Err(e) => warn!(job_id = %job.internal_id, error = %e, "Failed to track job"),
            }
        }

        let held = self.allocator.list_reservations().await.map_err(|e| {
            warn!(error = %e, "Failed to list allocator reservations, will retry");
            ReconcileError::Allocator(e.to_string())
        })?;

        let scan = scan_orphans(&self.registry, &held, &live)?;
        stats.orphans_flagged = scan.newly_orphaned.len();
        stats.orphans_recovered = scan.recovered.len();
        stats.stale_dropped = scan.stale.len();

        debug!(
            held = held.len(),
            live_jobs = live.len(),
            orphans = scan.orphan_count(),
            "Orphan scan complete"
        );

        let now = Utc::now();
        let orphans = self.registry.orphans();
        let orphan_total = orphans.len();
        let due = self.policy.due(orphans, now);
        stats.orphans_pending_grace = orphan_total - due.len();

        for orphan in due {
            let id = orphan.id.as_str();
            if self.retries.lock().await.is_exhausted(id) {
                stats.skipped_exhausted += 1;
                continue;
            }

            let target = release_target(&orphan);
            match self.allocator.release(&target).await {
                Ok(()) => {
                    self.registry.release(id);
                    self.retries.lock().await.clear(id);
                    stats.released += 1;
                    info!(
                        rsv_id = id,
                        job_id = %orphan.owner,
                        nodes = target.node_names().len(),
                        orphaned_for_secs = (now - orphan.flagged_at).num_seconds(),
                        "Released orphaned reservation"
                    );
                }
                Err(e) => {
                    stats.release_failures += 1;
                    let recorded = self.retries.lock().await.record_failure(&orphan.id);
                    match recorded {
                        Ok(attempts) => {
                            warn!(rsv_id = id, attempts, error = %e, "Failed to release reservation")
                        }
                        Err(exhausted) => {
                            warn!(error = %exhausted, cause = %e, "Giving up on reservation for now")
                        }
                    }
                }
            }
        }

        self.retries.lock().await.retain_orphaned(&self.registry);
        Ok(stats)
    }

    /// Convergence of the registry against the allocator as of the last pass.
    pub async fn status(&self) -> ConvergenceStatus {
        let orphans = self.registry.orphaned_ids();
        if orphans.is_empty() {
            return ConvergenceStatus::Converged;
        }

        let retries = self.retries.lock().await;
        if orphans.iter().any(|id| retries.is_exhausted(id)) {
            ConvergenceStatus::Diverged
        } else {
            ConvergenceStatus::Converging
        }
    }

    /// Job that owns `rsv_id`, including orphans whose entry is gone.
    pub fn owner_of(&self, rsv_id: &str) -> Option<JobId> {
        self.registry
            .get(rsv_id)
            .map(|rsv| rsv.owning_job_id())
            .filter(JobId::is_set)
            .or_else(|| {
                self.registry
                    .is_orphaned(rsv_id)
                    .and_then(|job| JobId::parse(&job).ok())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciler_config_default() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.reconcile_interval, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_window, Duration::from_secs(600));
        assert_eq!(config.orphan_grace, Duration::from_secs(60));
    }

    #[test]
    fn test_reconciler_config_from_agent_config() {
        let config = Config::from_lookup(|name| match name {
            "ALPS_RECONCILE_INTERVAL" => Some("5".to_string()),
            "ALPS_ORPHAN_GRACE" => Some("0".to_string()),
            _ => None,
        })
        .unwrap();

        let reconciler_config = ReconcilerConfig::from(&config);
        assert_eq!(reconciler_config.reconcile_interval, Duration::from_secs(5));
        assert_eq!(reconciler_config.orphan_grace, Duration::ZERO);
        assert_eq!(reconciler_config.max_retries, 3);
    }
}
