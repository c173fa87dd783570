//! The reservation registry.
//!
//! One registry exists per process. It is created empty at startup and shared
//! by handle (`Arc<ReservationRegistry>`) with every component that tracks or
//! reconciles reservations; tests build isolated instances.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use alps_id::{JobId, ReservationId};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::ReservationError;
use crate::job::JobSnapshot;
use crate::reservation::Reservation;

/// Orphan flag with the owner retained at flag time.
#[derive(Debug, Clone)]
struct OrphanRecord {
    owner: JobId,
    flagged_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<ReservationId, Reservation>,
    orphaned: HashMap<ReservationId, OrphanRecord>,
}

impl Inner {
    /// Current owner of an orphaned id: the tracked entry wins, then the
    /// owner retained when the flag was set.
    fn orphan_owner(&self, rsv_id: &str, record: &OrphanRecord) -> JobId {
        self.entries
            .get(rsv_id)
            .map(Reservation::owning_job_id)
            .filter(JobId::is_set)
            .unwrap_or(record.owner)
    }
}

/// A reservation flagged orphaned, as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub id: ReservationId,

    /// Last known owner; [`JobId::UNSET`] if none was ever known.
    pub owner: JobId,

    pub flagged_at: DateTime<Utc>,

    /// The tracked entry, if it has not been removed yet.
    pub reservation: Option<Reservation>,
}

/// Concurrency-safe map of reservation id to [`Reservation`], plus the set of
/// ids flagged orphaned.
///
/// Both structures sit behind a single mutex and every method holds it for its
/// whole body, so operations are strictly ordered with respect to each other.
/// No method blocks on I/O while holding the lock.
#[derive(Debug, Default)]
pub struct ReservationRegistry {
    inner: Mutex<Inner>,
}

impl ReservationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves both maps consistent, so a panic in
    // another thread does not invalidate the data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track the reservation held by `job`, replacing any entry with the
    /// same id.
    ///
    /// Returns [`ReservationError::NoReservation`] and records nothing when the
    /// job has no reservation id.
    pub fn track<J: JobSnapshot + ?Sized>(
        &self,
        job: &J,
    ) -> Result<ReservationId, ReservationError> {
        let reservation = Reservation::from_job(job);
        let key = ReservationId::parse(reservation.id())
            .map_err(|_| ReservationError::NoReservation(job.internal_id()))?;

        debug!(
            rsv_id = %key,
            job_id = %reservation.owning_job_id(),
            nodes = reservation.node_names().len(),
            "Tracking reservation"
        );

        self.lock().entries.insert(key.clone(), reservation);
        Ok(key)
    }

    /// Insert an already-built reservation, returning the entry it replaced.
    pub fn insert(
        &self,
        reservation: Reservation,
    ) -> Result<Option<Reservation>, ReservationError> {
        let key = ReservationId::parse(reservation.id())
            .map_err(|_| ReservationError::EmptyIdentifier)?;

        debug!(
            rsv_id = %key,
            job_id = %reservation.owning_job_id(),
            "Inserting reservation"
        );

        Ok(self.lock().entries.insert(key, reservation))
    }

    /// Remove the entry for `rsv_id`. The orphan flag is left untouched.
    ///
    /// Removing an unknown id is a no-op.
    pub fn remove(&self, rsv_id: &str) -> Option<Reservation> {
        let removed = self.lock().entries.remove(rsv_id);
        if removed.is_some() {
            debug!(rsv_id, "Removed reservation");
        }
        removed
    }

    /// Returns true if `rsv_id` has a tracked entry.
    pub fn already_recorded(&self, rsv_id: &str) -> bool {
        self.lock().entries.contains_key(rsv_id)
    }

    /// Returns `Some(job_id)` if `rsv_id` is flagged orphaned, `None` otherwise.
    ///
    /// `job_id` is the owner of the tracked entry if there still is one, else
    /// the owner retained when the flag was set. It is empty when neither is
    /// known.
    pub fn is_orphaned(&self, rsv_id: &str) -> Option<String> {
        let inner = self.lock();
        let record = inner.orphaned.get(rsv_id)?;
        let owner = inner.orphan_owner(rsv_id, record);

        Some(if owner.is_set() {
            owner.to_string()
        } else {
            String::new()
        })
    }

    /// Flag `rsv_id` as orphaned.
    ///
    /// The retained owner is `owner` if given, else the owner of the tracked
    /// entry. The id does not have to be tracked: the allocator may report
    /// reservations this process never saw. Flagging an already-orphaned id
    /// keeps its original flag time.
    pub fn mark_orphaned(
        &self,
        rsv_id: &str,
        owner: Option<JobId>,
    ) -> Result<(), ReservationError> {
        let key = ReservationId::parse(rsv_id).map_err(|_| ReservationError::EmptyIdentifier)?;

        let mut inner = self.lock();
        let owner = owner
            .filter(JobId::is_set)
            .or_else(|| inner.entries.get(rsv_id).map(Reservation::owning_job_id))
            .unwrap_or(JobId::UNSET);

        debug!(rsv_id, job_id = %owner, "Flagging reservation orphaned");

        inner
            .orphaned
            .entry(key)
            .and_modify(|record| {
                if owner.is_set() {
                    record.owner = owner;
                }
            })
            .or_insert_with(|| OrphanRecord {
                owner,
                flagged_at: Utc::now(),
            });
        Ok(())
    }

    /// Clear the orphan flag for `rsv_id`. A no-op if it is not flagged.
    pub fn mark_not_orphaned(&self, rsv_id: &str) {
        if self.lock().orphaned.remove(rsv_id).is_some() {
            debug!(rsv_id, "Cleared orphan flag");
        }
    }

    /// Finish cleanup of a released reservation: drop the entry and the
    /// orphan flag together, returning the entry if there was one.
    pub fn release(&self, rsv_id: &str) -> Option<Reservation> {
        let mut inner = self.lock();
        let removed = inner.entries.remove(rsv_id);
        let was_orphaned = inner.orphaned.remove(rsv_id).is_some();
        drop(inner);

        debug!(
            rsv_id,
            tracked = removed.is_some(),
            was_orphaned,
            "Released reservation"
        );
        removed
    }

    /// Copy of the entry for `rsv_id`.
    pub fn get(&self, rsv_id: &str) -> Option<Reservation> {
        self.lock().entries.get(rsv_id).cloned()
    }

    /// Copy of the reservation owned by `job_id`, if any.
    pub fn reservation_for_job(&self, job_id: JobId) -> Option<Reservation> {
        self.lock()
            .entries
            .values()
            .find(|rsv| rsv.owning_job_id() == job_id)
            .cloned()
    }

    /// Copies of every tracked entry, ordered by id.
    pub fn snapshot(&self) -> Vec<Reservation> {
        let mut all: Vec<_> = self.lock().entries.values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Every orphaned id, sorted.
    pub fn orphaned_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self
            .lock()
            .orphaned
            .keys()
            .map(|id| id.as_str().to_string())
            .collect();
        ids.sort();
        ids
    }

    /// Every orphan with its owner and entry (if still tracked), oldest
    /// flag first.
    pub fn orphans(&self) -> Vec<Orphan> {
        let inner = self.lock();
        let mut orphans: Vec<_> = inner
            .orphaned
            .iter()
            .map(|(id, record)| Orphan {
                id: id.clone(),
                owner: inner.orphan_owner(id.as_str(), record),
                flagged_at: record.flagged_at,
                reservation: inner.entries.get(id).cloned(),
            })
            .collect();
        drop(inner);

        orphans.sort_by(|a, b| a.flagged_at.cmp(&b.flagged_at).then_with(|| a.id.cmp(&b.id)));
        orphans
    }

    /// Drop every entry and every orphan flag.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let entries = inner.entries.len();
        let orphaned = inner.orphaned.len();
        inner.entries.clear();
        inner.orphaned.clear();
        drop(inner);

        debug!(entries, orphaned, "Cleared reservation registry");
    }

    /// Number of tracked entries.
    pub fn count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Number of ids flagged orphaned, tracked or not.
    pub fn orphan_count(&self) -> usize {
        self.lock().orphaned.len()
    }
}
