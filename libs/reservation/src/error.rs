//! Error types for reservation tracking.

use alps_id::JobId;
use thiserror::Error;

/// Errors returned by registry operations.
///
/// Absent ids are never an error: `remove` and `mark_not_orphaned` on an
/// unknown id are no-ops. A malformed placement string is not an error either;
/// it degrades to a shorter node list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// The reservation to store has an empty id.
    #[error("reservation ID cannot be empty")]
    EmptyIdentifier,

    /// The job passed to `track` holds no reservation.
    #[error("job {0} holds no reservation")]
    NoReservation(JobId),
}

impl ReservationError {
    /// Returns true if the job simply had no reservation to track.
    ///
    /// Most callers treat this as the normal case rather than a failure.
    pub fn is_no_reservation(&self) -> bool {
        matches!(self, ReservationError::NoReservation(_))
    }
}
