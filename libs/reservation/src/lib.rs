//! # alps-reservation
//!
//! Tracks the ALPS reservations (external node allocations) held on behalf of
//! batch jobs, and which of them have become orphaned.
//!
//! ## Concepts
//!
//! - **Reservation**: one external allocation: its id, the internal id of
//!   the owning job and the hosts backing it. Built from a job snapshot by
//!   parsing the job's `exec_host` placement string.
//! - **Registry**: the single source of truth mapping reservation ids to
//!   reservations, plus the set of ids flagged orphaned (still held by the
//!   allocator, no longer owned by a live job).
//!
//! ## Orphan cleanup is two-phase
//!
//! 1. Flag the id orphaned with [`ReservationRegistry::mark_orphaned`]. The
//!    entry stays in place so its node list is available to the release call.
//! 2. Once the allocator has released it, drop both the entry and the flag
//!    with [`ReservationRegistry::release`] (or `remove` + `mark_not_orphaned`).
//!
//! ## Invariants
//!
//! - Every registry operation holds one lock for its full duration
//! - No operation panics or leaves the entry map and orphan set out of step
//! - `remove` and `mark_not_orphaned` are idempotent

mod error;
mod job;
mod placement;
mod registry;
mod reservation;

pub use error::ReservationError;
pub use job::{JobAttributes, JobSnapshot};
pub use placement::parse_exec_host;
pub use registry::{Orphan, ReservationRegistry};
pub use reservation::Reservation;

pub use alps_id::{JobId, ReservationId};
