//! # alps-id
//!
//! Typed identifiers for ALPS reservation tracking.
//!
//! ## Design Principles
//!
//! - Job ids are process-local integers handed out by the job subsystem;
//!   `-1` means "not bound to a job yet"
//! - Reservation ids are assigned by the external allocator and are opaque
//!   strings; the only structural rule is that they are non-empty
//! - Parsing is strict, formatting is canonical, and both roundtrip
//!
//! Examples:
//! - `JobId::new(42)` displays as `42`
//! - `ReservationId::parse("1187")` is a valid reservation key
//! - `ReservationId::parse("")` is rejected with [`IdError::Empty`]

mod error;
mod types;

pub use error::IdError;
pub use types::*;
