//! ALPS Reservation Agent Library
//!
//! The agent keeps the reservation registry in step with the external
//! allocator. On every pass it tracks the reservations of live jobs, flags
//! the allocator's holdings that no live job owns, and releases those orphans
//! once they have been ownerless for the grace period.
//!
//! ## Architecture
//!
//! ```text
//! Reconciler
//! ├── JobSource          (live jobs and their reservation attributes)
//! ├── Allocator          (held reservations, release calls)
//! └── ReservationRegistry (shared, process-wide)
//! ```
//!
//! ## Modules
//!
//! - `allocator`: allocator interface and in-memory implementation
//! - `jobs`: job source interface and in-memory implementation
//! - `inventory`: JSON inventory seeding the in-memory sources
//! - `reconciler`: the reconciliation loop

pub mod allocator;
pub mod config;
pub mod inventory;
pub mod jobs;
pub mod reconciler;

// Re-export commonly used types
pub use allocator::{Allocator, MockAllocator};
pub use jobs::{JobSource, StaticJobSource};
pub use reconciler::{ReconcileStats, Reconciler, ReconcilerConfig};
