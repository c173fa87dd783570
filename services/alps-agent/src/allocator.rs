//! External allocator interface and in-memory implementation.
//!
//! The allocator interface abstracts the out-of-process system that actually
//! holds node allocations:
//! - Listing the reservations it currently holds
//! - Releasing a reservation and its nodes
//!
//! An in-memory implementation is provided for testing and development.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use alps_reconcile::HeldReservation;
use alps_reservation::{Reservation, ReservationId};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// External allocator interface.
#[async_trait]
pub trait Allocator: Send + Sync {
    /// Every reservation the allocator currently holds.
    async fn list_reservations(&self) -> Result<Vec<HeldReservation>>;

    /// Release a reservation. `reservation` carries the node list when known.
    async fn release(&self, reservation: &Reservation) -> Result<()>;
}

/// In-memory allocator for testing and development.
pub struct MockAllocator {
    /// Held reservations by id.
    held: RwLock<BTreeMap<ReservationId, HeldReservation>>,

    /// Number of successful releases.
    released: AtomicU64,

    /// Whether releases should "fail".
    fail_releases: AtomicBool,
}

impl MockAllocator {
    /// Create an allocator holding nothing.
    pub fn new() -> Self {
        Self::with_holdings(Vec::new())
    }

    /// Create an allocator holding `holdings`.
    pub fn with_holdings<I>(holdings: I) -> Self
    where
        I: IntoIterator<Item = HeldReservation>,
    {
        Self {
            held: RwLock::new(holdings.into_iter().map(|h| (h.id.clone(), h)).collect()),
            released: AtomicU64::new(0),
            fail_releases: AtomicBool::new(false),
        }
    }

    /// Start holding a reservation (as if the allocator had just granted it).
    pub async fn hold(&self, holding: HeldReservation) {
        self.held.write().await.insert(holding.id.clone(), holding);
    }

    /// Returns true while the allocator holds `rsv_id`.
    pub async fn holds(&self, rsv_id: &str) -> bool {
        self.held.read().await.contains_key(rsv_id)
    }

    /// Make subsequent releases fail (or succeed again).
    pub fn set_fail_releases(&self, fail: bool) {
        self.fail_releases.store(fail, Ordering::SeqCst);
    }

    /// Number of successful releases so far.
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

impl Default for MockAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Allocator for MockAllocator {
    async fn list_reservations(&self) -> Result<Vec<HeldReservation>> {
        let held: Vec<_> = self.held.read().await.values().cloned().collect();
        debug!(count = held.len(), "[MOCK] Listing reservations");
        Ok(held)
    }

    async fn release(&self, reservation: &Reservation) -> Result<()> {
        if self.fail_releases.load(Ordering::SeqCst) {
            anyhow::bail!("Mock allocator configured to fail");
        }

        let removed = self.held.write().await.remove(reservation.id());
        if removed.is_none() {
            anyhow::bail!("reservation {} is not held", reservation.id());
        }

        self.released.fetch_add(1, Ordering::SeqCst);
        info!(
            rsv_id = %reservation.id(),
            job_id = %reservation.owning_job_id(),
            nodes = ?reservation.node_names(),
            "[MOCK] Released reservation"
        );
        Ok(())
    }
}
