//! JSON inventory for the in-memory job source and allocator.
//!
//! Lets the agent run without a live job subsystem or allocator:
//!
//! ```json
//! {
//!   "jobs": [
//!     {"internal_id": 12, "reservation_id": "4410", "exec_host": "nid00010/0+nid00010/1"}
//!   ],
//!   "reservations": [
//!     {"id": "4410", "owning_job": 12},
//!     {"id": "4411"}
//!   ]
//! }
//! ```

use std::path::Path;

use alps_reconcile::HeldReservation;
use alps_reservation::JobAttributes;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::allocator::MockAllocator;
use crate::jobs::StaticJobSource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    /// Live jobs.
    #[serde(default)]
    pub jobs: Vec<JobAttributes>,

    /// Reservations the allocator holds.
    #[serde(default)]
    pub reservations: Vec<HeldReservation>,
}

impl Inventory {
    /// Read an inventory file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read inventory {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse inventory {}", path.display()))
    }

    /// Build the in-memory sources this inventory describes.
    pub fn into_sources(self) -> (StaticJobSource, MockAllocator) {
        (
            StaticJobSource::new(self.jobs),
            MockAllocator::with_holdings(self.reservations),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use alps_reservation::JobId;

    use super::*;
    use crate::allocator::Allocator;
    use crate::jobs::JobSource;

    #[tokio::test]
    async fn test_load_inventory() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "jobs": [{{"internal_id": 12, "reservation_id": "4410", "exec_host": "a/0+a/1"}}],
                "reservations": [{{"id": "4410", "owning_job": 12}}, {{"id": "4411"}}]
            }}"#
        )
        .unwrap();

        let inventory = Inventory::load(file.path()).unwrap();
        assert_eq!(inventory.jobs.len(), 1);
        assert_eq!(inventory.reservations[0].owning_job, Some(JobId::new(12)));
        assert_eq!(inventory.reservations[1].owning_job, None);

        let (jobs, allocator) = inventory.into_sources();
        assert_eq!(jobs.live_jobs().await.unwrap().len(), 1);
        assert_eq!(allocator.list_reservations().await.unwrap().len(), 2);
    }

    #[test]
    fn test_empty_inventory() {
        let inventory: Inventory = serde_json::from_str("{}").unwrap();
        assert_eq!(inventory, Inventory::default());
    }

    #[test]
    fn test_rejects_empty_reservation_id() {
        let result: Result<Inventory, _> =
            serde_json::from_str(r#"{"reservations": [{"id": ""}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Inventory::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read inventory"));
    }
}
