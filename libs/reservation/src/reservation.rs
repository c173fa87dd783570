//! The reservation value type.

use alps_id::JobId;
use serde::{Deserialize, Serialize};

use crate::job::JobSnapshot;
use crate::placement::parse_exec_host;

/// One external node allocation held on behalf of a job.
///
/// Immutable once built. The registry replaces entries wholesale and hands
/// out clones, so a `Reservation` never needs synchronization of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    id: String,
    owning_job_id: JobId,
    node_names: Vec<String>,
}

impl Reservation {
    /// A reservation known to exist before its hosts are resolved.
    pub fn new(owning_job_id: JobId, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owning_job_id,
            node_names: Vec::new(),
        }
    }

    /// Builds a reservation from a job's current attributes.
    ///
    /// A job without a reservation id yields an empty id. The host list comes
    /// from [`parse_exec_host`]; a missing placement string yields no hosts.
    pub fn from_job<J: JobSnapshot + ?Sized>(job: &J) -> Self {
        let node_names = job
            .exec_host()
            .map(parse_exec_host)
            .unwrap_or_default()
            .into_iter()
            .map(str::to_string)
            .collect();

        Self {
            id: job.reservation_id().unwrap_or_default().to_string(),
            owning_job_id: job.internal_id(),
            node_names,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owning_job_id(&self) -> JobId {
        self.owning_job_id
    }

    /// Hosts backing the allocation, in placement order.
    pub fn node_names(&self) -> &[String] {
        &self.node_names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobAttributes;

    #[test]
    fn test_default_is_placeholder() {
        let rsv = Reservation::default();
        assert_eq!(rsv.id(), "");
        assert_eq!(rsv.owning_job_id(), JobId::UNSET);
        assert!(rsv.node_names().is_empty());
    }

    #[test]
    fn test_new_has_no_nodes() {
        let rsv = Reservation::new(JobId::new(12), "4410");
        assert_eq!(rsv.id(), "4410");
        assert_eq!(rsv.owning_job_id(), JobId::new(12));
        assert!(rsv.node_names().is_empty());
    }

    #[test]
    fn test_from_job() {
        let job = JobAttributes::new(JobId::new(5))
            .with_reservation_id("1187")
            .with_exec_host("nid00010/0+nid00010/1+nid00011/0");

        let rsv = Reservation::from_job(&job);
        assert_eq!(rsv.id(), "1187");
        assert_eq!(rsv.owning_job_id(), JobId::new(5));
        assert_eq!(rsv.node_names(), ["nid00010", "nid00011"]);
    }

    #[test]
    fn test_from_job_without_attributes() {
        let rsv = Reservation::from_job(&JobAttributes::new(JobId::new(9)));
        assert_eq!(rsv.id(), "");
        assert_eq!(rsv.owning_job_id(), JobId::new(9));
        assert!(rsv.node_names().is_empty());
    }

    #[test]
    fn test_from_job_with_empty_placement() {
        let job = JobAttributes::new(JobId::new(9))
            .with_reservation_id("2")
            .with_exec_host("");
        assert!(Reservation::from_job(&job).node_names().is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let job = JobAttributes::new(JobId::new(1))
            .with_reservation_id("10")
            .with_exec_host("a/0+b/0");
        let original = Reservation::from_job(&job);
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.node_names(), ["a", "b"]);
    }

    #[test]
    fn test_json_shape() {
        let rsv = Reservation::from_job(
            &JobAttributes::new(JobId::new(3))
                .with_reservation_id("77")
                .with_exec_host("n1/0"),
        );
        let json = serde_json::to_value(&rsv).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "77", "owning_job_id": 3, "node_names": ["n1"]})
        );
    }
}
