//! Read-only view of a job, as far as reservation tracking is concerned.

use alps_id::JobId;
use serde::{Deserialize, Serialize};

/// The job attributes the registry reads.
///
/// Implemented by whatever owns job state. Values are read once when a
/// [`Reservation`](crate::Reservation) is built; nothing is written back.
pub trait JobSnapshot {
    /// Stable, process-local job identifier.
    fn internal_id(&self) -> JobId;

    /// Reservation id assigned by the allocator, if the job holds one.
    fn reservation_id(&self) -> Option<&str>;

    /// Placement string: `host[/slot]` tokens joined with `+`.
    fn exec_host(&self) -> Option<&str>;
}

impl<T: JobSnapshot + ?Sized> JobSnapshot for &T {
    fn internal_id(&self) -> JobId {
        (**self).internal_id()
    }

    fn reservation_id(&self) -> Option<&str> {
        (**self).reservation_id()
    }

    fn exec_host(&self) -> Option<&str> {
        (**self).exec_host()
    }
}

/// Owned snapshot of a job's reservation-related attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAttributes {
    /// Internal job id.
    pub internal_id: JobId,

    /// Allocator-assigned reservation id.
    #[serde(default)]
    pub reservation_id: Option<String>,

    /// Placement string.
    #[serde(default)]
    pub exec_host: Option<String>,
}

impl JobAttributes {
    pub fn new(internal_id: JobId) -> Self {
        Self {
            internal_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reservation_id(mut self, reservation_id: impl Into<String>) -> Self {
        self.reservation_id = Some(reservation_id.into());
        self
    }

    #[must_use]
    pub fn with_exec_host(mut self, exec_host: impl Into<String>) -> Self {
        self.exec_host = Some(exec_host.into());
        self
    }
}

impl JobSnapshot for JobAttributes {
    fn internal_id(&self) -> JobId {
        self.internal_id
    }

    fn reservation_id(&self) -> Option<&str> {
        self.reservation_id.as_deref()
    }

    fn exec_host(&self) -> Option<&str> {
        self.exec_host.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_attributes_json_defaults() {
        let job: JobAttributes = serde_json::from_str(r#"{"internal_id": 7}"#).unwrap();
        assert_eq!(job.internal_id(), JobId::new(7));
        assert_eq!(job.reservation_id(), None);
        assert_eq!(job.exec_host(), None);
    }

    #[test]
    fn test_snapshot_through_reference() {
        fn read<J: JobSnapshot>(job: J) -> Option<String> {
            job.reservation_id().map(str::to_string)
        }

        let job = JobAttributes::new(JobId::new(3)).with_reservation_id("901");
        assert_eq!(read(&job).as_deref(), Some("901"));
    }
}
