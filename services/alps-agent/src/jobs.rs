//! Job source interface.
//!
//! The job subsystem owns job state; the agent only needs a read-only
//! snapshot of which jobs are alive and what reservation each one holds.

use std::collections::BTreeMap;

use alps_reservation::{JobAttributes, JobId};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Source of live jobs.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Snapshot of every live job.
    async fn live_jobs(&self) -> Result<Vec<JobAttributes>>;
}

/// In-memory job source for testing and development.
#[derive(Default)]
pub struct StaticJobSource {
    jobs: RwLock<BTreeMap<JobId, JobAttributes>>,
}

impl StaticJobSource {
    pub fn new<I>(jobs: I) -> Self
    where
        I: IntoIterator<Item = JobAttributes>,
    {
        Self {
            jobs: RwLock::new(jobs.into_iter().map(|j| (j.internal_id, j)).collect()),
        }
    }

    /// Add or replace a job.
    pub async fn upsert(&self, job: JobAttributes) {
        self.jobs.write().await.insert(job.internal_id, job);
    }

    /// Drop a job, as if it had finished. Returns its last snapshot.
    pub async fn finish(&self, job_id: JobId) -> Option<JobAttributes> {
        self.jobs.write().await.remove(&job_id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobSource for StaticJobSource {
    async fn live_jobs(&self) -> Result<Vec<JobAttributes>> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_finish() {
        let source = StaticJobSource::default();
        assert!(source.is_empty().await);

        source
            .upsert(JobAttributes::new(JobId::new(1)).with_reservation_id("10"))
            .await;
        source
            .upsert(JobAttributes::new(JobId::new(1)).with_reservation_id("11"))
            .await;
        assert_eq!(source.len().await, 1);

        let live = source.live_jobs().await.unwrap();
        assert_eq!(live[0].reservation_id.as_deref(), Some("11"));

        assert!(source.finish(JobId::new(1)).await.is_some());
        assert!(source.finish(JobId::new(1)).await.is_none());
        assert!(source.live_jobs().await.unwrap().is_empty());
    }
}
