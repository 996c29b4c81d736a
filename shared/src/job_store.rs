/// In-memory job store shared by HTTP handlers and download workers.
///
/// Every operation holds the lock for its whole read-modify-write, so a
/// poller never observes a partially written job.
use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::{Job, JobId};

/// Thread-safe mapping from job id to job state.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and insert a `starting` job under it.
    pub async fn create(&self) -> JobId {
        let mut jobs = self.jobs.lock().await;
        let mut job_id = JobId::new();
        while jobs.contains_key(&job_id) {
            job_id = JobId::new();
        }
        jobs.insert(job_id, Job::new());
        info!("Job {} created", job_id);
        job_id
    }

    /// Snapshot of a single job.
    pub async fn get(&self, job_id: &JobId) -> Option<Job> {
        self.jobs.lock().await.get(job_id).cloned()
    }

    /// Apply a mutation atomically. Returns `None` when the job no longer exists.
    pub async fn update<F, R>(&self, job_id: &JobId, mutator: F) -> Option<R>
    where
        F: FnOnce(&mut Job) -> R,
    {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(job_id) {
            Some(job) => Some(mutator(job)),
            None => {
                debug!("Update for unknown job {} dropped", job_id);
                None
            }
        }
    }

    pub async fn remove(&self, job_id: &JobId) -> Option<Job> {
        self.jobs.lock().await.remove(job_id)
    }

    /// Snapshot of every tracked job.
    pub async fn list_all(&self) -> HashMap<JobId, Job> {
        self.jobs.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Remove terminal jobs that finished before `cutoff` and hand them back
    /// so their files can be deleted.
    pub async fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> Vec<(JobId, Job)> {
        let mut jobs = self.jobs.lock().await;
        let expired: Vec<JobId> = jobs
            .iter()
            .filter(|(_, job)| job.is_terminal() && job.finished_at.is_some_and(|t| t < cutoff))
            .map(|(id, _)| *id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| jobs.remove(&id).map(|job| (id, job)))
            .collect()
    }
}
