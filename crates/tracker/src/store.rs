//! Job storage with creation order and retention

use std::collections::HashMap;

use contracts::{Job, JobId, TrackerError};

/// Jobs keyed by id, plus their creation order
#[derive(Debug, Default)]
pub(crate) struct JobStore {
    jobs: HashMap<JobId, Job>,
    order: Vec<JobId>,
}

impl JobStore {
    pub(crate) fn insert(&mut self, job: Job) {
        self.order.push(job.id);
        self.jobs.insert(job.id, job);
    }

    pub(crate) fn get(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.get(&job_id)
    }

    pub(crate) fn get_mut(&mut self, job_id: JobId) -> Result<&mut Job, TrackerError> {
        self.jobs
            .get_mut(&job_id)
            .ok_or_else(|| TrackerError::job_not_found(job_id))
    }

    /// Mutable access to a job that still accepts mutation
    pub(crate) fn active_mut(&mut self, job_id: JobId) -> Result<&mut Job, TrackerError> {
        let job = self.get_mut(job_id)?;
        if job.is_terminal() {
            return Err(TrackerError::JobFinalized { job_id });
        }
        Ok(job)
    }

    /// Jobs in creation order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Job> {
        self.order.iter().filter_map(|id| self.jobs.get(id))
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    /// Drop the oldest finished jobs until at most `limit` remain.
    /// Active jobs are never evicted.
    pub(crate) fn evict_finished(&mut self, limit: usize) -> Vec<JobId> {
        let finished: Vec<JobId> = self
            .iter()
            .filter(|job| job.is_terminal())
            .map(|job| job.id)
            .collect();

        if finished.len() <= limit {
            return Vec::new();
        }

        let evicted: Vec<JobId> = finished[..finished.len() - limit].to_vec();
        for id in &evicted {
            self.jobs.remove(id);
        }
        self.order.retain(|id| self.jobs.contains_key(id));
        evicted
    }
}
