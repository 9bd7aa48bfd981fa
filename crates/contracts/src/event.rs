//! Events and read-side views published by the tracker

use serde::{Deserialize, Serialize};

use crate::{Job, JobId, StageKind};

/// Change notification for one job
///
/// Every variant except `Evicted` carries the job snapshot taken right
/// after the mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Started { job: Job },
    StageUpdated { stage: StageKind, job: Job },
    Completed { job: Job },
    Failed { job: Job },
    /// Dropped from history by the retention limit
    Evicted { job_id: JobId },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Started { job }
            | Self::StageUpdated { job, .. }
            | Self::Completed { job }
            | Self::Failed { job } => job.id,
            Self::Evicted { job_id } => *job_id,
        }
    }
}

/// Monitoring view over all tracked jobs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSnapshot {
    /// Pending and running jobs, oldest first
    pub active: Vec<Job>,

    /// Completed jobs, most recent first
    pub recently_completed: Vec<Job>,

    /// Failed jobs, most recent first
    pub recently_failed: Vec<Job>,
}

impl MonitoringSnapshot {
    pub fn total(&self) -> usize {
        self.active.len() + self.recently_completed.len() + self.recently_failed.len()
    }
}
