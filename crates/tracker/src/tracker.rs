//! JobTracker - owner of all job state
//!
//! Writers take the write lock for the whole mutation, including the event
//! publish, so subscribers see the changes of one job in the order they
//! were applied. No lock is ever held across an `.await`.

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use contracts::{
    Job, JobEvent, JobId, JobStatus, MonitoringSnapshot, Stage, StageKind, StageProgress,
    StageStatus, Step, StepRecord, TrackerConfig, TrackerError,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::store::JobStore;

/// Target status and progress for a stage update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTransition {
    pub status: StageStatus,
    pub progress: StageProgress,
}

impl StageTransition {
    pub fn new(status: StageStatus, progress: StageProgress) -> Self {
        Self { status, progress }
    }
}

/// Thread-safe job tracker
///
/// All methods take `&self`; share it as `Arc<JobTracker>`.
pub struct JobTracker {
    config: TrackerConfig,
    store: RwLock<JobStore>,
    events: broadcast::Sender<JobEvent>,
}

impl JobTracker {
    /// Create a tracker with default configuration
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    /// Create a tracker with custom configuration
    pub fn with_config(config: TrackerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            store: RwLock::new(JobStore::default()),
            events,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // ===== Mutations =====

    /// Register a new pending job. Never fails.
    pub fn start_job(
        &self,
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        kind: impl Into<String>,
    ) -> Job {
        let job = Job::new(name, source_path, kind);
        let mut store = self.write();
        store.insert(job.clone());
        self.publish(JobEvent::Started { job: job.clone() });
        drop(store);

        info!(
            job_id = %job.id,
            name = %job.name,
            source = %job.source_path.display(),
            kind = %job.kind,
            "Job registered"
        );
        job
    }

    /// Return the stage of `kind`, creating it when missing.
    ///
    /// New stages start `pending` with progress 0 and are appended after the
    /// existing ones. Creating the first stage moves the job to `running`.
    ///
    /// # Errors
    /// - `NotFound` for an unknown job
    /// - `JobFinalized` when a new stage is requested on a finished job
    /// - `StageOrder` when an earlier stage has not completed
    pub fn get_or_create_stage(
        &self,
        job_id: JobId,
        kind: StageKind,
        label: &str,
        description: &str,
    ) -> Result<Stage, TrackerError> {
        let mut store = self.write();
        let job = store.get_mut(job_id)?;

        if let Some(stage) = job.stage(kind) {
            return Ok(stage.clone());
        }
        if job.is_terminal() {
            return Err(TrackerError::JobFinalized { job_id });
        }
        if let Some(blocking) = job
            .stages
            .iter()
            .find(|s| s.status != StageStatus::Complete)
        {
            return Err(TrackerError::StageOrder {
                job_id,
                stage: kind,
                blocking: blocking.kind,
            });
        }

        let stage = Stage::new(kind, label, description);
        job.stages.push(stage.clone());
        if job.status == JobStatus::Pending {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        }

        debug!(job_id = %job_id, stage = %kind, "Stage created");
        self.publish(JobEvent::StageUpdated {
            stage: kind,
            job: job.clone(),
        });
        Ok(stage)
    }

    /// Append an unmeasured step to a stage and return it.
    ///
    /// The stage status is left alone; see [`update_stage`](Self::update_stage).
    pub fn add_step_to_stage(
        &self,
        job_id: JobId,
        stage_id: StageKind,
        status: StageStatus,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Result<Step, TrackerError> {
        let mut store = self.write();
        let job = store.active_mut(job_id)?;
        let stage = job
            .stage_mut(stage_id)
            .ok_or_else(|| TrackerError::stage_not_found(job_id, stage_id))?;

        let step = Step::new(status, message, details);
        stage.steps.push(step.clone());

        debug!(
            job_id = %job_id,
            stage = %stage_id,
            status = %status,
            message = %step.message,
            "Step added"
        );
        self.publish(JobEvent::StageUpdated {
            stage: stage_id,
            job: job.clone(),
        });
        Ok(step)
    }

    /// Store the caller's status and progress for a stage.
    ///
    /// Steps are append-only, so the only step change taken from `stage` is a
    /// duration on a step that had none. Everything is validated before
    /// anything is applied.
    pub fn update_stage(&self, job_id: JobId, stage: &Stage) -> Result<(), TrackerError> {
        let mut store = self.write();
        let job = store.active_mut(job_id)?;
        let stored = job
            .stage_mut(stage.kind)
            .ok_or_else(|| TrackerError::stage_not_found(job_id, stage.kind))?;

        let mut durations = Vec::new();
        for step in &stage.steps {
            let idx = stored
                .steps
                .iter()
                .position(|s| s.id == step.id)
                .ok_or_else(|| TrackerError::step_not_found(stage.kind, step.id))?;
            if let (None, Some(ms)) = (stored.steps[idx].duration_ms, step.duration_ms) {
                durations.push((idx, ms));
            }
        }

        let transition = StageTransition::new(stage.status, stage.progress);
        check_transition(stored, transition)?;

        for (idx, ms) in durations {
            stored.steps[idx].duration_ms = Some(ms);
        }
        apply_transition(stored, transition);

        debug!(
            job_id = %job_id,
            stage = %stage.kind,
            status = %stage.status,
            progress = stage.progress.percent(),
            "Stage updated"
        );
        self.publish(JobEvent::StageUpdated {
            stage: stage.kind,
            job: job.clone(),
        });
        Ok(())
    }

    /// Append a fully formed step and move the stage in one write.
    ///
    /// Readers never see the step without its duration or the stage without
    /// its new status. Returns the updated stage.
    pub fn record_step(
        &self,
        job_id: JobId,
        stage_id: StageKind,
        record: StepRecord,
        transition: StageTransition,
    ) -> Result<Stage, TrackerError> {
        let mut store = self.write();
        let job = store.active_mut(job_id)?;
        let stage = job
            .stage_mut(stage_id)
            .ok_or_else(|| TrackerError::stage_not_found(job_id, stage_id))?;

        check_transition(stage, transition)?;
        stage.steps.push(Step::from(record));
        apply_transition(stage, transition);
        let updated = stage.clone();

        debug!(
            job_id = %job_id,
            stage = %stage_id,
            status = %transition.status,
            progress = transition.progress.percent(),
            duration_ms = ?updated.last_step().and_then(|s| s.duration_ms),
            "Step recorded"
        );
        self.publish(JobEvent::StageUpdated {
            stage: stage_id,
            job: job.clone(),
        });
        Ok(updated)
    }

    /// Mark a job complete. Terminal.
    ///
    /// Returns the final snapshot, taken before retention may evict the job.
    pub fn complete_job(&self, job_id: JobId) -> Result<Job, TrackerError> {
        let mut store = self.write();
        let job = store.active_mut(job_id)?;
        job.status = JobStatus::Complete;
        job.completed_at = Some(Utc::now());

        info!(job_id = %job_id, name = %job.name, "Job complete");
        let finished = job.clone();
        self.publish(JobEvent::Completed { job: finished.clone() });
        self.evict(&mut store);
        Ok(finished)
    }

    /// Mark a job failed with a message. Terminal.
    ///
    /// Returns the final snapshot, taken before retention may evict the job.
    pub fn fail_job(&self, job_id: JobId, message: impl Into<String>) -> Result<Job, TrackerError> {
        let mut store = self.write();
        let job = store.active_mut(job_id)?;
        let message = message.into();
        job.status = JobStatus::Failed;
        job.completed_at = Some(Utc::now());
        job.error = Some(message);

        warn!(job_id = %job_id, name = %job.name, error = ?job.error, "Job failed");
        let finished = job.clone();
        self.publish(JobEvent::Failed { job: finished.clone() });
        self.evict(&mut store);
        Ok(finished)
    }

    // ===== Queries =====

    /// Snapshot of one job
    pub fn get_job(&self, job_id: JobId) -> Option<Job> {
        self.read().get(job_id).cloned()
    }

    /// Snapshot of all jobs in creation order
    pub fn list_jobs(&self) -> Vec<Job> {
        self.read().iter().cloned().collect()
    }

    /// Monitoring view: active jobs plus finished history
    pub fn snapshot(&self) -> MonitoringSnapshot {
        let store = self.read();
        let mut snapshot = MonitoringSnapshot::default();
        for job in store.iter() {
            match job.status {
                JobStatus::Pending | JobStatus::Running => snapshot.active.push(job.clone()),
                JobStatus::Complete => snapshot.recently_completed.push(job.clone()),
                JobStatus::Failed => snapshot.recently_failed.push(job.clone()),
            }
        }
        drop(store);

        snapshot
            .recently_completed
            .sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        snapshot
            .recently_failed
            .sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        snapshot
    }

    /// Number of tracked jobs
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pending or running jobs
    pub fn active_count(&self) -> usize {
        self.read().iter().filter(|job| !job.is_terminal()).count()
    }

    /// Subscribe to job events
    ///
    /// Slow receivers lag and lose the oldest events (see `broadcast`).
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    // ===== Internals =====

    fn read(&self) -> RwLockReadGuard<'_, JobStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, JobStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn evict(&self, store: &mut JobStore) {
        for job_id in store.evict_finished(self.config.history_limit) {
            debug!(job_id = %job_id, "Job evicted from history");
            self.publish(JobEvent::Evicted { job_id });
        }
    }
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn check_transition(stage: &Stage, transition: StageTransition) -> Result<(), TrackerError> {
    if !stage.status.can_transition_to(transition.status) {
        return Err(TrackerError::InvalidTransition {
            stage: stage.kind,
            from: stage.status,
            to: transition.status,
        });
    }
    if !transition.progress.is_consistent_with(transition.status) {
        return Err(TrackerError::InvalidProgress {
            stage: stage.kind,
            status: transition.status,
            progress: transition.progress.percent(),
        });
    }
    Ok(())
}

fn apply_transition(stage: &mut Stage, transition: StageTransition) {
    let now = Utc::now();
    if transition.status == StageStatus::InProgress && stage.started_at.is_none() {
        stage.started_at = Some(now);
    }
    if transition.status.is_terminal() {
        stage.ended_at = Some(now);
    }
    stage.status = transition.status;
    stage.progress = transition.progress;
}
