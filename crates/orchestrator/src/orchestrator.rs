//! Pipeline orchestrator - drives one restore job through its phases.
//!
//! Every phase goes through the same loop body: `in_progress` step, timed
//! operation call, then a `complete` or `failed` step carrying the measured
//! duration. The first failure fails the job and stops the loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{
    Job, JobId, JobStatus, PhaseError, PhaseOperations, StageKind, StageStatus, DEFAULT_JOB_KIND,
};
use observability::{record_job_finished, record_job_started, record_phase, set_active_jobs};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use tracker::JobTracker;

use crate::stage::{apply_phase_update, PhaseUpdate};
use crate::{PhaseAction, PhaseDescriptor, PipelineError};

/// One backup to restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Display name of the job
    pub name: String,

    /// Backup file
    pub source_path: PathBuf,

    /// Restored database
    pub target_path: PathBuf,

    /// Operation kind recorded on the job
    pub kind: String,
}

impl RestoreRequest {
    /// Request named after the backup file name, with the default job kind
    pub fn new(source_path: impl Into<PathBuf>, target_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.to_string_lossy().into_owned());
        Self {
            name,
            source_path,
            target_path: target_path.into(),
            kind: DEFAULT_JOB_KIND.to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }
}

/// Outcome of one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTiming {
    pub kind: StageKind,

    /// `complete` or `failed`
    pub status: StageStatus,

    /// Measured operation time (None when under 1ms)
    pub duration_ms: Option<u64>,

    /// Failure message of a failed phase
    pub error: Option<String>,
}

/// Outcome of one job
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub job_id: JobId,

    /// `complete` or `failed`
    pub status: JobStatus,

    /// Attempted phases in order
    pub phases: Vec<PhaseTiming>,

    pub error: Option<String>,

    /// Final tracker snapshot, kept even after retention evicts the job
    pub job: Job,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Complete
    }

    /// Sum of all measured phase durations
    pub fn total_duration_ms(&self) -> u64 {
        self.phases.iter().filter_map(|p| p.duration_ms).sum()
    }

    /// Phase that failed the job, if any
    pub fn failed_phase(&self) -> Option<StageKind> {
        self.phases
            .iter()
            .find(|p| p.status == StageStatus::Failed)
            .map(|p| p.kind)
    }
}

/// Step message and details of a failed phase
struct PhaseFailure {
    message: String,
    details: String,
}

impl PhaseFailure {
    fn from_error(phase: &PhaseDescriptor, err: PhaseError) -> Self {
        let text = err.detail();
        let message = if text.trim().is_empty() {
            phase.failure_message.to_string()
        } else {
            text
        };
        Self {
            message,
            details: String::new(),
        }
    }

    fn rejected(phase: &PhaseDescriptor, reason: String) -> Self {
        Self {
            message: phase.failure_message.to_string(),
            details: reason,
        }
    }
}

/// Restore pipeline worker
///
/// Cheap to clone; clones share the tracker and the backend.
pub struct Orchestrator<O> {
    tracker: Arc<JobTracker>,
    operations: Arc<O>,
    phases: Arc<[PhaseDescriptor]>,
}

impl<O> Clone for Orchestrator<O> {
    fn clone(&self) -> Self {
        Self {
            tracker: Arc::clone(&self.tracker),
            operations: Arc::clone(&self.operations),
            phases: Arc::clone(&self.phases),
        }
    }
}

impl<O> Orchestrator<O>
where
    O: PhaseOperations + Sync + 'static,
{
    /// Orchestrator running the validate -> restore -> finalize pipeline
    pub fn new(tracker: Arc<JobTracker>, operations: O) -> Self {
        Self::with_phases(tracker, operations, PhaseDescriptor::restore_pipeline())
    }

    /// Orchestrator with a custom phase list
    pub fn with_phases(
        tracker: Arc<JobTracker>,
        operations: O,
        phases: Vec<PhaseDescriptor>,
    ) -> Self {
        Self {
            tracker,
            operations: Arc::new(operations),
            phases: phases.into(),
        }
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    pub fn phases(&self) -> &[PhaseDescriptor] {
        &self.phases
    }

    /// Register a job and drive it to a terminal status on the current task
    pub async fn run(&self, request: RestoreRequest) -> Result<JobReport, PipelineError> {
        let job_id = self.register(&request);
        self.drive(job_id, request).await
    }

    /// Register a job and drive it on its own tokio task
    ///
    /// The job is visible in the tracker (as `pending`) before this returns.
    pub fn spawn(
        &self,
        request: RestoreRequest,
    ) -> (JobId, JoinHandle<Result<JobReport, PipelineError>>) {
        let job_id = self.register(&request);
        let worker = self.clone();
        let handle = tokio::spawn(async move { worker.drive(job_id, request).await });
        (job_id, handle)
    }

    fn register(&self, request: &RestoreRequest) -> JobId {
        let job = self.tracker.start_job(
            request.name.clone(),
            request.source_path.clone(),
            request.kind.clone(),
        );
        record_job_started();
        set_active_jobs(self.tracker.active_count());
        job.id
    }

    #[instrument(name = "restore_job", skip(self, request), fields(job_id = %job_id))]
    async fn drive(&self, job_id: JobId, request: RestoreRequest) -> Result<JobReport, PipelineError> {
        info!(
            backend = self.operations.name(),
            source = %request.source_path.display(),
            target = %request.target_path.display(),
            "Restore job started"
        );

        let result = self.run_phases(job_id, &request).await;
        if let Err(err) = &result {
            error!(error = %err, "Tracker rejected an update, aborting job");
            match self.tracker.fail_job(job_id, err.to_string()) {
                Ok(_) => record_job_finished(JobStatus::Failed),
                Err(fail_err) => debug!(error = %fail_err, "Job could not be marked failed"),
            }
        }
        set_active_jobs(self.tracker.active_count());
        result
    }

    async fn run_phases(
        &self,
        job_id: JobId,
        request: &RestoreRequest,
    ) -> Result<JobReport, PipelineError> {
        let mut phases = Vec::with_capacity(self.phases.len());

        for phase in self.phases.iter() {
            let timing = self.run_phase(job_id, phase, request).await?;

            if let Some(message) = timing.error.clone() {
                phases.push(timing);
                let job = self.tracker.fail_job(job_id, message.clone())?;
                record_job_finished(JobStatus::Failed);
                warn!(stage = %phase.kind, error = %message, "Restore job failed");

                return Ok(JobReport {
                    job_id,
                    status: JobStatus::Failed,
                    phases,
                    error: Some(message),
                    job,
                });
            }
            phases.push(timing);
        }

        let job = self.tracker.complete_job(job_id)?;
        record_job_finished(JobStatus::Complete);

        let report = JobReport {
            job_id,
            status: JobStatus::Complete,
            phases,
            error: None,
            job,
        };
        info!(
            total_duration_ms = report.total_duration_ms(),
            "Restore job complete"
        );
        Ok(report)
    }

    async fn run_phase(
        &self,
        job_id: JobId,
        phase: &PhaseDescriptor,
        request: &RestoreRequest,
    ) -> Result<PhaseTiming, PipelineError> {
        apply_phase_update(&self.tracker, job_id, phase, PhaseUpdate::started(phase))?;

        let started = Instant::now();
        let outcome = self.invoke(phase, request).await;
        let elapsed = started.elapsed();

        let update = match outcome {
            Ok(output) => PhaseUpdate::complete(phase, output, elapsed),
            Err(failure) => PhaseUpdate::failed(failure.message, failure.details, elapsed),
        };
        let status = update.status;
        let error = (status == StageStatus::Failed).then(|| update.message.clone());

        let stage = apply_phase_update(&self.tracker, job_id, phase, update)?;
        let duration_ms = stage.last_step().and_then(|step| step.duration_ms);
        record_phase(phase.kind, status, duration_ms);

        debug!(
            stage = %phase.kind,
            status = %status,
            duration_ms = ?duration_ms,
            "Phase finished"
        );

        Ok(PhaseTiming {
            kind: phase.kind,
            status,
            duration_ms,
            error,
        })
    }

    /// Call the external operation for a phase.
    ///
    /// Success yields the informational output stored in the step details.
    async fn invoke(
        &self,
        phase: &PhaseDescriptor,
        request: &RestoreRequest,
    ) -> Result<String, PhaseFailure> {
        let source: &Path = &request.source_path;
        let target: &Path = &request.target_path;

        match phase.action {
            PhaseAction::Validate => match self.operations.validate(source).await {
                Ok(report) if report.valid => Ok(report.message),
                Ok(report) => Err(PhaseFailure::rejected(phase, report.message)),
                Err(err) => Err(PhaseFailure::from_error(phase, err)),
            },
            PhaseAction::Restore => self
                .operations
                .restore(source, target)
                .await
                .map_err(|err| PhaseFailure::from_error(phase, err)),
            PhaseAction::Configure => self
                .operations
                .configure(target)
                .await
                .map(|()| String::new())
                .map_err(|err| PhaseFailure::from_error(phase, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PipelineSettings, StageProgress, ValidationReport};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted backend: per-phase delay and outcome
    #[derive(Default)]
    struct ScriptedOperations {
        delays: [u64; 3],
        validate: Option<Result<ValidationReport, String>>,
        restore_error: Option<String>,
        configure_error: Option<String>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedOperations {
        fn with_delays(validate: u64, restore: u64, configure: u64) -> Self {
            Self {
                delays: [validate, restore, configure],
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PhaseOperations for ScriptedOperations {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn validate(&self, _path: &Path) -> Result<ValidationReport, PhaseError> {
            self.calls.lock().unwrap().push("validate");
            tokio::time::sleep(Duration::from_millis(self.delays[0])).await;
            match &self.validate {
                None => Ok(ValidationReport::valid("header ok")),
                Some(Ok(report)) => Ok(report.clone()),
                Some(Err(message)) => Err(PhaseError::validation(message.clone())),
            }
        }

        async fn restore(&self, _source: &Path, _target: &Path) -> Result<String, PhaseError> {
            self.calls.lock().unwrap().push("restore");
            tokio::time::sleep(Duration::from_millis(self.delays[1])).await;
            match &self.restore_error {
                None => Ok("restore done".to_string()),
                Some(message) => Err(PhaseError::operation("restore", message.clone())),
            }
        }

        async fn configure(&self, _target: &Path) -> Result<(), PhaseError> {
            self.calls.lock().unwrap().push("configure");
            tokio::time::sleep(Duration::from_millis(self.delays[2])).await;
            match &self.configure_error {
                None => Ok(()),
                Some(message) => Err(PhaseError::operation("configure", message.clone())),
            }
        }
    }

    fn request() -> RestoreRequest {
        RestoreRequest::new("/backups/sales.fbk", "/restored/sales.fdb")
    }

    #[test]
    fn test_request_defaults() {
        let req = request();
        assert_eq!(req.name, "sales.fbk");
        assert_eq!(req.kind, DEFAULT_JOB_KIND);
        assert_eq!(req.kind, PipelineSettings::default().job_kind);

        let req = req.with_kind("schedule").with_name("nightly");
        assert_eq!(req.kind, "schedule");
        assert_eq!(req.name, "nightly");
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_failure_stops_pipeline() {
        let tracker = Arc::new(JobTracker::new());
        let ops = ScriptedOperations {
            validate: Some(Err("corrupt header".to_string())),
            ..ScriptedOperations::with_delays(80, 0, 0)
        };
        let orchestrator = Orchestrator::new(Arc::clone(&tracker), ops);

        let report = orchestrator.run(request()).await.unwrap();
        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.failed_phase(), Some(StageKind::Validation));
        assert_eq!(report.error.as_deref(), Some("corrupt header"));
        assert_eq!(orchestrator.operations.calls(), vec!["validate"]);

        let job = tracker.get_job(report.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("corrupt header"));
        assert_eq!(job.stages.len(), 1);

        let stage = &job.stages[0];
        assert_eq!(stage.kind, StageKind::Validation);
        assert_eq!(stage.status, StageStatus::Failed);
        assert_eq!(stage.steps.len(), 2);
        assert_eq!(stage.steps[0].status, StageStatus::InProgress);
        assert_eq!(stage.steps[0].duration_ms, None);
        assert_eq!(stage.steps[1].status, StageStatus::Failed);
        assert_eq!(stage.steps[1].message, "corrupt header");
        assert_eq!(stage.steps[1].duration_ms, Some(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_backup_uses_generic_message() {
        let tracker = Arc::new(JobTracker::new());
        let ops = ScriptedOperations {
            validate: Some(Ok(ValidationReport::invalid("not a gbak file"))),
            ..ScriptedOperations::with_delays(10, 0, 0)
        };
        let orchestrator = Orchestrator::new(Arc::clone(&tracker), ops);

        let report = orchestrator.run(request()).await.unwrap();
        let job = tracker.get_job(report.job_id).unwrap();
        let failed = job.stages[0].last_step().unwrap();
        assert_eq!(failed.message, "Backup file validation failed");
        assert_eq!(failed.details, "not a gbak file");
        assert_eq!(job.error.as_deref(), Some("Backup file validation failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_phases_succeed_with_measured_durations() {
        let tracker = Arc::new(JobTracker::new());
        let orchestrator = Orchestrator::new(
            Arc::clone(&tracker),
            ScriptedOperations::with_delays(120, 4500, 300),
        );

        let report = orchestrator.run(request()).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.total_duration_ms(), 4920);

        let job = tracker.get_job(report.job_id).unwrap();
        assert_eq!(report.job, job);
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job.completed_at.is_some());
        assert_eq!(job.stages.len(), 3);

        for (stage, expected) in job.stages.iter().zip([120, 4500, 300]) {
            assert_eq!(stage.status, StageStatus::Complete);
            assert_eq!(stage.progress, StageProgress::Done);
            assert_eq!(stage.steps.len(), 2);
            assert_eq!(stage.steps[0].duration_ms, None);
            assert_eq!(stage.last_step().unwrap().duration_ms, Some(expected));
        }
        assert_eq!(job.stages[1].last_step().unwrap().details, "restore done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_failure_skips_finalize() {
        let tracker = Arc::new(JobTracker::new());
        let ops = ScriptedOperations {
            restore_error: Some("gbak: disk full".to_string()),
            ..ScriptedOperations::with_delays(50, 200, 10)
        };
        let orchestrator = Orchestrator::new(Arc::clone(&tracker), ops);

        let report = orchestrator.run(request()).await.unwrap();
        assert_eq!(orchestrator.operations.calls(), vec!["validate", "restore"]);
        assert_eq!(report.phases.len(), 2);

        let job = tracker.get_job(report.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.stages[0].status, StageStatus::Complete);
        assert_eq!(job.stages[0].progress, StageProgress::Done);
        assert_eq!(job.stages[1].status, StageStatus::Failed);
        assert_eq!(job.stages[1].last_step().unwrap().message, "gbak: disk full");
        assert_eq!(job.stages[1].last_step().unwrap().duration_ms, Some(200));
        assert!(job.stage(StageKind::Finalize).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_error_text_falls_back_to_generic_message() {
        let tracker = Arc::new(JobTracker::new());
        let ops = ScriptedOperations {
            configure_error: Some(String::new()),
            ..ScriptedOperations::with_delays(1, 1, 1)
        };
        let orchestrator = Orchestrator::new(Arc::clone(&tracker), ops);

        let report = orchestrator.run(request()).await.unwrap();
        assert_eq!(report.failed_phase(), Some(StageKind::Finalize));
        assert_eq!(report.error.as_deref(), Some("Database configuration failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_registers_job_before_running() {
        let tracker = Arc::new(JobTracker::new());
        let orchestrator =
            Orchestrator::new(Arc::clone(&tracker), ScriptedOperations::with_delays(5, 5, 5));

        let (job_id, handle) = orchestrator.spawn(request());
        assert!(tracker.get_job(job_id).is_some());

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.job_id, job_id);
        assert_eq!(tracker.get_job(job_id).unwrap().status, JobStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_error_aborts_worker() {
        let tracker = Arc::new(JobTracker::new());
        // Same kind twice: the second pass finds a finished stage
        let orchestrator = Orchestrator::with_phases(
            Arc::clone(&tracker),
            ScriptedOperations::with_delays(1, 1, 1),
            vec![PhaseDescriptor::VALIDATION, PhaseDescriptor::VALIDATION],
        );

        let err = orchestrator.run(request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Tracker(_)));

        let job = &tracker.list_jobs()[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("invalid transition"));
    }
}
