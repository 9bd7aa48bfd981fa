//! Stage update adapter
//!
//! Maps one phase observation onto the tracker: fetch or create the stage,
//! append the step with its duration, move the stage status and progress.

use std::time::Duration;

use contracts::{JobId, Stage, StageProgress, StageStatus, StepRecord, TrackerError};
use tracker::{JobTracker, StageTransition};

use crate::PhaseDescriptor;

/// One observation of a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseUpdate {
    pub status: StageStatus,
    pub message: String,
    pub details: String,
    /// Measured duration; zero means "not measured"
    pub duration: Duration,
}

impl PhaseUpdate {
    /// `in_progress` observation emitted before the operation runs
    pub fn started(phase: &PhaseDescriptor) -> Self {
        Self {
            status: StageStatus::InProgress,
            message: phase.start_message.to_string(),
            details: String::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn complete(phase: &PhaseDescriptor, output: impl Into<String>, duration: Duration) -> Self {
        Self {
            status: StageStatus::Complete,
            message: phase.success_message.to_string(),
            details: output.into(),
            duration,
        }
    }

    pub fn failed(message: impl Into<String>, details: impl Into<String>, duration: Duration) -> Self {
        Self {
            status: StageStatus::Failed,
            message: message.into(),
            details: details.into(),
            duration,
        }
    }
}

/// Progress implied by a status: `complete` is 100, `in_progress` is 50,
/// anything else keeps the current value.
pub fn derive_progress(status: StageStatus, current: StageProgress) -> StageProgress {
    match status {
        StageStatus::Complete => StageProgress::Done,
        StageStatus::InProgress => StageProgress::Half,
        StageStatus::Pending | StageStatus::Failed => current,
    }
}

/// Whole milliseconds, saturating
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Record a phase observation on its stage and return the updated stage.
///
/// The step and the stage transition are applied in a single tracker write.
pub fn apply_phase_update(
    tracker: &JobTracker,
    job_id: JobId,
    phase: &PhaseDescriptor,
    update: PhaseUpdate,
) -> Result<Stage, TrackerError> {
    let stage = tracker.get_or_create_stage(job_id, phase.kind, phase.label, phase.description)?;

    let progress = derive_progress(update.status, stage.progress);
    let record = StepRecord::new(update.status, update.message, update.details)
        .with_duration_ms(duration_millis(update.duration));

    tracker.record_step(
        job_id,
        stage.kind,
        record,
        StageTransition::new(update.status, progress),
    )
}
