//! Job - one execution of the restore pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Stage, StageKind};

/// Job identifier (UUID v4)
///
/// `Copy`, so it can be handed to workers and readers freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Overall job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, no stage started yet
    #[default]
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// No further mutation is accepted once terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One restore job with its stage history
///
/// This is the shape handed to status readers. Stages are kept in
/// the order they were created, which is the phase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,

    /// Display name (usually the backup file name)
    pub name: String,

    /// Path of the backup being restored
    pub source_path: PathBuf,

    /// Operation kind (e.g. "upload")
    pub kind: String,

    pub status: JobStatus,

    pub stages: Vec<Stage>,

    pub created_at: DateTime<Utc>,

    /// Set when the first stage is created
    pub started_at: Option<DateTime<Utc>>,

    /// Set on completion or failure
    pub completed_at: Option<DateTime<Utc>>,

    /// Failure message, only for failed jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a pending job with no stages
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            name: name.into(),
            source_path: source_path.into(),
            kind: kind.into(),
            status: JobStatus::Pending,
            stages: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Look up a stage by kind
    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    /// Mutable lookup by kind
    pub fn stage_mut(&mut self, kind: StageKind) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.kind == kind)
    }

    /// Kind of the most recently started stage
    pub fn current_stage(&self) -> Option<StageKind> {
        self.stages.last().map(|s| s.kind)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Overall progress (0-100) given the number of phases in the pipeline
    ///
    /// A complete job always reports 100.
    pub fn overall_progress(&self, total_phases: usize) -> u8 {
        if self.status == JobStatus::Complete {
            return 100;
        }
        if total_phases == 0 {
            return 0;
        }
        let sum: usize = self
            .stages
            .iter()
            .map(|s| s.progress.percent() as usize)
            .sum();
        (sum / total_phases).min(100) as u8
    }

    /// Message of the last failed step, if any
    pub fn last_failure(&self) -> Option<&str> {
        self.stages
            .iter()
            .rev()
            .flat_map(|s| s.steps.iter().rev())
            .find(|step| step.status == crate::StageStatus::Failed)
            .map(|step| step.message.as_str())
    }
}
