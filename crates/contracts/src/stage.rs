//! Stage - one phase of a job
//!
//! Stage kinds, statuses and the coarse progress model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Step;

/// Pipeline phase kind (unique per job)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Backup file validation
    Validation,
    /// Database restore from the backup
    Restore,
    /// Configuration of the restored database
    Finalize,
}

impl StageKind {
    /// All kinds in pipeline order
    pub const ALL: [StageKind; 3] = [Self::Validation, Self::Restore, Self::Finalize];

    /// Stable identifier, also used as the stage id
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Restore => "restore",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage and step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// `complete` or `failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Whether a stage in `self` may move to `next`.
    ///
    /// A stage must pass through `in_progress` before it can finish, and a
    /// finished stage never changes again. Repeating `in_progress` is allowed.
    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        use StageStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, InProgress)
                | (InProgress, InProgress)
                | (InProgress, Complete)
                | (InProgress, Failed)
        )
    }
}

impl StageProgress {
    /// Whether this progress value may be reported together with `status`.
    ///
    /// `pending` is 0, `in_progress` is 50, `complete` is 100. A failed stage
    /// keeps whatever progress it had.
    pub fn is_consistent_with(&self, status: StageStatus) -> bool {
        match status {
            StageStatus::Pending => *self == Self::NotStarted,
            StageStatus::InProgress => *self == Self::Half,
            StageStatus::Complete => *self == Self::Done,
            StageStatus::Failed => true,
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage progress percentage, restricted to 0, 50 and 100
///
/// Serialized as the plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StageProgress {
    #[default]
    NotStarted,
    Half,
    Done,
}

impl StageProgress {
    pub fn percent(&self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Half => 50,
            Self::Done => 100,
        }
    }
}

impl From<StageProgress> for u8 {
    fn from(progress: StageProgress) -> Self {
        progress.percent()
    }
}

impl TryFrom<u8> for StageProgress {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NotStarted),
            50 => Ok(Self::Half),
            100 => Ok(Self::Done),
            other => Err(format!("stage progress must be 0, 50 or 100, got {other}")),
        }
    }
}

/// One pipeline phase within a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage kind, doubles as the stage id within its job
    pub kind: StageKind,

    /// Human label (e.g. "Validation")
    pub label: String,

    /// What the phase does
    pub description: String,

    pub status: StageStatus,

    pub progress: StageProgress,

    /// Append-only observations
    pub steps: Vec<Step>,

    /// Set on the first `in_progress` transition
    pub started_at: Option<DateTime<Utc>>,

    /// Set when the stage completes or fails
    pub ended_at: Option<DateTime<Utc>>,
}

impl Stage {
    /// Create a pending stage with no steps
    pub fn new(kind: StageKind, label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            description: description.into(),
            status: StageStatus::Pending,
            progress: StageProgress::NotStarted,
            steps: Vec::new(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Sum of all measured step durations
    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().filter_map(|s| s.duration_ms).sum()
    }
}
