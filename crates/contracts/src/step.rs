//! Step - one recorded observation inside a stage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StageStatus;

/// Step identifier
pub type StepId = Uuid;

/// One observation within a stage. Never edited after it is recorded,
/// except for attaching a duration to a step that had none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,

    pub timestamp: DateTime<Utc>,

    pub status: StageStatus,

    pub message: String,

    /// Free-form details (operation output, validator message, ...)
    #[serde(default)]
    pub details: String,

    /// Measured duration in milliseconds, `None` if not measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Step {
    /// Create a step stamped with the current time and no duration
    pub fn new(status: StageStatus, message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            status,
            message: message.into(),
            details: details.into(),
            duration_ms: None,
        }
    }
}

/// Step contents supplied by a caller of the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub status: StageStatus,
    pub message: String,
    pub details: String,
    pub duration_ms: Option<u64>,
}

impl StepRecord {
    pub fn new(status: StageStatus, message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: details.into(),
            duration_ms: None,
        }
    }

    /// Attach a measured duration; zero is treated as "not measured"
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = (duration_ms > 0).then_some(duration_ms);
        self
    }
}

impl From<StepRecord> for Step {
    fn from(record: StepRecord) -> Self {
        let mut step = Step::new(record.status, record.message, record.details);
        step.duration_ms = record.duration_ms;
        step
    }
}
