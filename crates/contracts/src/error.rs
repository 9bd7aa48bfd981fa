//! Layered error definitions
//!
//! Categorized by source: configuration / tracker / phase operation.

use thiserror::Error;

use crate::{JobId, StageKind, StageStatus};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration parse error
    #[error("config parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    Validation { field: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create configuration parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by job tracker operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// Unknown job, stage or step identifier
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Job already reached a terminal status
    #[error("job {job_id} is already finalized")]
    JobFinalized { job_id: JobId },

    /// A later stage was requested before the earlier one completed
    #[error("job {job_id}: cannot start stage '{stage}' while '{blocking}' is not complete")]
    StageOrder {
        job_id: JobId,
        stage: StageKind,
        blocking: StageKind,
    },

    /// Illegal stage status transition
    #[error("stage '{stage}': invalid transition {from} -> {to}")]
    InvalidTransition {
        stage: StageKind,
        from: StageStatus,
        to: StageStatus,
    },

    /// Progress value does not match the stage status
    #[error("stage '{stage}': progress {progress}% is inconsistent with status {status}")]
    InvalidProgress {
        stage: StageKind,
        status: StageStatus,
        progress: u8,
    },
}

impl TrackerError {
    /// Create job not found error
    pub fn job_not_found(job_id: JobId) -> Self {
        Self::NotFound {
            entity: "job",
            id: job_id.to_string(),
        }
    }

    /// Create stage not found error
    pub fn stage_not_found(job_id: JobId, stage: StageKind) -> Self {
        Self::NotFound {
            entity: "stage",
            id: format!("{job_id}/{stage}"),
        }
    }

    /// Create step not found error
    pub fn step_not_found(stage: StageKind, step_id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: "step",
            id: format!("{stage}/{step_id}"),
        }
    }

    /// Whether this error points at an identifier that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors reported by external phase operations
#[derive(Debug, Error)]
pub enum PhaseError {
    // ===== Validation Errors =====
    /// The validator rejected the backup or could not inspect it
    #[error("validation failure: {message}")]
    ValidationFailure { message: String },

    // ===== Operation Errors =====
    /// Restore or configure failed
    #[error("{operation} failure: {message}")]
    OperationFailure { operation: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PhaseError {
    /// Create validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            message: message.into(),
        }
    }

    /// Create operation failure
    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OperationFailure {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Human readable error text without the category prefix.
    ///
    /// This is what ends up in a failed step and in the job's error field.
    pub fn detail(&self) -> String {
        match self {
            Self::ValidationFailure { message } => message.clone(),
            Self::OperationFailure { message, .. } => message.clone(),
            Self::Io(e) => e.to_string(),
        }
    }
}
