//! PhaseOperations trait - the external engines driven by the pipeline
//!
//! The pipeline only consumes the outcome of these calls and measures
//! their wall-clock duration itself.

use std::path::Path;

use crate::PhaseError;

/// Result of backup validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Whether the backup can be restored
    pub valid: bool,

    /// Validator output or rejection reason
    pub message: String,
}

impl ValidationReport {
    pub fn valid(message: impl Into<String>) -> Self {
        Self {
            valid: true,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Phase operation backend
///
/// All implementations must implement this trait.
#[trait_variant::make(PhaseOperations: Send)]
pub trait LocalPhaseOperations {
    /// Backend name (used for logging)
    fn name(&self) -> &str;

    /// Inspect a backup file
    ///
    /// # Errors
    /// Returns an error when the validator itself could not run; an
    /// unusable backup is reported through [`ValidationReport::valid`]
    async fn validate(&self, path: &Path) -> Result<ValidationReport, PhaseError>;

    /// Restore `source` into `target`, returning the engine output
    async fn restore(&self, source: &Path, target: &Path) -> Result<String, PhaseError>;

    /// Configure the restored database
    async fn configure(&self, target: &Path) -> Result<(), PhaseError>;
}
