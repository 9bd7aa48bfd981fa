//! Orchestrator error types

use contracts::TrackerError;
use thiserror::Error;

/// Errors that abort a pipeline worker
///
/// A failing phase is not an error here; it is recorded on the job and
/// reported in the [`JobReport`](crate::JobReport).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Tracker rejected an update (logic defect, fatal to the worker)
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// Backend could not be built from configuration
    #[error("invalid operations configuration: {message}")]
    Configuration { message: String },
}

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
