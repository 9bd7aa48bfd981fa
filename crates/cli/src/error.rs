//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Backup file not found
    #[error("Backup file not found: {path}")]
    BackupNotFound { path: String },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Some restore jobs did not complete
    #[error("{failed} of {total} restore jobs failed")]
    JobsFailed { failed: usize, total: usize },

    /// Shutdown signal arrived before all jobs finished
    #[error("Interrupted with {active} restore jobs still running")]
    Interrupted { active: usize },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn backup_not_found(path: &Path) -> Self {
        Self::BackupNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}
