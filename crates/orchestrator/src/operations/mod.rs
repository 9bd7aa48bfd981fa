//! Phase operation backends

mod command;
mod simulated;

pub use command::CommandOperations;
pub use simulated::SimulatedOperations;

use std::path::Path;

use contracts::{BackendKind, OperationsConfig, PhaseError, PhaseOperations, ValidationReport};

use crate::PipelineError;

/// Backend selected by configuration
#[derive(Debug, Clone)]
pub enum Operations {
    Simulated(SimulatedOperations),
    Command(CommandOperations),
}

impl Operations {
    /// Build the configured backend
    ///
    /// # Errors
    /// `Configuration` when the command backend is selected without commands
    pub fn from_config(config: &OperationsConfig) -> Result<Self, PipelineError> {
        match config.backend {
            BackendKind::Simulated => Ok(Self::Simulated(SimulatedOperations::with_config(
                config.simulated.clone(),
            ))),
            BackendKind::Command => {
                let commands = config.command.clone().ok_or_else(|| {
                    PipelineError::configuration(
                        "backend 'command' requires an [operations.command] section",
                    )
                })?;
                Ok(Self::Command(CommandOperations::new(commands)))
            }
        }
    }
}

impl PhaseOperations for Operations {
    fn name(&self) -> &str {
        match self {
            Self::Simulated(ops) => ops.name(),
            Self::Command(ops) => ops.name(),
        }
    }

    async fn validate(&self, path: &Path) -> Result<ValidationReport, PhaseError> {
        match self {
            Self::Simulated(ops) => ops.validate(path).await,
            Self::Command(ops) => ops.validate(path).await,
        }
    }

    async fn restore(&self, source: &Path, target: &Path) -> Result<String, PhaseError> {
        match self {
            Self::Simulated(ops) => ops.restore(source, target).await,
            Self::Command(ops) => ops.restore(source, target).await,
        }
    }

    async fn configure(&self, target: &Path) -> Result<(), PhaseError> {
        match self {
            Self::Simulated(ops) => ops.configure(target).await,
            Self::Command(ops) => ops.configure(target).await,
        }
    }
}
