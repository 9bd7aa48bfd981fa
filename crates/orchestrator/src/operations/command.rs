//! External command backend
//!
//! Runs one configured program per phase (e.g. `gbak` for validation and
//! restore, `isql` for configuration). A non-zero exit status is a phase
//! failure whose text is the command's stderr.

use std::path::Path;
use std::process::Output;

use contracts::{CommandConfig, CommandSpec, PhaseError, PhaseOperations, ValidationReport};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Phase backend that shells out to external programs
#[derive(Debug, Clone)]
pub struct CommandOperations {
    config: CommandConfig,
}

impl CommandOperations {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    async fn execute(
        spec: &CommandSpec,
        source: Option<&Path>,
        target: Option<&Path>,
    ) -> Result<Output, PhaseError> {
        let args = spec.render_args(source, target);
        debug!(program = %spec.program, args = ?args, "Running phase command");

        let output = Command::new(&spec.program).args(&args).output().await?;
        debug!(program = %spec.program, status = %output.status, "Phase command exited");
        Ok(output)
    }
}

/// Failure text of a finished command: stderr, else stdout, else the exit status
fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("command exited with {}", output.status)
}

fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

impl PhaseOperations for CommandOperations {
    fn name(&self) -> &str {
        "command"
    }

    /// Exit status 0 means a usable backup; anything else is a rejection
    /// carrying the command output. Failing to spawn is an error.
    #[instrument(name = "command_validate", skip(self), fields(path = %path.display()))]
    async fn validate(&self, path: &Path) -> Result<ValidationReport, PhaseError> {
        let output = Self::execute(&self.config.validate, Some(path), None)
            .await
            .map_err(|e| PhaseError::validation(e.detail()))?;

        if output.status.success() {
            Ok(ValidationReport::valid(stdout_text(&output)))
        } else {
            Ok(ValidationReport::invalid(failure_text(&output)))
        }
    }

    #[instrument(
        name = "command_restore",
        skip(self),
        fields(source = %source.display(), target = %target.display())
    )]
    async fn restore(&self, source: &Path, target: &Path) -> Result<String, PhaseError> {
        let output = Self::execute(&self.config.restore, Some(source), Some(target))
            .await
            .map_err(|e| PhaseError::operation("restore", e.detail()))?;

        if output.status.success() {
            Ok(stdout_text(&output))
        } else {
            Err(PhaseError::operation("restore", failure_text(&output)))
        }
    }

    #[instrument(name = "command_configure", skip(self), fields(target = %target.display()))]
    async fn configure(&self, target: &Path) -> Result<(), PhaseError> {
        let output = Self::execute(&self.config.configure, None, Some(target))
            .await
            .map_err(|e| PhaseError::operation("configure", e.detail()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(PhaseError::operation("configure", failure_text(&output)))
        }
    }
}
