//! ServiceConfig - Config Loader output
//!
//! Tracker retention, pipeline settings and phase operation backends.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::StageKind;

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Job tracker settings
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Pipeline settings
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Phase operation backend
    #[serde(default)]
    pub operations: OperationsConfig,
}

/// Job tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Number of finished jobs kept in memory
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Capacity of the job event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_history_limit() -> usize {
    100
}

fn default_event_capacity() -> usize {
    256
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Directory restored databases are written to
    #[serde(default = "default_target_dir")]
    pub target_dir: PathBuf,

    /// Maximum number of jobs running at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Operation kind recorded on every job
    #[serde(default = "default_job_kind")]
    pub job_kind: String,
}

fn default_target_dir() -> PathBuf {
    PathBuf::from("restored")
}

fn default_max_concurrent_jobs() -> usize {
    4
}

/// Operation kind recorded on jobs when none is configured
pub const DEFAULT_JOB_KIND: &str = "upload";

fn default_job_kind() -> String {
    DEFAULT_JOB_KIND.to_string()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            target_dir: default_target_dir(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_kind: default_job_kind(),
        }
    }
}

impl PipelineSettings {
    /// Target database path for a backup file: `<target_dir>/<stem>.fdb`
    pub fn target_path_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "restore".to_string());
        self.target_dir.join(format!("{stem}.fdb"))
    }
}

/// Backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Sleeps instead of running real engines
    #[default]
    Simulated,
    /// Runs external commands
    Command,
}

/// Phase operation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationsConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub simulated: SimulatedConfig,

    /// Required when `backend = "command"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandConfig>,
}

/// Simulated backend settings (failure injection for demos and tests)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedConfig {
    #[serde(default = "default_validate_ms")]
    pub validate_ms: u64,

    #[serde(default = "default_restore_ms")]
    pub restore_ms: u64,

    #[serde(default = "default_configure_ms")]
    pub configure_ms: u64,

    /// Phase that fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_phase: Option<StageKind>,

    /// Error text reported by the failing phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_message: Option<String>,

    /// Only backups listed here fail, matched by file stem (empty = all)
    #[serde(default)]
    pub fail_sources: Vec<String>,
}

fn default_validate_ms() -> u64 {
    120
}

fn default_restore_ms() -> u64 {
    1500
}

fn default_configure_ms() -> u64 {
    300
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            validate_ms: default_validate_ms(),
            restore_ms: default_restore_ms(),
            configure_ms: default_configure_ms(),
            fail_phase: None,
            fail_message: None,
            fail_sources: Vec::new(),
        }
    }
}

/// External command backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    pub validate: CommandSpec,
    pub restore: CommandSpec,
    pub configure: CommandSpec,
}

/// One external command
///
/// `{source}` and `{target}` in arguments are replaced with the job paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Render arguments for a job
    pub fn render_args(&self, source: Option<&Path>, target: Option<&Path>) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                let mut rendered = arg.clone();
                if let Some(source) = source {
                    rendered = rendered.replace("{source}", &source.to_string_lossy());
                }
                if let Some(target) = target {
                    rendered = rendered.replace("{target}", &target.to_string_lossy());
                }
                rendered
            })
            .collect()
    }
}
