//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Restore Tracker - staged progress tracking for database restore jobs
#[derive(Parser, Debug)]
#[command(
    name = "restore-tracker",
    author,
    version,
    about = "Run and monitor staged database restore jobs",
    long_about = "Restores database backups through a validate -> restore -> finalize pipeline.\n\n\
                  Every backup becomes a tracked job; each phase records timed steps so the \n\
                  progress of all in-flight jobs can be followed while they run."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RESTORE_TRACKER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RESTORE_TRACKER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore one or more backup files
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Backup files to restore, one job per file
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Path to configuration file (TOML or JSON); defaults are used when omitted
    #[arg(short, long, env = "RESTORE_TRACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the directory restored databases are written to
    #[arg(long, env = "RESTORE_TRACKER_TARGET_DIR")]
    pub target_dir: Option<PathBuf>,

    /// Override the maximum number of jobs running at once
    #[arg(long, env = "RESTORE_TRACKER_MAX_CONCURRENT")]
    pub max_concurrent: Option<usize>,

    /// Override the operation kind recorded on every job
    #[arg(long, env = "RESTORE_TRACKER_JOB_KIND")]
    pub kind: Option<String>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "RESTORE_TRACKER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Stream job events to stdout as JSON lines while jobs run
    #[arg(long)]
    pub watch: bool,

    /// Print the final monitoring snapshot as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Validate configuration and inputs and exit without restoring
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "restore-tracker.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "restore-tracker.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the pipeline phases
    #[arg(long)]
    pub phases: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
