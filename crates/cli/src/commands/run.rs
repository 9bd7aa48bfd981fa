//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use tracing::{info, warn};

use super::load_config_file;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{BatchConfig, RestoreBatch};

/// Execute the `run` command
pub async fn run_restore(args: &RunArgs) -> Result<()> {
    let config = build_config(args)?;

    for file in &args.files {
        if !file.is_file() {
            return Err(CliError::backup_not_found(file).into());
        }
    }

    info!(
        jobs = args.files.len(),
        target_dir = %config.pipeline.target_dir.display(),
        max_concurrent = config.pipeline.max_concurrent_jobs,
        backend = ?config.operations.backend,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration and inputs are valid, exiting");
        print_plan(&config, args);
        return Ok(());
    }

    let batch = RestoreBatch::new(BatchConfig {
        service: config,
        files: args.files.clone(),
        watch: args.watch,
    });

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    let stats = tokio::select! {
        result = batch.run() => result.context("Restore batch failed")?,
        _ = shutdown_signal => {
            warn!("Received shutdown signal, abandoning running jobs...");
            let active = batch.tracker().active_count();
            return Err(CliError::Interrupted { active }.into());
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&stats.jobs)
            .context("Failed to serialize job results")?;
        println!("{}", json);
    } else {
        stats.print_summary();
    }

    // Workers aborted before leaving a snapshot count as failed too
    let total = args.files.len();
    let failed = total - stats.completed();
    if failed > 0 {
        return Err(CliError::JobsFailed { failed, total }.into());
    }

    info!(
        jobs = args.files.len(),
        duration_secs = stats.duration.as_secs_f64(),
        "All restore jobs completed"
    );
    Ok(())
}

/// Load the configuration file (or defaults) and apply CLI overrides
fn build_config(args: &RunArgs) -> Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            load_config_file(path)?
        }
        None => ServiceConfig::default(),
    };

    // Apply CLI overrides
    if let Some(ref dir) = args.target_dir {
        info!(target_dir = %dir.display(), "Overriding target directory from CLI");
        config.pipeline.target_dir = dir.clone();
    }
    if let Some(max) = args.max_concurrent {
        info!(max_concurrent = max, "Overriding job concurrency from CLI");
        config.pipeline.max_concurrent_jobs = max;
    }
    if let Some(ref kind) = args.kind {
        config.pipeline.job_kind = kind.clone();
    }

    config_loader::ConfigLoader::validate(&config)
        .map_err(|e| CliError::config_validation(e.to_string()))?;
    Ok(config)
}

/// Setup Ctrl+C and SIGTERM signal handlers
///
/// A handler that cannot be installed never fires.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print the planned jobs for dry-run mode
fn print_plan(config: &ServiceConfig, args: &RunArgs) {
    println!("\n=== Restore Plan ===\n");
    println!("Backend: {:?}", config.operations.backend);
    println!("Job kind: {}", config.pipeline.job_kind);
    println!("Max concurrent jobs: {}", config.pipeline.max_concurrent_jobs);
    println!("\nJobs ({}):", args.files.len());
    for file in &args.files {
        println!(
            "  - {} -> {}",
            file.display(),
            config.pipeline.target_path_for(file).display()
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn args(config: Option<PathBuf>) -> RunArgs {
        RunArgs {
            files: vec![PathBuf::from("a.fbk")],
            config,
            target_dir: None,
            max_concurrent: None,
            kind: None,
            metrics_port: 0,
            watch: false,
            json: false,
            dry_run: false,
        }
    }

    #[test]
    fn test_build_config_defaults() {
        let config = build_config(&args(None)).unwrap();
        assert_eq!(config.pipeline.max_concurrent_jobs, 4);
        assert_eq!(config.pipeline.job_kind, contracts::DEFAULT_JOB_KIND);
    }

    #[test]
    fn test_kind_flag_overrides_job_kind() {
        let mut run_args = args(None);
        run_args.kind = Some("schedule".to_string());
        let config = build_config(&run_args).unwrap();
        assert_eq!(config.pipeline.job_kind, "schedule");
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[pipeline]\nmax_concurrent_jobs = 8\njob_kind = \"schedule\"").unwrap();

        let mut run_args = args(Some(file.path().to_path_buf()));
        run_args.max_concurrent = Some(2);
        run_args.target_dir = Some(PathBuf::from("/tmp/restored"));

        let config = build_config(&run_args).unwrap();
        assert_eq!(config.pipeline.max_concurrent_jobs, 2);
        assert_eq!(config.pipeline.job_kind, "schedule");
        assert_eq!(config.pipeline.target_dir, PathBuf::from("/tmp/restored"));
    }

    #[test]
    fn test_override_is_validated() {
        let mut run_args = args(None);
        run_args.max_concurrent = Some(0);
        let err = build_config(&run_args).unwrap_err();
        assert!(err.to_string().contains("max_concurrent_jobs"));
    }

    #[test]
    fn test_missing_config_file() {
        let err = build_config(&args(Some(PathBuf::from("/nonexistent/x.toml")))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
