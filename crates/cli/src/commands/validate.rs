//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BackendKind, ServiceConfig};
use orchestrator::PhaseDescriptor;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    backend: String,
    target_dir: String,
    max_concurrent_jobs: usize,
    history_limit: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    backend: format!("{:?}", config.operations.backend),
                    target_dir: config.pipeline.target_dir.display().to_string(),
                    max_concurrent_jobs: config.pipeline.max_concurrent_jobs,
                    history_limit: config.tracker.history_limit,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ServiceConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let simulated = &config.operations.simulated;

    if config.operations.backend == BackendKind::Simulated {
        warnings.push("Simulated backend - no database will actually be restored".to_string());

        if let Some(phase) = simulated.fail_phase {
            let scope = if simulated.fail_sources.is_empty() {
                "every job".to_string()
            } else {
                format!("{} listed backups", simulated.fail_sources.len())
            };
            let stage = PhaseDescriptor::for_kind(phase);
            warnings.push(format!(
                "Failure injection enabled: '{phase}' fails for {scope} ({})",
                stage.description
            ));
        }
    } else if simulated.fail_phase.is_some() {
        warnings.push(
            "operations.simulated.fail_phase is ignored by the command backend".to_string(),
        );
    }

    if config.operations.backend == BackendKind::Simulated && config.operations.command.is_some() {
        warnings.push("operations.command is ignored by the simulated backend".to_string());
    }

    if config.tracker.event_capacity < config.pipeline.max_concurrent_jobs * 8 {
        warnings.push(format!(
            "tracker.event_capacity ({}) is small for {} concurrent jobs - watchers may lag",
            config.tracker.event_capacity, config.pipeline.max_concurrent_jobs
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Backend: {}", summary.backend);
            println!("  Target dir: {}", summary.target_dir);
            println!("  Max concurrent jobs: {}", summary.max_concurrent_jobs);
            println!("  History limit: {}", summary.history_limit);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
