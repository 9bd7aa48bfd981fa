//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{BackendKind, ServiceConfig};
use orchestrator::PhaseDescriptor;
use serde::Serialize;
use tracing::info;

use super::load_config_file;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    tracker: TrackerInfo,
    pipeline: PipelineInfo,
    backend: BackendInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    phases: Vec<PhaseInfo>,
}

#[derive(Serialize)]
struct TrackerInfo {
    history_limit: usize,
    event_capacity: usize,
}

#[derive(Serialize)]
struct PipelineInfo {
    target_dir: String,
    max_concurrent_jobs: usize,
    job_kind: String,
}

#[derive(Serialize)]
struct BackendInfo {
    kind: String,
    /// `program args...` per phase (command backend)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    commands: Vec<String>,
    /// Simulated phase durations in ms
    #[serde(skip_serializing_if = "Option::is_none")]
    simulated_ms: Option<[u64; 3]>,
}

#[derive(Serialize)]
struct PhaseInfo {
    kind: String,
    label: String,
    description: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config_file(&args.config)?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &ServiceConfig, args: &InfoArgs) -> ConfigInfo {
    let operations = &config.operations;

    let backend = match operations.backend {
        BackendKind::Simulated => BackendInfo {
            kind: "simulated".to_string(),
            commands: Vec::new(),
            simulated_ms: Some([
                operations.simulated.validate_ms,
                operations.simulated.restore_ms,
                operations.simulated.configure_ms,
            ]),
        },
        BackendKind::Command => BackendInfo {
            kind: "command".to_string(),
            commands: operations
                .command
                .iter()
                .flat_map(|c| [&c.validate, &c.restore, &c.configure])
                .map(|spec| format!("{} {}", spec.program, spec.args.join(" ")))
                .collect(),
            simulated_ms: None,
        },
    };

    let phases = if args.phases {
        PhaseDescriptor::restore_pipeline()
            .iter()
            .map(|p| PhaseInfo {
                kind: p.kind.to_string(),
                label: p.label.to_string(),
                description: p.description.to_string(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        tracker: TrackerInfo {
            history_limit: config.tracker.history_limit,
            event_capacity: config.tracker.event_capacity,
        },
        pipeline: PipelineInfo {
            target_dir: config.pipeline.target_dir.display().to_string(),
            max_concurrent_jobs: config.pipeline.max_concurrent_jobs,
            job_kind: config.pipeline.job_kind.clone(),
        },
        backend,
        phases,
    }
}

fn print_config_info(config: &ServiceConfig, args: &InfoArgs) {
    let info = build_config_info(config, args);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Restore Tracker Configuration                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🗄  Pipeline");
    println!("   ├─ Target dir: {}", info.pipeline.target_dir);
    println!("   ├─ Max concurrent jobs: {}", info.pipeline.max_concurrent_jobs);
    println!("   └─ Job kind: {}", info.pipeline.job_kind);

    println!("\n📋 Tracker");
    println!("   ├─ History limit: {}", info.tracker.history_limit);
    println!("   └─ Event capacity: {}", info.tracker.event_capacity);

    println!("\n⚙️  Backend: {}", info.backend.kind);
    if let Some([validate, restore, configure]) = info.backend.simulated_ms {
        println!("   ├─ validate: {} ms", validate);
        println!("   ├─ restore: {} ms", restore);
        println!("   └─ configure: {} ms", configure);
    }
    for (i, command) in info.backend.commands.iter().enumerate() {
        let prefix = if i == info.backend.commands.len() - 1 {
            "└─"
        } else {
            "├─"
        };
        println!("   {} {}", prefix, command);
    }

    if !info.phases.is_empty() {
        println!("\n🔁 Phases ({})", info.phases.len());
        for (i, phase) in info.phases.iter().enumerate() {
            let prefix = if i == info.phases.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            println!("   {} {} - {}", prefix, phase.label, phase.description);
        }
    }

    println!();
}
