//! Restore batch - runs one job per backup file with bounded concurrency.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{BackendKind, JobEvent, ServiceConfig};
use orchestrator::{Operations, Orchestrator, RestoreRequest};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use tracker::JobTracker;

use super::BatchStats;

/// Batch configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Validated service configuration (CLI overrides applied)
    pub service: ServiceConfig,

    /// Backup files, one job each
    pub files: Vec<PathBuf>,

    /// Stream job events to stdout
    pub watch: bool,
}

/// Restore batch runner
pub struct RestoreBatch {
    config: BatchConfig,
    tracker: Arc<JobTracker>,
}

impl RestoreBatch {
    /// Create a batch with its own tracker
    pub fn new(config: BatchConfig) -> Self {
        let tracker = Arc::new(JobTracker::with_config(config.service.tracker.clone()));
        Self { config, tracker }
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    /// Run every job to a terminal status
    pub async fn run(&self) -> Result<BatchStats> {
        let start_time = Instant::now();
        let service = &self.config.service;

        let operations = Operations::from_config(&service.operations)
            .context("Failed to build phase operations backend")?;

        if service.operations.backend == BackendKind::Command {
            tokio::fs::create_dir_all(&service.pipeline.target_dir)
                .await
                .with_context(|| {
                    format!(
                        "Failed to create target directory {}",
                        service.pipeline.target_dir.display()
                    )
                })?;
        }

        let orchestrator = Orchestrator::new(Arc::clone(&self.tracker), operations);
        let printer = self.config.watch.then(|| {
            let (stop_tx, stop_rx) = oneshot::channel();
            let handle = spawn_event_printer(self.tracker.subscribe(), stop_rx);
            (stop_tx, handle)
        });

        info!(
            jobs = self.config.files.len(),
            max_concurrent = service.pipeline.max_concurrent_jobs,
            backend = ?service.operations.backend,
            "Starting restore batch"
        );

        let semaphore = Arc::new(Semaphore::new(service.pipeline.max_concurrent_jobs));
        let mut workers = JoinSet::new();

        for (index, file) in self.config.files.iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .context("Job semaphore closed")?;

            let request =
                RestoreRequest::new(file.clone(), service.pipeline.target_path_for(file))
                    .with_kind(service.pipeline.job_kind.clone());
            let (job_id, handle) = orchestrator.spawn(request);
            debug!(job_id = %job_id, file = %file.display(), "Job spawned");

            workers.spawn(async move {
                let result = handle.await;
                drop(permit);
                (index, job_id, result)
            });
        }

        // Retention may already have evicted finished jobs from the tracker,
        // so the summary is built from each worker's final snapshot.
        let mut finished = Vec::with_capacity(self.config.files.len());
        let mut aborted = 0;
        while let Some(joined) = workers.join_next().await {
            let (index, job_id, result) = joined.context("Restore worker task panicked")?;
            match result {
                Ok(Ok(report)) => {
                    debug!(job_id = %job_id, status = %report.status, "Job finished");
                    finished.push((index, report.job));
                }
                Ok(Err(e)) => {
                    aborted += 1;
                    error!(job_id = %job_id, error = %e, "Restore worker aborted");
                    finished.extend(self.tracker.get_job(job_id).map(|job| (index, job)));
                }
                Err(e) => {
                    aborted += 1;
                    error!(job_id = %job_id, error = %e, "Restore worker panicked");
                    finished.extend(self.tracker.get_job(job_id).map(|job| (index, job)));
                }
            }
        }

        finished.sort_by_key(|(index, _)| *index);
        let jobs: Vec<_> = finished.into_iter().map(|(_, job)| job).collect();
        let stats = BatchStats::from_jobs(&jobs, start_time.elapsed(), aborted);

        // All events are published once the workers are done
        if let Some((stop, handle)) = printer {
            let _ = stop.send(());
            if let Err(e) = handle.await {
                warn!(error = %e, "Event printer task failed");
            }
        }

        Ok(stats)
    }
}

/// Print every job event as one JSON line until stopped
///
/// Events still buffered when `stop` fires are printed before returning.
fn spawn_event_printer(
    mut events: broadcast::Receiver<JobEvent>,
    mut stop: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                received = events.recv() => match received {
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event stream lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut stop => {
                    loop {
                        match events.try_recv() {
                            Ok(event) => print_event(&event),
                            Err(TryRecvError::Lagged(skipped)) => {
                                warn!(skipped, "Event stream lagged, events dropped");
                            }
                            Err(_) => break,
                        }
                    }
                    break;
                }
            }
        }
    })
}

fn print_event(event: &JobEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "Failed to serialize job event"),
    }
}
