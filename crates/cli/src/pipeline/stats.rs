//! Batch statistics and summary output.

use std::time::Duration;

use contracts::{Job, JobStatus, StageStatus};
use observability::TrackerStatsAggregator;

/// Statistics from a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    /// Final job snapshots in creation order
    pub jobs: Vec<Job>,

    /// Wall-clock duration of the whole batch
    pub duration: Duration,

    /// Workers aborted by a tracker error
    pub aborted: usize,

    /// Per-phase aggregation over finished jobs
    pub aggregator: TrackerStatsAggregator,
}

impl BatchStats {
    /// Build statistics from final job snapshots
    pub fn from_jobs(jobs: &[Job], duration: Duration, aborted: usize) -> Self {
        let mut aggregator = TrackerStatsAggregator::new();
        for job in jobs {
            aggregator.update(job);
        }
        Self {
            jobs: jobs.to_vec(),
            duration,
            aborted,
            aggregator,
        }
    }

    pub fn completed(&self) -> usize {
        self.count(JobStatus::Complete)
    }

    pub fn failed(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|j| j.status == status).count()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Restore Batch Summary                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Jobs: {}", self.jobs.len());
        println!("   ├─ Completed: {}", self.completed());
        println!("   ├─ Failed: {}", self.failed());
        println!("   └─ Aborted workers: {}", self.aborted);

        println!("\n🗂  Jobs");
        for (i, job) in self.jobs.iter().enumerate() {
            let is_last = i == self.jobs.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let child_prefix = if is_last { "   " } else { "│  " };
            let marker = match job.status {
                JobStatus::Complete => "✓",
                JobStatus::Failed => "✗",
                JobStatus::Pending | JobStatus::Running => "…",
            };
            println!("   {} {} {} ({})", prefix, marker, job.name, job.status);

            for stage in &job.stages {
                let duration = stage.total_duration_ms();
                println!(
                    "   {}  {:<10} {:<11} {:>3}%  {} ms",
                    child_prefix,
                    stage.kind.as_str(),
                    stage.status.as_str(),
                    stage.progress.percent(),
                    duration
                );
            }
            if let Some(error) = failure_line(job) {
                println!("   {}  error: {}", child_prefix, error);
            }
        }

        println!("\n📈 Phase Statistics");
        print!("{}", self.aggregator.summary());
        println!();
    }
}

/// Job error, with the failed step details when there are any
fn failure_line(job: &Job) -> Option<String> {
    let error = job.error.as_deref()?;
    let details = job
        .stages
        .iter()
        .filter(|s| s.status == StageStatus::Failed)
        .filter_map(|s| s.last_step())
        .map(|step| step.details.as_str())
        .find(|details| !details.is_empty());

    Some(match details {
        Some(details) => format!("{error} ({details})"),
        None => error.to_string(),
    })
}
