//! Job 指标收集模块
//!
//! 记录 job 生命周期与各阶段耗时，并在内存中聚合统计。

use std::collections::BTreeMap;

use contracts::{Job, JobStatus, StageKind, StageStatus};
use metrics::{counter, gauge, histogram};

/// 记录 job 启动
pub fn record_job_started() {
    counter!("restore_tracker_jobs_started_total").increment(1);
}

/// 记录 job 结束 (complete / failed)
pub fn record_job_finished(status: JobStatus) {
    counter!(
        "restore_tracker_jobs_finished_total",
        "status" => status.as_str()
    )
    .increment(1);
}

/// 记录阶段结果
///
/// 只有测量过的耗时才进入直方图。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_phase;
///
/// record_phase(StageKind::Validation, StageStatus::Failed, Some(120));
/// ```
pub fn record_phase(stage: StageKind, status: StageStatus, duration_ms: Option<u64>) {
    if let Some(ms) = duration_ms {
        histogram!(
            "restore_tracker_phase_duration_ms",
            "stage" => stage.as_str(),
            "status" => status.as_str()
        )
        .record(ms as f64);
    }

    if status == StageStatus::Failed {
        counter!(
            "restore_tracker_phase_failures_total",
            "stage" => stage.as_str()
        )
        .increment(1);
    }
}

/// 当前活跃 job 数
pub fn set_active_jobs(count: usize) {
    gauge!("restore_tracker_jobs_active").set(count as f64);
}

/// Job 统计聚合器
///
/// 在内存中聚合已结束 job 的结果，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct TrackerStatsAggregator {
    /// 已结束 job 数
    pub total_jobs: u64,

    /// 成功 job 数
    pub completed_jobs: u64,

    /// 失败 job 数
    pub failed_jobs: u64,

    /// 各阶段耗时统计 (毫秒，仅计入测量过的步骤)
    pub phase_stats: BTreeMap<StageKind, RunningStats>,

    /// 各阶段失败次数
    pub failures_by_stage: BTreeMap<StageKind, u64>,
}

impl TrackerStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 计入一个已结束的 job
    ///
    /// 非终态 job 会被忽略。
    pub fn update(&mut self, job: &Job) {
        match job.status {
            JobStatus::Complete => self.completed_jobs += 1,
            JobStatus::Failed => self.failed_jobs += 1,
            JobStatus::Pending | JobStatus::Running => return,
        }
        self.total_jobs += 1;

        for stage in &job.stages {
            let measured = stage.total_duration_ms();
            if measured > 0 {
                self.phase_stats
                    .entry(stage.kind)
                    .or_default()
                    .push(measured as f64);
            }
            if stage.status == StageStatus::Failed {
                *self.failures_by_stage.entry(stage.kind).or_insert(0) += 1;
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> StatsReport {
        StatsReport {
            total_jobs: self.total_jobs,
            completed_jobs: self.completed_jobs,
            failed_jobs: self.failed_jobs,
            success_rate: if self.total_jobs > 0 {
                self.completed_jobs as f64 / self.total_jobs as f64 * 100.0
            } else {
                0.0
            },
            phase_durations_ms: self
                .phase_stats
                .iter()
                .map(|(kind, stats)| (*kind, StatsSummary::from(stats)))
                .collect(),
            failures_by_stage: self.failures_by_stage.clone(),
        }
    }
}

/// 统计摘要报告
#[derive(Debug, Clone, Default)]
pub struct StatsReport {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub success_rate: f64,
    pub phase_durations_ms: BTreeMap<StageKind, StatsSummary>,
    pub failures_by_stage: BTreeMap<StageKind, u64>,
}

impl std::fmt::Display for StatsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Restore Jobs Summary ===")?;
        writeln!(f, "Total jobs: {}", self.total_jobs)?;
        writeln!(
            f,
            "Completed: {} ({:.2}%)",
            self.completed_jobs, self.success_rate
        )?;
        writeln!(f, "Failed: {}", self.failed_jobs)?;

        if !self.phase_durations_ms.is_empty() {
            writeln!(f, "Phase durations (ms):")?;
            for (kind, summary) in &self.phase_durations_ms {
                writeln!(f, "  {}: {}", kind, summary)?;
            }
        }

        if !self.failures_by_stage.is_empty() {
            writeln!(f, "Failures by stage:")?;
            for (kind, count) in &self.failures_by_stage {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Stage, StageProgress, Step};

    fn stage_with_duration(kind: StageKind, status: StageStatus, ms: u64) -> Stage {
        let mut stage = Stage::new(kind, kind.as_str(), "");
        stage.status = status;
        stage.progress = if status == StageStatus::Complete {
            StageProgress::Done
        } else {
            StageProgress::Half
        };
        stage.steps.push(Step::new(StageStatus::InProgress, "start", ""));
        let mut finished = Step::new(status, "end", "");
        finished.duration_ms = Some(ms);
        stage.steps.push(finished);
        stage
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(value);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = TrackerStatsAggregator::new();

        let mut ok = Job::new("a.fbk", "/a.fbk", "upload");
        ok.status = JobStatus::Complete;
        ok.stages = vec![
            stage_with_duration(StageKind::Validation, StageStatus::Complete, 120),
            stage_with_duration(StageKind::Restore, StageStatus::Complete, 4500),
            stage_with_duration(StageKind::Finalize, StageStatus::Complete, 300),
        ];

        let mut bad = Job::new("b.fbk", "/b.fbk", "upload");
        bad.status = JobStatus::Failed;
        bad.stages = vec![stage_with_duration(
            StageKind::Validation,
            StageStatus::Failed,
            80,
        )];

        let running = Job::new("c.fbk", "/c.fbk", "upload");

        aggregator.update(&ok);
        aggregator.update(&bad);
        aggregator.update(&running);

        assert_eq!(aggregator.total_jobs, 2);
        assert_eq!(aggregator.completed_jobs, 1);
        assert_eq!(aggregator.failed_jobs, 1);
        assert_eq!(
            aggregator.failures_by_stage.get(&StageKind::Validation),
            Some(&1)
        );
        assert_eq!(aggregator.phase_stats[&StageKind::Validation].count(), 2);
        assert!((aggregator.phase_stats[&StageKind::Restore].mean() - 4500.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = TrackerStatsAggregator::new();
        let mut ok = Job::new("a.fbk", "/a.fbk", "upload");
        ok.status = JobStatus::Complete;
        ok.stages = vec![stage_with_duration(
            StageKind::Validation,
            StageStatus::Complete,
            120,
        )];
        aggregator.update(&ok);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Total jobs: 1"));
        assert!(output.contains("100.00%"));
        assert!(output.contains("validation: min=120.0"));
    }
}
