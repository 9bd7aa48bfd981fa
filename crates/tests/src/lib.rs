//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试 (JSON 形状)
//! - 模拟 e2e 测试（无需真实 gbak）
//! - 并发一致性测试

#[cfg(test)]
mod contract_tests {
    use contracts::{Job, JobEvent, Stage, StageKind, StageProgress, StageStatus, Step};

    #[test]
    fn test_job_json_shape() {
        let mut job = Job::new("sales.fbk", "/backups/sales.fbk", "upload");
        let mut stage = Stage::new(StageKind::Validation, "Validation", "Checking backup");
        stage.status = StageStatus::InProgress;
        stage.progress = StageProgress::Half;
        stage
            .steps
            .push(Step::new(StageStatus::InProgress, "Validating backup file", ""));
        job.stages.push(stage);

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["kind"], "upload");
        assert_eq!(value["source_path"], "/backups/sales.fbk");
        assert_eq!(value["stages"][0]["status"], "in_progress");
        assert_eq!(value["stages"][0]["progress"], 50);
        assert_eq!(value["stages"][0]["steps"][0]["status"], "in_progress");
        // Unmeasured steps carry no duration
        assert!(value["stages"][0]["steps"][0].get("duration_ms").is_none());

        let parsed: Job = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn test_event_is_tagged() {
        let job = Job::new("sales.fbk", "/backups/sales.fbk", "upload");
        let value = serde_json::to_value(JobEvent::Completed { job }).unwrap();
        assert_eq!(value["event"], "completed");
        assert_eq!(value["job"]["name"], "sales.fbk");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        Job, JobEvent, JobStatus, PhaseError, PhaseOperations, SimulatedConfig, StageKind,
        StageProgress, StageStatus, TrackerConfig, ValidationReport,
    };
    use observability::TrackerStatsAggregator;
    use orchestrator::{Operations, Orchestrator, RestoreRequest, SimulatedOperations};
    use rand::Rng;
    use tracker::JobTracker;

    fn simulated(config: SimulatedConfig) -> SimulatedOperations {
        SimulatedOperations::with_config(config)
    }

    fn request(name: &str) -> RestoreRequest {
        RestoreRequest::new(
            format!("/backups/{name}.fbk"),
            format!("/restored/{name}.fdb"),
        )
    }

    /// Structural invariants every finished job must satisfy
    fn assert_consistent_history(job: &Job) {
        assert!(job.is_terminal(), "job {} not terminal", job.name);
        assert!(!job.stages.is_empty());

        // Stages are a prefix of the pipeline order
        for (stage, expected) in job.stages.iter().zip(StageKind::ALL) {
            assert_eq!(stage.kind, expected);
        }

        let (last, earlier) = job.stages.split_last().unwrap();
        for stage in earlier {
            assert_eq!(stage.status, StageStatus::Complete);
        }

        for stage in &job.stages {
            assert!(stage.progress.is_consistent_with(stage.status));
            assert_eq!(stage.steps.len(), 2);
            assert_eq!(stage.steps[0].status, StageStatus::InProgress);
            assert_eq!(stage.steps[0].duration_ms, None);
            assert_eq!(stage.steps[1].status, stage.status);
        }

        match job.status {
            JobStatus::Complete => {
                assert_eq!(job.stages.len(), StageKind::ALL.len());
                assert_eq!(last.status, StageStatus::Complete);
                assert_eq!(job.overall_progress(StageKind::ALL.len()), 100);
            }
            JobStatus::Failed => {
                assert_eq!(last.status, StageStatus::Failed);
                assert_eq!(job.last_failure(), job.error.as_deref());
            }
            other => panic!("unexpected status {other}"),
        }
    }

    /// Validation fails with "corrupt header"
    #[tokio::test(start_paused = true)]
    async fn test_validation_failure_leaves_single_stage() {
        let tracker = Arc::new(JobTracker::new());
        let orchestrator = Orchestrator::new(
            Arc::clone(&tracker),
            simulated(SimulatedConfig {
                fail_phase: Some(StageKind::Validation),
                fail_message: Some("corrupt header".into()),
                ..Default::default()
            }),
        );

        let report = orchestrator.run(request("sales")).await.unwrap();
        let job = tracker.get_job(report.job_id).unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.stages.len(), 1);
        assert_eq!(job.stages[0].kind, StageKind::Validation);
        assert_eq!(job.stages[0].status, StageStatus::Failed);
        assert_eq!(job.stages[0].steps[1].message, "corrupt header");
        assert_eq!(job.stages[0].steps[1].duration_ms, Some(120));
        assert!(job.stage(StageKind::Restore).is_none());
        assert!(job.stage(StageKind::Finalize).is_none());
        assert_consistent_history(&job);
    }

    /// All phases succeed with 120 / 4500 / 300 ms
    #[tokio::test(start_paused = true)]
    async fn test_successful_pipeline_records_phase_durations() {
        let tracker = Arc::new(JobTracker::new());
        let orchestrator = Orchestrator::new(
            Arc::clone(&tracker),
            simulated(SimulatedConfig {
                validate_ms: 120,
                restore_ms: 4500,
                configure_ms: 300,
                ..Default::default()
            }),
        );

        let report = orchestrator.run(request("sales")).await.unwrap();
        let job = tracker.get_job(report.job_id).unwrap();

        assert_eq!(job.status, JobStatus::Complete);
        let durations: Vec<Option<u64>> = job
            .stages
            .iter()
            .map(|s| s.last_step().and_then(|step| step.duration_ms))
            .collect();
        assert_eq!(durations, vec![Some(120), Some(4500), Some(300)]);
        for stage in &job.stages {
            assert_eq!(stage.status, StageStatus::Complete);
            assert_eq!(stage.progress, StageProgress::Done);
        }
        assert_consistent_history(&job);
    }

    /// Restore errors after validation succeeded
    #[tokio::test(start_paused = true)]
    async fn test_restore_failure_after_validation() {
        let tracker = Arc::new(JobTracker::new());
        let orchestrator = Orchestrator::new(
            Arc::clone(&tracker),
            simulated(SimulatedConfig {
                fail_phase: Some(StageKind::Restore),
                fail_message: Some("gbak: I/O error during write".into()),
                ..Default::default()
            }),
        );

        let report = orchestrator.run(request("sales")).await.unwrap();
        let job = tracker.get_job(report.job_id).unwrap();

        let validation = job.stage(StageKind::Validation).unwrap();
        assert_eq!(validation.status, StageStatus::Complete);
        assert_eq!(validation.progress, StageProgress::Done);

        let restore = job.stage(StageKind::Restore).unwrap();
        assert_eq!(restore.status, StageStatus::Failed);
        assert_eq!(
            restore.last_step().unwrap().message,
            "gbak: I/O error during write"
        );
        assert!(job.stage(StageKind::Finalize).is_none());
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("gbak: I/O error during write"));
    }

    /// Random delays and random failures per backup
    struct JitterOperations {
        delays: HashMap<PathBuf, [u64; 3]>,
        failing: HashMap<PathBuf, StageKind>,
    }

    impl JitterOperations {
        fn outcome(&self, path: &Path, phase: StageKind) -> (u64, bool) {
            let index = StageKind::ALL.iter().position(|k| *k == phase).unwrap();
            let delay = self.delays.get(path).map_or(0, |d| d[index]);
            (delay, self.failing.get(path) == Some(&phase))
        }
    }

    impl PhaseOperations for JitterOperations {
        fn name(&self) -> &str {
            "jitter"
        }

        async fn validate(&self, path: &Path) -> Result<ValidationReport, PhaseError> {
            let (delay, fail) = self.outcome(path, StageKind::Validation);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if fail {
                Ok(ValidationReport::invalid("bad magic number"))
            } else {
                Ok(ValidationReport::valid("ok"))
            }
        }

        async fn restore(&self, source: &Path, _target: &Path) -> Result<String, PhaseError> {
            let (delay, fail) = self.outcome(source, StageKind::Restore);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if fail {
                Err(PhaseError::operation("restore", "page checksum mismatch"))
            } else {
                Ok("done".into())
            }
        }

        async fn configure(&self, target: &Path) -> Result<(), PhaseError> {
            // Targets mirror sources: /restored/<n>.fdb <-> /backups/<n>.fbk
            let stem = target.file_stem().unwrap().to_string_lossy();
            let source = PathBuf::from(format!("/backups/{stem}.fbk"));
            let (delay, fail) = self.outcome(&source, StageKind::Finalize);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if fail {
                Err(PhaseError::operation("configure", "isql: connection refused"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_jobs_have_independent_histories() {
        const JOBS: usize = 24;

        let mut delays = HashMap::new();
        let mut failing = HashMap::new();
        {
            let mut rng = rand::rng();
            for i in 0..JOBS {
                let source = PathBuf::from(format!("/backups/db{i}.fbk"));
                delays.insert(
                    source.clone(),
                    [
                        rng.random_range(0..15),
                        rng.random_range(0..30),
                        rng.random_range(0..15),
                    ],
                );
                if rng.random_bool(0.3) {
                    failing.insert(source, StageKind::ALL[rng.random_range(0..3)]);
                }
            }
        }

        let tracker = Arc::new(JobTracker::new());
        let orchestrator = Orchestrator::new(
            Arc::clone(&tracker),
            JitterOperations {
                delays,
                failing: failing.clone(),
            },
        );

        // Readers poll while writers run
        let reader = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                for _ in 0..50 {
                    for job in tracker.list_jobs() {
                        for stage in &job.stages {
                            assert!(stage.progress.is_consistent_with(stage.status));
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        };

        let handles: Vec<_> = (0..JOBS)
            .map(|i| orchestrator.spawn(request(&format!("db{i}"))))
            .collect();

        for (job_id, handle) in handles {
            let report = handle.await.unwrap().unwrap();
            assert_eq!(report.job_id, job_id);
        }
        reader.await.unwrap();

        let jobs = tracker.list_jobs();
        assert_eq!(jobs.len(), JOBS);
        for job in &jobs {
            assert_consistent_history(job);

            let expected_failure = failing.get(&job.source_path).copied();
            match expected_failure {
                Some(kind) => {
                    assert_eq!(job.status, JobStatus::Failed);
                    assert_eq!(job.current_stage(), Some(kind));
                }
                None => assert_eq!(job.status, JobStatus::Complete),
            }
        }

        let snapshot = tracker.snapshot();
        assert!(snapshot.active.is_empty());
        assert_eq!(snapshot.recently_failed.len(), failing.len());
        assert_eq!(snapshot.recently_completed.len(), JOBS - failing.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_sees_every_mutation_in_order() {
        let tracker = Arc::new(JobTracker::new());
        let mut events = tracker.subscribe();
        let orchestrator = Orchestrator::new(
            Arc::clone(&tracker),
            simulated(SimulatedConfig::default()),
        );

        let report = orchestrator.run(request("sales")).await.unwrap();

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.job_id(), report.job_id);
            received.push(event);
        }

        // start + 3 x (create, in_progress, complete) + complete
        assert_eq!(received.len(), 11);
        assert!(matches!(received[0], JobEvent::Started { .. }));
        assert!(matches!(received[10], JobEvent::Completed { .. }));

        let mut last_progress = 0u8;
        let mut last_stages = 0usize;
        for event in &received[1..10] {
            let JobEvent::StageUpdated { stage, job } = event else {
                panic!("unexpected event {event:?}");
            };
            assert_eq!(job.current_stage(), Some(*stage));
            assert!(job.stages.len() >= last_stages);
            let progress = job.overall_progress(3);
            assert!(progress >= last_progress);
            last_stages = job.stages.len();
            last_progress = progress;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_drives_backend_and_retention() {
        let content = r#"
[tracker]
history_limit = 2

[operations.simulated]
validate_ms = 5
restore_ms = 10
configure_ms = 5
fail_phase = "finalize"
fail_message = "isql: permission denied"
fail_sources = ["db1.fbk"]
"#;
        let config = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let tracker = Arc::new(JobTracker::with_config(config.tracker.clone()));
        let operations = Operations::from_config(&config.operations).unwrap();
        let orchestrator = Orchestrator::new(Arc::clone(&tracker), operations);

        let mut aggregator = TrackerStatsAggregator::new();
        let mut reports = Vec::new();
        for i in 0..4 {
            let report = orchestrator.run(request(&format!("db{i}"))).await.unwrap();
            aggregator.update(&tracker.get_job(report.job_id).unwrap());
            reports.push(report);
        }

        assert_eq!(reports[1].status, JobStatus::Failed);
        assert_eq!(reports[1].failed_phase(), Some(StageKind::Finalize));
        assert_eq!(reports[1].error.as_deref(), Some("isql: permission denied"));

        // Only the two most recent finished jobs are retained
        let kept: Vec<_> = tracker.list_jobs().iter().map(|j| j.id).collect();
        assert_eq!(kept, vec![reports[2].job_id, reports[3].job_id]);

        let summary = aggregator.summary();
        assert_eq!(summary.total_jobs, 4);
        assert_eq!(summary.failed_jobs, 1);
        assert_eq!(summary.failures_by_stage.get(&StageKind::Finalize), Some(&1));
    }

    #[tokio::test]
    async fn test_finished_job_rejects_further_updates() {
        let tracker = Arc::new(JobTracker::with_config(TrackerConfig::default()));
        let orchestrator = Orchestrator::new(
            Arc::clone(&tracker),
            simulated(SimulatedConfig {
                validate_ms: 0,
                restore_ms: 0,
                configure_ms: 0,
                ..Default::default()
            }),
        );

        let report = orchestrator.run(request("sales")).await.unwrap();
        assert!(report.is_success());

        assert!(tracker.fail_job(report.job_id, "late failure").is_err());
        assert!(tracker
            .add_step_to_stage(
                report.job_id,
                StageKind::Finalize,
                StageStatus::InProgress,
                "again",
                ""
            )
            .is_err());

        let job = tracker.get_job(report.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job.error.is_none());
    }
}
