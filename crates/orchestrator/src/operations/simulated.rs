//! 模拟 phase 后端
//!
//! 不调用真实的 gbak / isql，按配置睡眠固定时长，并支持注入失败场景。

use std::path::Path;
use std::time::Duration;

use contracts::{PhaseError, PhaseOperations, SimulatedConfig, StageKind, ValidationReport};
use tracing::instrument;

/// 模拟后端
#[derive(Debug, Clone, Default)]
pub struct SimulatedOperations {
    /// 配置（耗时与失败注入）
    config: SimulatedConfig,
}

impl SimulatedOperations {
    /// 使用默认配置创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用配置创建
    pub fn with_config(config: SimulatedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatedConfig {
        &self.config
    }

    /// 该 phase 对该备份文件是否应失败
    fn should_fail(&self, phase: StageKind, path: &Path) -> bool {
        if self.config.fail_phase != Some(phase) {
            return false;
        }
        if self.config.fail_sources.is_empty() {
            return true;
        }

        // 按文件名主干匹配，finalize 阶段只拿得到目标库路径
        let stem = path_stem(path);
        stem.is_some()
            && self
                .config
                .fail_sources
                .iter()
                .any(|listed| path_stem(Path::new(listed)) == stem)
    }

    fn failure_text(&self, phase: StageKind) -> String {
        self.config
            .fail_message
            .clone()
            .unwrap_or_else(|| format!("simulated {phase} failure"))
    }
}

fn path_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

impl PhaseOperations for SimulatedOperations {
    fn name(&self) -> &str {
        "simulated"
    }

    #[instrument(name = "simulated_validate", skip(self), fields(path = %path.display()))]
    async fn validate(&self, path: &Path) -> Result<ValidationReport, PhaseError> {
        tokio::time::sleep(Duration::from_millis(self.config.validate_ms)).await;

        if self.should_fail(StageKind::Validation, path) {
            return Err(PhaseError::validation(self.failure_text(StageKind::Validation)));
        }
        Ok(ValidationReport::valid(format!(
            "{} is a valid backup",
            path.display()
        )))
    }

    #[instrument(
        name = "simulated_restore",
        skip(self),
        fields(source = %source.display(), target = %target.display())
    )]
    async fn restore(&self, source: &Path, target: &Path) -> Result<String, PhaseError> {
        tokio::time::sleep(Duration::from_millis(self.config.restore_ms)).await;

        if self.should_fail(StageKind::Restore, source) {
            return Err(PhaseError::operation(
                "restore",
                self.failure_text(StageKind::Restore),
            ));
        }
        Ok(format!("restored {} -> {}", source.display(), target.display()))
    }

    #[instrument(name = "simulated_configure", skip(self), fields(target = %target.display()))]
    async fn configure(&self, target: &Path) -> Result<(), PhaseError> {
        tokio::time::sleep(Duration::from_millis(self.config.configure_ms)).await;

        if self.should_fail(StageKind::Finalize, target) {
            return Err(PhaseError::operation(
                "configure",
                self.failure_text(StageKind::Finalize),
            ));
        }
        Ok(())
    }
}
