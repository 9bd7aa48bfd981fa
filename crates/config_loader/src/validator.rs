//! 配置校验模块
//!
//! 校验规则：
//! - history_limit > 0, event_capacity > 0
//! - max_concurrent_jobs > 0, job_kind 非空
//! - command 后端必须配置三条命令且 program 非空
//! - fail_message 只能与 fail_phase 一起使用

use contracts::{BackendKind, CommandSpec, ConfigError, ServiceConfig};

/// 校验 ServiceConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    validate_tracker(config)?;
    validate_pipeline(config)?;
    validate_command_backend(config)?;
    validate_failure_injection(config)?;
    Ok(())
}

/// 校验 tracker 配置
fn validate_tracker(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.tracker.history_limit == 0 {
        return Err(ConfigError::validation(
            "tracker.history_limit",
            "history_limit must be > 0",
        ));
    }
    if config.tracker.event_capacity == 0 {
        return Err(ConfigError::validation(
            "tracker.event_capacity",
            "event_capacity must be > 0",
        ));
    }
    Ok(())
}

/// 校验 pipeline 配置
fn validate_pipeline(config: &ServiceConfig) -> Result<(), ConfigError> {
    let pipeline = &config.pipeline;

    if pipeline.max_concurrent_jobs == 0 {
        return Err(ConfigError::validation(
            "pipeline.max_concurrent_jobs",
            "max_concurrent_jobs must be > 0",
        ));
    }
    if pipeline.job_kind.trim().is_empty() {
        return Err(ConfigError::validation(
            "pipeline.job_kind",
            "job_kind cannot be empty",
        ));
    }
    Ok(())
}

/// 校验 command 后端
fn validate_command_backend(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.operations.backend != BackendKind::Command {
        return Ok(());
    }

    let command = config.operations.command.as_ref().ok_or_else(|| {
        ConfigError::validation(
            "operations.command",
            "backend 'command' requires an [operations.command] section",
        )
    })?;

    let specs: [(&str, &CommandSpec); 3] = [
        ("validate", &command.validate),
        ("restore", &command.restore),
        ("configure", &command.configure),
    ];
    for (name, spec) in specs {
        if spec.program.trim().is_empty() {
            return Err(ConfigError::validation(
                format!("operations.command.{name}.program"),
                "program cannot be empty",
            ));
        }
    }
    Ok(())
}

/// 校验失败注入配置
fn validate_failure_injection(config: &ServiceConfig) -> Result<(), ConfigError> {
    let simulated = &config.operations.simulated;

    // 没有 fail_phase 时 fail_message / fail_sources 不会生效
    if simulated.fail_phase.is_none()
        && (simulated.fail_message.is_some() || !simulated.fail_sources.is_empty())
    {
        return Err(ConfigError::validation(
            "operations.simulated.fail_phase",
            "fail_message and fail_sources require fail_phase",
        ));
    }
    Ok(())
}
