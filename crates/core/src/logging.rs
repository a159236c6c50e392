//! 日志初始化与结构化日志工具

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// 初始化全局日志系统
///
/// `RUST_LOG` 环境变量优先于配置中的日志级别。
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        other => {
            return Err(anyhow::anyhow!("不支持的日志格式: {other}"));
        }
    }

    Ok(())
}

/// 任务生命周期相关的结构化日志
pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_task_registered(task_name: &str, schedule: &str, entry_id: u64) {
        debug!(
            event = "task_registered",
            task.name = task_name,
            task.schedule = schedule,
            entry.id = entry_id,
            "任务已注册到调度引擎"
        );
    }

    pub fn log_task_started(task_name: &str, run_id: u64, trigger: &str) {
        info!(
            event = "task_started",
            task.name = task_name,
            run.id = run_id,
            run.trigger = trigger,
            "[CRON] ({}) Start",
            task_name
        );
    }

    pub fn log_task_finished(
        task_name: &str,
        run_id: u64,
        status: i64,
        stdout_size: u64,
        stderr_size: u64,
        duration_seconds: f64,
    ) {
        info!(
            event = "task_finished",
            task.name = task_name,
            run.id = run_id,
            run.status = status,
            run.stdout_size = stdout_size,
            run.stderr_size = stderr_size,
            run.duration_seconds = duration_seconds,
            "[CRON] ({}) Status: {}",
            task_name,
            status
        );
    }

    pub fn log_task_crashed(task_name: &str, run_id: u64, error: &dyn std::fmt::Display) {
        error!(
            event = "task_crashed",
            task.name = task_name,
            run.id = run_id,
            error = %error,
            "[CRON] ({}) Error: {}",
            task_name,
            error
        );
    }

    pub fn log_trigger_rejected(task_name: &str, reason: &dyn std::fmt::Display) {
        warn!(
            event = "trigger_rejected",
            task.name = task_name,
            reason = %reason,
            "手动触发被拒绝"
        );
    }

    pub fn log_system_error(component: &str, operation: &str, error: &dyn std::fmt::Display) {
        error!(
            event = "system_error",
            component = component,
            operation = operation,
            error = %error,
            "系统错误"
        );
    }
}
