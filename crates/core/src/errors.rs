use std::path::PathBuf;

use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("容器运行时错误: {0}")]
    RuntimeClient(String),

    #[error("服务未运行: {service}")]
    ServiceNotFound { service: String },

    #[error("日志文件错误: {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("任务未找到: {name}")]
    TaskNotFound { name: String },

    #[error("任务正在运行: {name}")]
    TaskAlreadyRunning { name: String },

    #[error("任务运行记录未找到: {name}#{id}")]
    RunNotFound { name: String, id: u64 },

    #[error("订阅者传输错误: {0}")]
    Transport(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

impl SchedulerError {
    pub fn log_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LogFile {
            path: path.into(),
            source,
        }
    }

    /// 是否属于手动触发时的调度边界错误（任务不存在或正在运行）
    pub fn is_dispatch_rejection(&self) -> bool {
        matches!(
            self,
            SchedulerError::TaskNotFound { .. } | SchedulerError::TaskAlreadyRunning { .. }
        )
    }
}

impl From<config::ConfigError> for SchedulerError {
    fn from(err: config::ConfigError) -> Self {
        SchedulerError::Configuration(err.to_string())
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_rejection_is_distinct() {
        let not_found = SchedulerError::TaskNotFound {
            name: "backup".to_string(),
        };
        let running = SchedulerError::TaskAlreadyRunning {
            name: "backup".to_string(),
        };
        assert!(not_found.is_dispatch_rejection());
        assert!(running.is_dispatch_rejection());
        assert_ne!(not_found.to_string(), running.to_string());
        assert!(!SchedulerError::RuntimeClient("boom".into()).is_dispatch_rejection());
    }

    #[test]
    fn test_log_file_error_mentions_path() {
        let err = SchedulerError::log_file(
            "/var/log/dcron/backup.1.log",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("backup.1.log"));
    }
}
