use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 退出码未知（尚未结束或执行崩溃）
pub const UNKNOWN_STATUS: i64 = -1;

/// 任务的一次运行记录
///
/// 分配时处于 `running = true, status = -1` 状态，运行结束时恰好更新一次。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    /// 同一任务内从1开始严格递增
    pub id: u64,
    pub start_time: DateTime<Utc>,
    pub running: bool,
    pub crashed: bool,
    pub status: i64,
    pub stdout_size: u64,
    pub stderr_size: u64,
}

impl TaskStats {
    pub fn new(id: u64, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            start_time,
            running: true,
            crashed: false,
            status: UNKNOWN_STATUS,
            stdout_size: 0,
            stderr_size: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_success(&self) -> bool {
        !self.running && !self.crashed && self.status == 0
    }
}

/// 运行结束时写入记录的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// `None` 表示执行出错（崩溃）
    pub status: Option<i64>,
    pub stdout_size: u64,
    pub stderr_size: u64,
}

impl RunOutcome {
    pub fn exited(status: i64, stdout_size: u64, stderr_size: u64) -> Self {
        Self {
            status: Some(status),
            stdout_size,
            stderr_size,
        }
    }

    pub fn crashed(stdout_size: u64, stderr_size: u64) -> Self {
        Self {
            status: None,
            stdout_size,
            stderr_size,
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match self.status {
            None => "crashed",
            Some(0) => "success",
            Some(_) => "failed",
        }
    }
}

/// 任务状态快照：定义、下次触发时间和完整运行历史
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    pub schedule: String,
    pub next: Option<DateTime<Utc>>,
    pub stats: Vec<TaskStats>,
}

impl TaskInfo {
    pub fn last_run(&self) -> Option<&TaskStats> {
        self.stats.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_running() {
        let stats = TaskStats::new(1, Utc::now());
        assert!(stats.is_running());
        assert!(!stats.crashed);
        assert_eq!(stats.status, UNKNOWN_STATUS);
        assert!(!stats.is_success());
    }

    #[test]
    fn test_serialized_field_names() {
        let stats = TaskStats::new(3, Utc::now());
        let value = serde_json::to_value(&stats).unwrap();
        for key in [
            "id",
            "start_time",
            "running",
            "crashed",
            "status",
            "stdout_size",
            "stderr_size",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["status"], -1);
    }

    #[test]
    fn test_outcome_label() {
        assert_eq!(RunOutcome::exited(0, 3, 0).outcome_label(), "success");
        assert_eq!(RunOutcome::exited(2, 0, 0).outcome_label(), "failed");
        assert_eq!(RunOutcome::crashed(0, 10).outcome_label(), "crashed");
    }
}
