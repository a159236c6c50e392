use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::config::{CommandLine, ExecTaskConfig, RunTaskConfig};

/// 调度引擎为已注册任务分配的关联标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 任务的执行方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskSpec {
    /// 启动一个新容器执行命令，结束后删除容器
    Run(RunTaskConfig),
    /// 在已运行的服务容器中执行命令
    Exec(ExecTaskConfig),
}

impl TaskSpec {
    pub fn schedule(&self) -> &str {
        match self {
            TaskSpec::Run(run) => &run.schedule,
            TaskSpec::Exec(exec) => &exec.schedule,
        }
    }

    pub fn command(&self) -> &CommandLine {
        match self {
            TaskSpec::Run(run) => &run.command,
            TaskSpec::Exec(exec) => &exec.command,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskSpec::Run(_) => "run",
            TaskSpec::Exec(_) => "exec",
        }
    }
}

/// 任务定义
///
/// 加载后不可变；唯一的例外是 `entry_id`，在任务注册到调度引擎时设置一次。
/// 重新加载配置会生成全新的 `Task` 实例，因此关联标识不会跨配置复用。
#[derive(Debug)]
pub struct Task {
    pub name: String,
    pub spec: TaskSpec,
    entry_id: OnceLock<EntryId>,
}

impl Task {
    pub fn new(name: impl Into<String>, spec: TaskSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            entry_id: OnceLock::new(),
        }
    }

    /// 空字符串表示仅支持手动触发
    pub fn schedule(&self) -> &str {
        self.spec.schedule()
    }

    pub fn is_scheduled(&self) -> bool {
        !self.schedule().trim().is_empty()
    }

    pub fn entry_id(&self) -> Option<EntryId> {
        self.entry_id.get().copied()
    }

    /// 记录调度引擎返回的关联标识，已设置过时返回 `false`
    pub fn set_entry_id(&self, id: EntryId) -> bool {
        self.entry_id.set(id).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_spec(schedule: &str) -> TaskSpec {
        TaskSpec::Run(RunTaskConfig {
            schedule: schedule.to_string(),
            image: "alpine".to_string(),
            command: CommandLine::new(["echo", "hi"]),
            ..Default::default()
        })
    }

    #[test]
    fn test_entry_id_set_once() {
        let task = Task::new("backup", run_spec("@daily"));
        assert_eq!(task.entry_id(), None);
        assert!(task.set_entry_id(EntryId(7)));
        assert!(!task.set_entry_id(EntryId(8)));
        assert_eq!(task.entry_id(), Some(EntryId(7)));
    }

    #[test]
    fn test_manual_only_task() {
        let task = Task::new("adhoc", run_spec(""));
        assert!(!task.is_scheduled());
        assert_eq!(task.spec.kind(), "run");
        assert_eq!(task.spec.command().args(), ["echo", "hi"]);
    }
}
