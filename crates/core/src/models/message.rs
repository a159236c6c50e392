use serde::{Deserialize, Serialize};

use super::TaskInfo;

/// 推送给订阅者的任务生命周期通知
///
/// 序列化为 `{"type": "TaskStarted", "task": {...}}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNotification {
    #[serde(rename = "type")]
    pub event: TaskEvent,
    pub task: TaskInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskStarted,
    TaskFinished,
}

impl TaskNotification {
    pub fn started(task: TaskInfo) -> Self {
        Self {
            event: TaskEvent::TaskStarted,
            task,
        }
    }

    pub fn finished(task: TaskInfo) -> Self {
        Self {
            event: TaskEvent::TaskFinished,
            task,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_shape() {
        let info = TaskInfo {
            name: "backup".to_string(),
            schedule: "@daily".to_string(),
            next: None,
            stats: vec![],
        };
        let json = TaskNotification::started(info).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "TaskStarted");
        assert_eq!(value["task"]["name"], "backup");
        assert!(value["task"]["next"].is_null());
    }
}
