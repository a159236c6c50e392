//! 任务运行历史
//!
//! 每个任务一条只追加的运行记录序列，整张表由一把读写锁保护。
//! 运行ID按任务从1开始连续递增，不会复用。

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use dcron_core::{RunOutcome, SchedulerError, SchedulerResult, TaskStats};

#[derive(Debug, Default)]
pub struct TaskStatsStore {
    runs: RwLock<HashMap<String, Vec<TaskStats>>>,
}

impl TaskStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条运行中的记录，返回其副本
    pub async fn allocate(&self, task_name: &str) -> TaskStats {
        let mut runs = self.runs.write().await;
        push_record(runs.entry(task_name.to_string()).or_default())
    }

    /// 任务最近一次运行尚未结束时拒绝分配
    ///
    /// 检查与追加在同一把写锁内完成。
    pub async fn try_allocate(&self, task_name: &str) -> SchedulerResult<TaskStats> {
        let mut runs = self.runs.write().await;
        let records = runs.entry(task_name.to_string()).or_default();
        if records.last().is_some_and(TaskStats::is_running) {
            return Err(SchedulerError::TaskAlreadyRunning {
                name: task_name.to_string(),
            });
        }
        Ok(push_record(records))
    }

    /// 写入运行结果并清除运行标记；记录不存在或已结束时返回 `false`
    pub async fn finalize(&self, task_name: &str, run_id: u64, outcome: &RunOutcome) -> bool {
        let mut runs = self.runs.write().await;
        let Some(record) = runs
            .get_mut(task_name)
            .and_then(|records| records.iter_mut().rev().find(|r| r.id == run_id))
        else {
            return false;
        };
        if !record.running {
            return false;
        }

        match outcome.status {
            Some(status) => record.status = status,
            None => record.crashed = true,
        }
        record.stdout_size = outcome.stdout_size;
        record.stderr_size = outcome.stderr_size;
        record.running = false;
        true
    }

    pub async fn is_running(&self, task_name: &str) -> bool {
        self.runs
            .read()
            .await
            .get(task_name)
            .and_then(|records| records.last())
            .is_some_and(TaskStats::is_running)
    }

    pub async fn get(&self, task_name: &str, run_id: u64) -> Option<TaskStats> {
        self.runs
            .read()
            .await
            .get(task_name)
            .and_then(|records| records.iter().find(|r| r.id == run_id))
            .cloned()
    }

    /// 任务运行历史的副本
    pub async fn snapshot(&self, task_name: &str) -> Vec<TaskStats> {
        self.runs
            .read()
            .await
            .get(task_name)
            .cloned()
            .unwrap_or_default()
    }
}

fn push_record(records: &mut Vec<TaskStats>) -> TaskStats {
    let id = records.last().map_or(1, |last| last.id + 1);
    let stats = TaskStats::new(id, Utc::now());
    records.push(stats.clone());
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcron_core::UNKNOWN_STATUS;

    #[tokio::test]
    async fn test_ids_start_at_one() {
        let store = TaskStatsStore::new();
        assert_eq!(store.allocate("backup").await.id, 1);
        assert_eq!(store.allocate("backup").await.id, 2);
        assert_eq!(store.allocate("cleanup").await.id, 1);
    }

    #[tokio::test]
    async fn test_try_allocate_rejects_running() {
        let store = TaskStatsStore::new();
        let first = store.try_allocate("backup").await.unwrap();

        let second = store.try_allocate("backup").await;
        assert!(matches!(
            second,
            Err(SchedulerError::TaskAlreadyRunning { .. })
        ));

        assert!(store.finalize("backup", first.id, &RunOutcome::exited(0, 0, 0)).await);
        assert_eq!(store.try_allocate("backup").await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_finalize_exited_and_crashed() {
        let store = TaskStatsStore::new();
        let ok = store.allocate("backup").await;
        let crashed = store.allocate("backup").await;

        assert!(store.finalize("backup", ok.id, &RunOutcome::exited(0, 3, 1)).await);
        assert!(store.finalize("backup", crashed.id, &RunOutcome::crashed(0, 20)).await);
        // 每条记录只结束一次
        assert!(!store.finalize("backup", ok.id, &RunOutcome::exited(9, 0, 0)).await);
        assert!(!store.finalize("missing", 1, &RunOutcome::exited(0, 0, 0)).await);

        let runs = store.snapshot("backup").await;
        assert!(runs[0].is_success());
        assert_eq!((runs[0].stdout_size, runs[0].stderr_size), (3, 1));
        assert!(runs[1].crashed);
        assert!(!runs[1].running);
        assert_eq!(runs[1].status, UNKNOWN_STATUS);
        assert_eq!(runs[1].stderr_size, 20);
    }

    #[tokio::test]
    async fn test_is_running_follows_latest_record() {
        let store = TaskStatsStore::new();
        assert!(!store.is_running("backup").await);

        let run = store.allocate("backup").await;
        assert!(store.is_running("backup").await);

        store
            .finalize("backup", run.id, &RunOutcome::exited(1, 0, 0))
            .await;
        assert!(!store.is_running("backup").await);
        assert_eq!(store.get("backup", 1).await.unwrap().status, 1);
        assert!(store.get("backup", 2).await.is_none());
    }
}
