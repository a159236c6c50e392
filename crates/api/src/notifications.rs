//! 任务生命周期通知
//!
//! 任务开始和结束时把任务状态快照序列化为 JSON 并通过广播中心推送。

use dcron_core::{TaskInfo, TaskNotification};
use dcron_dispatcher::TaskManager;
use tracing::warn;

use crate::hub::HubHandle;

/// 在任务管理器上注册开始/结束回调，必须在管理器被共享之前调用
pub fn register_task_notifications(manager: &mut TaskManager, hub: HubHandle) {
    let started_hub = hub.clone();
    manager.on_task_started(move |info| {
        publish(&started_hub, TaskNotification::started(info.clone()));
    });
    manager.on_task_finished(move |info: &TaskInfo| {
        publish(&hub, TaskNotification::finished(info.clone()));
    });
}

fn publish(hub: &HubHandle, notification: TaskNotification) {
    match notification.to_json() {
        Ok(json) => hub.broadcast(json),
        Err(e) => warn!("序列化任务 {} 的通知失败: {}", notification.task.name, e),
    }
}
