//! # 数据模型
//!
//! - [`Task`] / [`TaskSpec`]: 任务定义及其执行方式（Run / Exec）
//! - [`TaskStats`]: 任务的一次运行记录
//! - [`TaskInfo`]: 任务状态快照，供查询接口和通知消息使用
//! - [`TaskNotification`]: 推送给订阅者的生命周期通知
//!
//! 所有时间字段使用 `DateTime<Utc>`。

pub mod message;
pub mod task;
pub mod task_run;

pub use message::*;
pub use task::*;
pub use task_run::*;
