//! # dcron-dispatcher
//!
//! 任务调度与执行引擎：定时表达式解析、定时触发循环、运行历史和任务管理器。

pub mod cron_engine;
pub mod cron_utils;
pub mod run_history;
pub mod task_manager;

pub use cron_engine::{CronEngine, CronJob};
pub use cron_utils::CronScheduler;
pub use run_history::TaskStatsStore;
pub use task_manager::{TaskListener, TaskManager};
