//! 运行指标
//!
//! 使用 `metrics` 门面记录；未安装导出器时所有调用均为空操作。

pub const TASK_RUNS_TOTAL: &str = "dcron_task_runs_total";
pub const TASK_RUN_DURATION_SECONDS: &str = "dcron_task_run_duration_seconds";
pub const TASK_TRIGGERS_REJECTED_TOTAL: &str = "dcron_task_triggers_rejected_total";
pub const HUB_SUBSCRIBERS: &str = "dcron_hub_subscribers";
pub const HUB_DROPPED_SUBSCRIBERS_TOTAL: &str = "dcron_hub_dropped_subscribers_total";

pub fn record_task_run(task_name: &str, outcome: &'static str, duration_seconds: f64) {
    ::metrics::counter!(
        TASK_RUNS_TOTAL,
        "task" => task_name.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!(TASK_RUN_DURATION_SECONDS, "task" => task_name.to_string())
        .record(duration_seconds);
}

pub fn record_trigger_rejected(task_name: &str) {
    ::metrics::counter!(TASK_TRIGGERS_REJECTED_TOTAL, "task" => task_name.to_string())
        .increment(1);
}

pub fn set_hub_subscribers(count: usize) {
    ::metrics::gauge!(HUB_SUBSCRIBERS).set(count as f64);
}

pub fn record_hub_subscriber_dropped() {
    ::metrics::counter!(HUB_DROPPED_SUBSCRIBERS_TOTAL).increment(1);
}
