//! # dcron-worker
//!
//! 任务在容器中的执行方式：
//!
//! - [`executors::TaskExecutor`]: Run / Exec 两种容器生命周期
//! - [`docker::DockerRuntime`]: 基于 bollard 的容器运行时实现
//! - [`output::TaskLogger`]: 运行输出分流（日志文件 + 调度进程自身输出）

pub mod docker;
pub mod executors;
pub mod output;

pub use docker::DockerRuntime;
pub use executors::TaskExecutor;
pub use output::{StreamKind, StreamLogger, TaskLogger};
