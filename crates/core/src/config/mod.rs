//! 配置管理
//!
//! - [`AppConfig`]: 引擎运行配置（项目名、日志目录、Docker 连接、订阅中心参数等），
//!   通过 `config` crate 从 TOML 文件和 `DCRON_` 前缀的环境变量加载
//! - [`TasksConfig`]: 任务集定义，支持 TOML / YAML / JSON 文件

pub mod app_config;
pub mod tasks;

pub use app_config::{AppConfig, DockerConfig, HubConfig, LoggingConfig, MetricsConfig};
pub use tasks::{CommandLine, ExecTaskConfig, RunTaskConfig, TasksConfig};
