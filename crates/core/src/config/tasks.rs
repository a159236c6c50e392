//! 任务集配置
//!
//! 任务按执行方式分为两张表：`run` 表中的任务每次启动一个新容器，
//! `exec` 表中的任务在已运行的服务容器内执行命令。
//!
//! ```toml
//! [run.backup]
//! schedule = "@daily"
//! image = "alpine"
//! command = ["echo", "hi"]
//! volumes = ["data:/data", "/srv/backup:/backup"]
//!
//! [exec.cleanup]
//! schedule = "*/15 * * * *"
//! service = "web"
//! command = "rm -rf /tmp/cache"
//! user = "www-data"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};

use crate::errors::{SchedulerError, SchedulerResult};

/// 命令行参数列表
///
/// 配置中既可以写成单个字符串（作为一个参数，不做拆分），也可以写成字符串数组。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CommandRepr", into = "Vec<String>")]
pub struct CommandLine(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandRepr {
    Single(String),
    List(Vec<String>),
}

impl From<CommandRepr> for CommandLine {
    fn from(repr: CommandRepr) -> Self {
        match repr {
            CommandRepr::Single(cmd) => CommandLine(vec![cmd]),
            CommandRepr::List(args) => CommandLine(args),
        }
    }
}

impl From<CommandLine> for Vec<String> {
    fn from(cmd: CommandLine) -> Self {
        cmd.0
    }
}

impl CommandLine {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine(args.into_iter().map(Into::into).collect())
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// 启动新容器执行的任务
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTaskConfig {
    #[serde(default)]
    pub schedule: String,
    pub command: CommandLine,
    pub image: String,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub network_mode: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<CommandLine>,
}

/// 在已运行的服务容器中执行的任务
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecTaskConfig {
    #[serde(default)]
    pub schedule: String,
    pub command: CommandLine,
    pub service: String,
    #[serde(default)]
    pub user: Option<String>,
}

/// 完整的任务集
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default)]
    pub run: BTreeMap<String, RunTaskConfig>,
    #[serde(default)]
    pub exec: BTreeMap<String, ExecTaskConfig>,
}

impl TasksConfig {
    /// 从文件加载任务集，格式由扩展名决定（toml / yaml / json）
    pub fn from_file(path: impl AsRef<Path>) -> SchedulerResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SchedulerError::Configuration(format!(
                "任务配置文件不存在: {}",
                path.display()
            )));
        }

        let tasks: TasksConfig = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        tasks.validate()?;
        Ok(tasks)
    }

    /// 结构校验：名称唯一、镜像/服务与命令非空
    ///
    /// 调度表达式的语法由调度器在加载时校验。
    pub fn validate(&self) -> SchedulerResult<()> {
        let mut seen = BTreeSet::new();

        for (name, task) in &self.run {
            validate_name(name, &mut seen)?;
            if task.image.trim().is_empty() {
                return Err(SchedulerError::Configuration(format!(
                    "任务 {name} 缺少镜像名称"
                )));
            }
            if task.command.is_empty() {
                return Err(SchedulerError::Configuration(format!(
                    "任务 {name} 缺少执行命令"
                )));
            }
        }

        for (name, task) in &self.exec {
            validate_name(name, &mut seen)?;
            if task.service.trim().is_empty() {
                return Err(SchedulerError::Configuration(format!(
                    "任务 {name} 缺少目标服务名称"
                )));
            }
            if task.command.is_empty() {
                return Err(SchedulerError::Configuration(format!(
                    "任务 {name} 缺少执行命令"
                )));
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.run.len() + self.exec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.run.is_empty() && self.exec.is_empty()
    }

    /// 所有任务的 (名称, 调度表达式)
    pub fn schedules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.run
            .iter()
            .map(|(name, task)| (name.as_str(), task.schedule.as_str()))
            .chain(
                self.exec
                    .iter()
                    .map(|(name, task)| (name.as_str(), task.schedule.as_str())),
            )
    }
}

fn validate_name(name: &str, seen: &mut BTreeSet<String>) -> SchedulerResult<()> {
    if name.trim().is_empty() {
        return Err(SchedulerError::Configuration("任务名称不能为空".to_string()));
    }
    // 任务名用于拼接日志文件名
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(SchedulerError::Configuration(format!(
            "任务名称包含非法字符: {name}"
        )));
    }
    if !seen.insert(name.to_string()) {
        return Err(SchedulerError::Configuration(format!(
            "任务名称重复: {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_command_accepts_string_or_list() {
        let file = write_temp(
            ".toml",
            r#"
[run.backup]
schedule = "@daily"
image = "alpine"
command = ["echo", "hi"]

[exec.cleanup]
service = "web"
command = "rm -rf /tmp/cache"
user = "www-data"
"#,
        );

        let tasks = TasksConfig::from_file(file.path()).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks.run["backup"].command.args(), ["echo", "hi"]);
        // 单个字符串不拆分
        assert_eq!(tasks.exec["cleanup"].command.args(), ["rm -rf /tmp/cache"]);
        assert_eq!(tasks.exec["cleanup"].user.as_deref(), Some("www-data"));
        assert_eq!(tasks.exec["cleanup"].schedule, "");
    }

    #[test]
    fn test_yaml_task_set() {
        let file = write_temp(
            ".yaml",
            r#"
run:
  backup:
    schedule: "@every 1h"
    image: alpine
    command: echo hi
    entrypoint: ["/bin/sh", "-c"]
    volumes: ["data:/data"]
    network_mode: host
"#,
        );

        let tasks = TasksConfig::from_file(file.path()).unwrap();
        let backup = &tasks.run["backup"];
        assert_eq!(backup.entrypoint.as_ref().unwrap().args(), ["/bin/sh", "-c"]);
        assert_eq!(backup.volumes, vec!["data:/data".to_string()]);
        assert_eq!(backup.network_mode.as_deref(), Some("host"));
        assert!(tasks.exec.is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut tasks = TasksConfig::default();
        tasks.run.insert(
            "backup".to_string(),
            RunTaskConfig {
                image: "alpine".to_string(),
                command: CommandLine::new(["true"]),
                ..Default::default()
            },
        );
        tasks.exec.insert(
            "backup".to_string(),
            ExecTaskConfig {
                service: "web".to_string(),
                command: CommandLine::new(["true"]),
                ..Default::default()
            },
        );

        let err = tasks.validate().unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(msg) if msg.contains("重复")));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut tasks = TasksConfig::default();
        tasks.run.insert(
            "backup".to_string(),
            RunTaskConfig {
                image: "alpine".to_string(),
                ..Default::default()
            },
        );
        assert!(tasks.validate().is_err());

        let mut tasks = TasksConfig::default();
        tasks.exec.insert(
            "cleanup".to_string(),
            ExecTaskConfig {
                command: CommandLine::new(["true"]),
                ..Default::default()
            },
        );
        assert!(tasks.validate().is_err());

        let mut tasks = TasksConfig::default();
        tasks.run.insert(
            "../escape".to_string(),
            RunTaskConfig {
                image: "alpine".to_string(),
                command: CommandLine::new(["true"]),
                ..Default::default()
            },
        );
        assert!(tasks.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = TasksConfig::from_file("/nonexistent/tasks.toml").unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));
    }
}
