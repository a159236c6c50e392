use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// 引擎运行配置
///
/// 任务集本身不在这里，由 `tasks_file` 指向的文件单独加载，
/// 以便在不重启进程的情况下重新加载。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Compose 项目名，用于拼接容器、卷和网络名称
    pub project_name: String,
    /// 日志根目录，实际目录为 `<logs_root>/<project_name>`
    pub logs_root: PathBuf,
    pub tasks_file: Option<PathBuf>,
    pub docker: DockerConfig,
    pub hub: HubConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// 形如 `unix:///var/run/docker.sock`，为空时使用 DOCKER_HOST 或本地默认值
    pub socket: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub send_buffer: usize,
    pub ping_interval_seconds: u64,
    pub write_timeout_seconds: u64,
}

impl HubConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_seconds)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub prometheus_address: Option<String>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_seconds: 120,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_buffer: 256,
            ping_interval_seconds: 54,
            write_timeout_seconds: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            logs_root: PathBuf::from("/var/log/dcron"),
            tasks_file: None,
            docker: DockerConfig::default(),
            hub: HubConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置：默认值 → 配置文件（可选）→ `DCRON_` 前缀环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("project_name", defaults.project_name.clone())?
            .set_default("logs_root", defaults.logs_root.to_string_lossy().to_string())?
            .set_default(
                "docker.timeout_seconds",
                defaults.docker.timeout_seconds as i64,
            )?
            .set_default("hub.send_buffer", defaults.hub.send_buffer as i64)?
            .set_default(
                "hub.ping_interval_seconds",
                defaults.hub.ping_interval_seconds as i64,
            )?
            .set_default(
                "hub.write_timeout_seconds",
                defaults.hub.write_timeout_seconds as i64,
            )?
            .set_default("logging.level", defaults.logging.level.clone())?
            .set_default("logging.format", defaults.logging.format.clone())?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("DCRON")
                .prefix_separator("_")
                .separator("__"),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("解析配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty() {
            return Err(anyhow::anyhow!("未指定 Compose 项目名 (project_name)"));
        }
        if self.hub.send_buffer == 0 {
            return Err(anyhow::anyhow!("hub.send_buffer 必须大于0"));
        }
        if self.hub.ping_interval_seconds == 0 {
            return Err(anyhow::anyhow!("hub.ping_interval_seconds 必须大于0"));
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(anyhow::anyhow!("不支持的日志格式: {other}")),
        }
        Ok(())
    }

    /// 本项目的日志目录
    pub fn logs_dir(&self) -> PathBuf {
        self.logs_root.join(&self.project_name)
    }
}
