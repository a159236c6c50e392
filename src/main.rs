use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dcron_api::{register_task_notifications, Hub, HubSettings};
use dcron_core::{init_logging, AppConfig, TasksConfig};
use dcron_dispatcher::TaskManager;
use dcron_worker::DockerRuntime;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{error, info, warn};

/// 容器化定时任务调度系统
#[derive(Debug, Parser)]
#[command(name = "dcron", version, about = "容器化定时任务调度系统")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 任务集文件路径，覆盖配置中的 tasks_file
    #[arg(short = 'f', long, value_name = "FILE")]
    tasks: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            args.config.as_deref().unwrap_or("<默认配置>")
        )
    })?;
    init_logging(&config.logging)?;

    info!("启动容器化定时任务调度系统");
    info!("Compose 项目: {}", config.project_name);

    if let Some(address) = &config.metrics.prometheus_address {
        let address = address
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("无效的指标监听地址: {address}"))?;
        PrometheusBuilder::new()
            .with_http_listener(address)
            .install()
            .context("启动Prometheus指标导出失败")?;
        info!("Prometheus指标监听于 {}", address);
    }

    let tasks_file = args
        .tasks
        .or_else(|| config.tasks_file.clone())
        .context("未指定任务集文件，请使用 --tasks 或配置 tasks_file")?;

    let runtime = DockerRuntime::connect(&config.docker).context("连接Docker失败")?;
    if let Err(e) = runtime.ping().await {
        warn!("Docker守护进程暂不可用: {}", e);
    }

    let mut manager = TaskManager::new(Arc::new(runtime), &config.project_name, config.logs_dir())
        .context("创建任务管理器失败")?;
    let hub = Hub::spawn(HubSettings::from(&config.hub));
    register_task_notifications(&mut manager, hub.clone());
    let manager = Arc::new(manager);

    let tasks = load_tasks(&tasks_file)?;
    manager
        .load_config(&tasks)
        .await
        .context("加载任务集失败")?;
    manager.start().await.context("启动任务调度失败")?;

    loop {
        match wait_for_signal().await? {
            Signal::Reload => {
                info!("收到SIGHUP信号，重新加载任务集: {}", tasks_file.display());
                match load_tasks(&tasks_file) {
                    Ok(tasks) => {
                        if let Err(e) = manager.reload(&tasks).await {
                            error!("重新加载任务集失败: {}", e);
                        }
                    }
                    Err(e) => error!("{:#}", e),
                }
            }
            Signal::Shutdown => break,
        }
    }

    info!("收到关闭信号，停止任务调度");
    manager.stop().await;
    info!("容器化定时任务调度系统已退出");
    Ok(())
}

fn load_tasks(path: &Path) -> Result<TasksConfig> {
    TasksConfig::from_file(path).with_context(|| format!("读取任务集文件失败: {}", path.display()))
}

enum Signal {
    Reload,
    Shutdown,
}

/// 等待关闭或重新加载信号
#[cfg(unix)]
async fn wait_for_signal() -> Result<Signal> {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let mut terminate =
        unix_signal(SignalKind::terminate()).context("安装SIGTERM信号处理器失败")?;
    let mut hangup = unix_signal(SignalKind::hangup()).context("安装SIGHUP信号处理器失败")?;

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("安装Ctrl+C信号处理器失败")?;
            info!("收到Ctrl+C信号");
            Ok(Signal::Shutdown)
        }
        _ = terminate.recv() => {
            info!("收到SIGTERM信号");
            Ok(Signal::Shutdown)
        }
        _ = hangup.recv() => Ok(Signal::Reload),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<Signal> {
    signal::ctrl_c().await.context("安装Ctrl+C信号处理器失败")?;
    info!("收到Ctrl+C信号");
    Ok(Signal::Shutdown)
}
