use std::sync::Arc;

use dcron_core::{
    CommandLine, ContainerRuntime, ContainerSpec, ExecSpec, ExecTaskConfig, OutputStream,
    RunTaskConfig, SchedulerError, SchedulerResult, TaskSpec, UNKNOWN_STATUS,
};
use futures::{future, StreamExt};
use tracing::{debug, warn};

use crate::output::TaskLogger;

/// 容器任务执行器
///
/// 按任务的执行方式选择容器生命周期：
///
/// - Run: 以任务镜像创建新容器，等待退出后收集日志并删除容器
/// - Exec: 在项目中已运行的服务容器内执行命令
pub struct TaskExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    project_name: String,
}

impl TaskExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, project_name: impl Into<String>) -> Self {
        Self {
            runtime,
            project_name: project_name.into(),
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// 执行任务，返回容器命令的退出码
    pub async fn execute(&self, spec: &TaskSpec, output: &mut TaskLogger) -> SchedulerResult<i64> {
        match spec {
            TaskSpec::Run(run) => self.run_container(run, output).await,
            TaskSpec::Exec(exec) => self.exec_in_service(exec, output).await,
        }
    }

    async fn run_container(
        &self,
        run: &RunTaskConfig,
        output: &mut TaskLogger,
    ) -> SchedulerResult<i64> {
        let spec = ContainerSpec {
            image: run.image.clone(),
            command: run.command.to_vec(),
            entrypoint: run.entrypoint.as_ref().map(CommandLine::to_vec),
            binds: self.resolve_binds(&run.volumes),
            network_mode: self.resolve_network(run.network_mode.as_deref()),
        };

        let container_id = self.runtime.create_container(&spec).await?;
        debug!("已创建容器 {} (镜像: {})", container_id, spec.image);

        let result = self.wait_and_collect(&container_id, output).await;

        if let Err(e) = self.runtime.remove_container(&container_id).await {
            warn!("删除容器 {} 失败: {}", container_id, e);
        }

        result
    }

    async fn wait_and_collect(
        &self,
        container_id: &str,
        output: &mut TaskLogger,
    ) -> SchedulerResult<i64> {
        self.runtime.start_container(container_id).await?;
        let status = self.runtime.wait_container(container_id).await?;
        let logs = open_output(self.runtime.container_logs(container_id).await?).await?;
        pipe_output(logs, output).await;
        Ok(status)
    }

    async fn exec_in_service(
        &self,
        exec: &ExecTaskConfig,
        output: &mut TaskLogger,
    ) -> SchedulerResult<i64> {
        let prefix = self.container_prefix(&exec.service);
        let containers = self.runtime.list_running_containers().await?;

        let mut matching = containers.iter().filter(|container| {
            container
                .primary_name()
                .is_some_and(|name| name.starts_with(&prefix))
        });
        let target = matching
            .next()
            .ok_or_else(|| SchedulerError::ServiceNotFound {
                service: exec.service.clone(),
            })?;
        if matching.next().is_some() {
            debug!("服务 {} 有多个运行中的容器，仅在 {} 中执行", exec.service, target.id);
        }

        let exec_spec = ExecSpec {
            command: exec.command.to_vec(),
            user: exec.user.clone(),
        };
        let exec_id = self.runtime.create_exec(&target.id, &exec_spec).await?;
        let stream = open_output(self.runtime.start_exec(&exec_id).await?).await?;
        pipe_output(stream, output).await;

        let status = self
            .runtime
            .inspect_exec(&exec_id)
            .await?
            .unwrap_or(UNKNOWN_STATUS);
        Ok(status)
    }

    /// 卷绑定中不含 `/` 的来源视为逻辑卷名，加上项目前缀
    pub fn resolve_binds(&self, volumes: &[String]) -> Vec<String> {
        volumes
            .iter()
            .map(|volume| {
                let (source, rest) = match volume.split_once(':') {
                    Some((source, rest)) => (source, Some(rest)),
                    None => (volume.as_str(), None),
                };
                if source.contains('/') || self.project_name.is_empty() {
                    return volume.clone();
                }
                match rest {
                    Some(rest) => format!("{}_{}:{}", self.project_name, source, rest),
                    None => format!("{}_{}", self.project_name, source),
                }
            })
            .collect()
    }

    pub fn resolve_network(&self, network_mode: Option<&str>) -> String {
        match network_mode {
            Some(mode) if !mode.is_empty() => mode.to_string(),
            _ if self.project_name.is_empty() => "default".to_string(),
            _ => format!("{}_default", self.project_name),
        }
    }

    fn container_prefix(&self, service: &str) -> String {
        if self.project_name.is_empty() {
            format!("/{service}")
        } else {
            format!("/{}_{}", self.project_name, service)
        }
    }
}

/// 输出流的第一项就是错误时视为请求失败，之后的错误由 [`pipe_output`] 处理
async fn open_output(mut stream: OutputStream) -> SchedulerResult<OutputStream> {
    match stream.next().await {
        Some(Err(e)) => Err(e),
        Some(Ok(chunk)) => Ok(futures::stream::once(future::ready(Ok(chunk)))
            .chain(stream)
            .boxed()),
        None => Ok(stream),
    }
}

/// 将容器输出逐块写入分流器；流错误或写入失败只记录日志并停止复制
async fn pipe_output(mut stream: OutputStream, output: &mut TaskLogger) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                if let Err(e) = output.write_chunk(&chunk) {
                    warn!("写入任务输出失败: {}", e);
                    break;
                }
            }
            Err(e) => {
                warn!("读取容器输出失败: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcron_testing_utils::MockContainerRuntime;

    fn executor(project: &str) -> TaskExecutor {
        TaskExecutor::new(Arc::new(MockContainerRuntime::new()), project)
    }

    #[test]
    fn test_resolve_binds() {
        let executor = executor("shop");
        let binds = executor.resolve_binds(&[
            "data:/data".to_string(),
            "/srv/backup:/backup:ro".to_string(),
            "./relative:/rel".to_string(),
            "cache".to_string(),
        ]);
        assert_eq!(
            binds,
            vec![
                "shop_data:/data",
                "/srv/backup:/backup:ro",
                "./relative:/rel",
                "shop_cache",
            ]
        );
    }

    #[test]
    fn test_resolve_network() {
        let executor = executor("shop");
        assert_eq!(executor.resolve_network(None), "shop_default");
        assert_eq!(executor.resolve_network(Some("")), "shop_default");
        assert_eq!(executor.resolve_network(Some("host")), "host");
    }

    #[test]
    fn test_container_prefix() {
        assert_eq!(executor("shop").container_prefix("web"), "/shop_web");
        assert_eq!(executor("").container_prefix("web"), "/web");
    }
}
