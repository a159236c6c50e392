//! 基于 bollard 的 Docker 运行时

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::HostConfig;
use bollard::Docker;
use dcron_core::{
    ContainerRuntime, ContainerSpec, ContainerSummary, DockerConfig, ExecSpec, OutputChunk,
    OutputStream, SchedulerError, SchedulerResult,
};
use futures::{future, StreamExt};
use tracing::{debug, info};

fn runtime_error(err: bollard::errors::Error) -> SchedulerError {
    SchedulerError::RuntimeClient(err.to_string())
}

fn into_chunk(output: LogOutput) -> Option<OutputChunk> {
    match output {
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            Some(OutputChunk::Stdout(message.to_vec()))
        }
        LogOutput::StdErr { message } => Some(OutputChunk::Stderr(message.to_vec())),
        LogOutput::StdIn { .. } => None,
    }
}

/// 不强制删除，仍在运行的容器会删除失败并保留
fn remove_options() -> RemoveContainerOptions {
    RemoveContainerOptions {
        force: false,
        ..Default::default()
    }
}

fn demux<S>(stream: S) -> OutputStream
where
    S: futures::Stream<Item = Result<LogOutput, bollard::errors::Error>> + Send + 'static,
{
    stream
        .filter_map(|item| {
            future::ready(match item {
                Ok(output) => into_chunk(output).map(Ok),
                Err(e) => Some(Err(runtime_error(e))),
            })
        })
        .boxed()
}

/// Docker Engine API 客户端
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// 连接 Docker 守护进程
    ///
    /// 未配置 socket 时使用本地默认连接（遵循 `DOCKER_HOST`）。
    pub fn connect(config: &DockerConfig) -> SchedulerResult<Self> {
        let docker = match &config.socket {
            Some(socket) => Docker::connect_with_socket(
                socket,
                config.timeout_seconds,
                bollard::API_DEFAULT_VERSION,
            ),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(runtime_error)?
        .with_timeout(Duration::from_secs(config.timeout_seconds));

        info!(
            "已创建Docker客户端 (socket: {})",
            config.socket.as_deref().unwrap_or("本地默认")
        );
        Ok(Self { docker })
    }

    pub async fn ping(&self) -> SchedulerResult<()> {
        self.docker.ping().await.map_err(runtime_error)?;
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> SchedulerResult<String> {
        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            entrypoint: spec.entrypoint.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            host_config: Some(HostConfig {
                binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
                network_mode: Some(spec.network_mode.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(runtime_error)?;
        for warning in &response.warnings {
            debug!("创建容器警告: {}", warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> SchedulerResult<()> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(runtime_error)
    }

    async fn wait_container(&self, container_id: &str) -> SchedulerResult<i64> {
        let mut stream = self
            .docker
            .wait_container(container_id, None::<WaitContainerOptions<String>>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // 非零退出码以错误形式返回
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(runtime_error(e)),
            None => Err(SchedulerError::RuntimeClient(format!(
                "等待容器 {container_id} 退出时连接已关闭"
            ))),
        }
    }

    async fn container_logs(&self, container_id: &str) -> SchedulerResult<OutputStream> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        Ok(demux(self.docker.logs(container_id, Some(options))))
    }

    async fn remove_container(&self, container_id: &str) -> SchedulerResult<()> {
        self.docker
            .remove_container(container_id, Some(remove_options()))
            .await
            .map_err(runtime_error)
    }

    async fn list_running_containers(&self) -> SchedulerResult<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);
        let options = ListContainersOptions::<String> {
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(runtime_error)?;

        Ok(containers
            .into_iter()
            .map(|container| ContainerSummary {
                id: container.id.unwrap_or_default(),
                names: container.names.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_exec(&self, container_id: &str, spec: &ExecSpec) -> SchedulerResult<String> {
        let options = CreateExecOptions::<String> {
            cmd: Some(spec.command.clone()),
            user: spec.user.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };

        let created = self
            .docker
            .create_exec(container_id, options)
            .await
            .map_err(runtime_error)?;
        Ok(created.id)
    }

    async fn start_exec(&self, exec_id: &str) -> SchedulerResult<OutputStream> {
        match self
            .docker
            .start_exec(exec_id, None)
            .await
            .map_err(runtime_error)?
        {
            StartExecResults::Attached { output, .. } => Ok(demux(output)),
            StartExecResults::Detached => Err(SchedulerError::RuntimeClient(format!(
                "exec {exec_id} 以分离模式启动，无法获取输出"
            ))),
        }
    }

    async fn inspect_exec(&self, exec_id: &str) -> SchedulerResult<Option<i64>> {
        let inspect = self
            .docker
            .inspect_exec(exec_id)
            .await
            .map_err(runtime_error)?;
        Ok(inspect.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_is_not_forced() {
        let options = remove_options();
        assert!(!options.force);
        assert!(!options.v);
    }

    #[test]
    fn test_into_chunk_keeps_stream_origin() {
        assert_eq!(
            into_chunk(LogOutput::StdOut {
                message: b"out".to_vec().into()
            }),
            Some(OutputChunk::Stdout(b"out".to_vec()))
        );
        assert_eq!(
            into_chunk(LogOutput::StdErr {
                message: b"err".to_vec().into()
            }),
            Some(OutputChunk::Stderr(b"err".to_vec()))
        );
        assert_eq!(
            into_chunk(LogOutput::StdIn {
                message: b"in".to_vec().into()
            }),
            None
        );
    }
}
