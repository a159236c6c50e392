//! 容器运行时接口
//!
//! 对容器引擎控制面的最小抽象，覆盖两种任务执行方式所需的操作：
//!
//! - 新容器：创建、启动、等待退出、获取日志、删除
//! - 已运行容器：按状态列出容器、创建 exec、以附加模式启动 exec、查询 exec 退出码
//!
//! 日志与 exec 输出以已分离的 stdout/stderr 数据块流的形式返回。

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::SchedulerResult;

/// 输出数据块，已按来源流区分
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

impl OutputChunk {
    pub fn bytes(&self) -> &[u8] {
        match self {
            OutputChunk::Stdout(bytes) | OutputChunk::Stderr(bytes) => bytes,
        }
    }
}

/// 容器输出流
pub type OutputStream = BoxStream<'static, SchedulerResult<OutputChunk>>;

/// 创建新容器所需的参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub command: Vec<String>,
    pub entrypoint: Option<Vec<String>>,
    pub binds: Vec<String>,
    pub network_mode: String,
}

/// 在已运行容器中执行命令所需的参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecSpec {
    pub command: Vec<String>,
    pub user: Option<String>,
}

/// 运行中容器的摘要信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    /// 容器名称，Docker 返回的名称带有 `/` 前缀
    pub names: Vec<String>,
}

impl ContainerSummary {
    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// 创建容器，返回容器ID
    async fn create_container(&self, spec: &ContainerSpec) -> SchedulerResult<String>;

    async fn start_container(&self, container_id: &str) -> SchedulerResult<()>;

    /// 阻塞等待容器退出，返回退出码
    async fn wait_container(&self, container_id: &str) -> SchedulerResult<i64>;

    /// 获取容器的 stdout/stderr 日志
    async fn container_logs(&self, container_id: &str) -> SchedulerResult<OutputStream>;

    async fn remove_container(&self, container_id: &str) -> SchedulerResult<()>;

    /// 列出所有运行中的容器
    async fn list_running_containers(&self) -> SchedulerResult<Vec<ContainerSummary>>;

    /// 在容器中创建 exec 会话，返回 exec ID
    async fn create_exec(&self, container_id: &str, spec: &ExecSpec) -> SchedulerResult<String>;

    /// 附加并启动 exec 会话，返回其输出流
    async fn start_exec(&self, exec_id: &str) -> SchedulerResult<OutputStream>;

    /// 查询 exec 会话的退出码，尚未退出时返回 `None`
    async fn inspect_exec(&self, exec_id: &str) -> SchedulerResult<Option<i64>>;
}
