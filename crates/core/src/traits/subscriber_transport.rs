//! 事件订阅者的传输通道

use async_trait::async_trait;

use crate::SchedulerResult;

/// 写入订阅者连接的帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping,
    Close,
}

#[async_trait]
pub trait SubscriberTransport: Send {
    async fn send(&mut self, frame: Frame) -> SchedulerResult<()>;
}
