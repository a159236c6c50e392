//! 事件广播中心
//!
//! 订阅者集合只由一个后台任务持有，注册、注销和广播都通过同一条有序的
//! 命令通道送达。每个订阅者拥有一个有界发送缓冲区，广播时缓冲区已满或已关闭
//! 的订阅者会被直接移除，广播本身从不阻塞。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dcron_core::metrics::{record_hub_subscriber_dropped, set_hub_subscribers};
use dcron_core::{Frame, HubConfig, SubscriberTransport};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, info, warn};

pub type SubscriberId = u64;

type Message = Arc<str>;

/// 广播中心的运行参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    pub send_buffer: usize,
    pub ping_interval: Duration,
    pub write_timeout: Duration,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            send_buffer: 256,
            ping_interval: Duration::from_secs(54),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&HubConfig> for HubSettings {
    fn from(config: &HubConfig) -> Self {
        Self {
            send_buffer: config.send_buffer.max(1),
            ping_interval: config.ping_interval(),
            write_timeout: config.write_timeout(),
        }
    }
}

enum HubCommand {
    Register {
        id: SubscriberId,
        sender: mpsc::Sender<Message>,
    },
    Unregister(SubscriberId),
    Broadcast(Message),
    Count(oneshot::Sender<usize>),
}

pub struct Hub {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Message>>,
    commands: mpsc::UnboundedReceiver<HubCommand>,
}

impl Hub {
    /// 启动广播中心，所有句柄被丢弃后后台任务自动退出
    pub fn spawn(settings: HubSettings) -> HubHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Hub {
            subscribers: HashMap::new(),
            commands: rx,
        };
        tokio::spawn(hub.run());

        HubHandle {
            commands: tx,
            next_id: Arc::new(AtomicU64::new(1)),
            settings,
        }
    }

    async fn run(mut self) {
        info!("事件广播中心已启动");
        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Register { id, sender } => {
                    self.subscribers.insert(id, sender);
                    debug!("订阅者 {} 已注册", id);
                    set_hub_subscribers(self.subscribers.len());
                }
                HubCommand::Unregister(id) => {
                    if self.subscribers.remove(&id).is_some() {
                        debug!("订阅者 {} 已注销", id);
                        set_hub_subscribers(self.subscribers.len());
                    }
                }
                HubCommand::Broadcast(message) => self.broadcast(message),
                HubCommand::Count(reply) => {
                    let _ = reply.send(self.subscribers.len());
                }
            }
        }
        info!("事件广播中心已停止");
    }

    fn broadcast(&mut self, message: Message) {
        let before = self.subscribers.len();
        self.subscribers
            .retain(|id, sender| match sender.try_send(message.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!("订阅者 {} 发送缓冲区已满，断开连接", id);
                    record_hub_subscriber_dropped();
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });
        if self.subscribers.len() != before {
            set_hub_subscribers(self.subscribers.len());
        }
    }
}

#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
    next_id: Arc<AtomicU64>,
    settings: HubSettings,
}

impl HubHandle {
    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    /// 注册新的订阅者
    pub fn subscribe(&self) -> Subscriber {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.settings.send_buffer);
        self.send(HubCommand::Register { id, sender });

        Subscriber {
            id,
            receiver,
            hub: self.clone(),
        }
    }

    /// 向当前所有订阅者广播一条消息
    pub fn broadcast(&self, message: impl Into<Arc<str>>) {
        self.send(HubCommand::Broadcast(message.into()));
    }

    /// 注册订阅者并在后台运行其写循环
    pub fn attach<T>(&self, transport: T) -> JoinHandle<()>
    where
        T: SubscriberTransport + 'static,
    {
        let subscriber = self.subscribe();
        tokio::spawn(subscriber.run(transport))
    }

    pub async fn subscriber_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Count(reply));
        rx.await.unwrap_or(0)
    }

    fn unregister(&self, id: SubscriberId) {
        self.send(HubCommand::Unregister(id));
    }

    fn send(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            warn!("事件广播中心已停止，命令被丢弃");
        }
    }
}

/// 单个订阅者，丢弃时自动注销
pub struct Subscriber {
    id: SubscriberId,
    receiver: mpsc::Receiver<Message>,
    hub: HubHandle,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// 接收下一条消息；被移出广播中心后返回 `None`
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }

    /// 写循环
    ///
    /// 把缓冲区中的消息写入传输通道，并按固定间隔发送 ping。每次写入都有超时限制，
    /// 写入失败或超时即退出；缓冲区被关闭时先发送关闭帧再退出。
    pub async fn run<T: SubscriberTransport>(mut self, mut transport: T) {
        let ping_interval = self.hub.settings.ping_interval;
        let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);

        loop {
            tokio::select! {
                message = self.receiver.recv() => match message {
                    Some(message) => {
                        if !self.write(&mut transport, Frame::Text(message.to_string())).await {
                            break;
                        }
                    }
                    None => {
                        self.write(&mut transport, Frame::Close).await;
                        break;
                    }
                },
                _ = ping.tick() => {
                    if !self.write(&mut transport, Frame::Ping).await {
                        break;
                    }
                }
            }
        }
        debug!("订阅者 {} 写循环退出", self.id);
    }

    async fn write<T: SubscriberTransport>(&self, transport: &mut T, frame: Frame) -> bool {
        match timeout(self.hub.settings.write_timeout, transport.send(frame)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("订阅者 {} 写入失败: {}", self.id, e);
                false
            }
            Err(_) => {
                debug!("订阅者 {} 写入超时", self.id);
                false
            }
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}
