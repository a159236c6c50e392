//! # dcron-api
//!
//! 面向实时订阅者的事件推送：
//!
//! - [`hub`]: 广播中心与订阅者写循环
//! - [`transport`]: axum WebSocket 作为订阅者传输通道
//! - [`notifications`]: 把任务开始/结束事件桥接到广播中心

pub mod hub;
pub mod notifications;
pub mod transport;

pub use hub::{Hub, HubHandle, HubSettings, Subscriber, SubscriberId};
pub use notifications::register_task_notifications;
