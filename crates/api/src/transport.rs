//! WebSocket 订阅者传输

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use dcron_core::{Frame, SchedulerError, SchedulerResult, SubscriberTransport};
use futures::SinkExt;

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Ping => Message::Ping(Default::default()),
        Frame::Close => Message::Close(None),
    }
}

#[async_trait]
impl SubscriberTransport for WebSocket {
    async fn send(&mut self, frame: Frame) -> SchedulerResult<()> {
        SinkExt::send(self, to_message(frame))
            .await
            .map_err(|e| SchedulerError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_to_message() {
        assert!(matches!(
            to_message(Frame::Text("{}".to_string())),
            Message::Text(text) if text.as_str() == "{}"
        ));
        assert!(matches!(to_message(Frame::Ping), Message::Ping(payload) if payload.is_empty()));
        assert!(matches!(to_message(Frame::Close), Message::Close(None)));
    }
}
