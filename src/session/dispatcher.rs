use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::events::{FrameKind, InboundFrame, ServerMessage, ServerPush};
use crate::error::CodecError;

/// Result of classifying one wire frame.
#[derive(Debug, PartialEq)]
pub enum Decoded {
    Frame(InboundFrame),
    /// A well-formed frame whose `type` the client does not handle.
    Unknown(String),
}

/// Reads the `type` tag of a frame, then decodes the rest with the schema
/// that tag selects. A missing tag counts as unknown.
pub fn decode(value: Value) -> Result<Decoded, CodecError> {
    let Value::Object(mut object) = value else {
        return Err(CodecError::NotAnObject);
    };

    let tag = match object.remove("type") {
        Some(tag) => String::deserialize(tag).map_err(|source| CodecError::InvalidFrame {
            kind: "type",
            source,
        })?,
        None => String::new(),
    };
    let Some(kind) = FrameKind::from_tag(&tag) else {
        return Ok(Decoded::Unknown(tag));
    };

    let payload = Value::Object(object);
    let frame = match kind {
        FrameKind::Login => InboundFrame::Login(decode_as(kind, payload)?),
        FrameKind::Quit => InboundFrame::Quit(decode_as(kind, payload)?),
        FrameKind::Heartbeat => InboundFrame::Heartbeat(decode_as(kind, payload)?),
        FrameKind::ClientPush => InboundFrame::ClientPush(decode_as(kind, payload)?),
        FrameKind::ServerPush => InboundFrame::ServerPush(decode_as(kind, payload)?),
    };
    Ok(Decoded::Frame(frame))
}

fn decode_as<T: DeserializeOwned>(kind: FrameKind, payload: Value) -> Result<T, CodecError> {
    serde_json::from_value(payload).map_err(|source| CodecError::InvalidFrame {
        kind: kind.as_str(),
        source,
    })
}

/// Receiving ends of the per-type queues.
pub struct DispatchQueues {
    pub login: mpsc::Receiver<ServerMessage>,
    pub quit: mpsc::Receiver<ServerMessage>,
    pub client_push: mpsc::Receiver<ServerMessage>,
    pub server_push: mpsc::Receiver<ServerPush>,
}

/// Routes decoded frames onto one queue per frame type.
///
/// Delivery waits for queue space, so a consumer that stops receiving
/// eventually stalls the read loop for every frame type.
pub struct Dispatcher {
    login: mpsc::Sender<ServerMessage>,
    quit: mpsc::Sender<ServerMessage>,
    client_push: mpsc::Sender<ServerMessage>,
    server_push: mpsc::Sender<ServerPush>,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> (Self, DispatchQueues) {
        let capacity = capacity.max(1);
        let (login_tx, login_rx) = mpsc::channel(capacity);
        let (quit_tx, quit_rx) = mpsc::channel(capacity);
        let (client_push_tx, client_push_rx) = mpsc::channel(capacity);
        let (server_push_tx, server_push_rx) = mpsc::channel(capacity);
        (
            Self {
                login: login_tx,
                quit: quit_tx,
                client_push: client_push_tx,
                server_push: server_push_tx,
            },
            DispatchQueues {
                login: login_rx,
                quit: quit_rx,
                client_push: client_push_rx,
                server_push: server_push_rx,
            },
        )
    }

    pub async fn dispatch(&self, value: Value) -> Result<(), CodecError> {
        match decode(value)? {
            Decoded::Frame(frame) => self.deliver(frame).await,
            Decoded::Unknown(tag) => warn!(frame_type = %tag, "dropping frame of unknown type"),
        }
        Ok(())
    }

    async fn deliver(&self, frame: InboundFrame) {
        let kind = frame.kind();
        let delivered = match frame {
            InboundFrame::Login(msg) => self.login.send(msg).await.is_ok(),
            InboundFrame::Quit(msg) => self.quit.send(msg).await.is_ok(),
            InboundFrame::ClientPush(msg) => self.client_push.send(msg).await.is_ok(),
            InboundFrame::ServerPush(push) => self.server_push.send(push).await.is_ok(),
            // Server heartbeat replies have no consumer.
            InboundFrame::Heartbeat(_) => {
                trace!("heartbeat reply received");
                return;
            }
        };
        if !delivered {
            debug!(frame_type = kind.as_str(), "no consumer for frame, dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_server_push() {
        let decoded = decode(json!({"type": "serverpush", "url": "/hook", "body": "x"})).unwrap();
        assert_eq!(
            decoded,
            Decoded::Frame(InboundFrame::ServerPush(ServerPush {
                url: "/hook".to_string(),
                body: "x".to_string(),
            }))
        );
    }

    #[test]
    fn test_decode_keeps_payload_without_type() {
        let decoded = decode(json!({"type": "login", "token": "abc", "code": 0})).unwrap();
        let Decoded::Frame(InboundFrame::Login(msg)) = decoded else {
            panic!("expected login frame");
        };
        assert_eq!(msg.str_field("token"), Some("abc"));
        assert_eq!(msg.get("code"), Some(&json!(0)));
        assert!(msg.get("type").is_none());
    }

    #[test]
    fn test_decode_unknown_and_missing_type() {
        assert_eq!(
            decode(json!({"type": "bogus"})).unwrap(),
            Decoded::Unknown("bogus".to_string())
        );
        assert_eq!(
            decode(json!({"body": "x"})).unwrap(),
            Decoded::Unknown(String::new())
        );
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(
            decode(json!([1, 2])).unwrap_err(),
            CodecError::NotAnObject
        ));
    }

    #[test]
    fn test_decode_rejects_non_string_type() {
        assert!(matches!(
            decode(json!({"type": 7})).unwrap_err(),
            CodecError::InvalidFrame { kind: "type", .. }
        ));
    }

    #[test]
    fn test_decode_rejects_server_push_without_url() {
        assert!(matches!(
            decode(json!({"type": "serverpush", "body": "x"})).unwrap_err(),
            CodecError::InvalidFrame {
                kind: "serverpush",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_each_kind_reaches_only_its_queue() {
        let (dispatcher, mut queues) = Dispatcher::new(4);
        dispatcher
            .dispatch(json!({"type": "login", "n": 1}))
            .await
            .unwrap();
        dispatcher
            .dispatch(json!({"type": "quit", "n": 2}))
            .await
            .unwrap();
        dispatcher
            .dispatch(json!({"type": "clientpush", "n": 3}))
            .await
            .unwrap();
        dispatcher
            .dispatch(json!({"type": "serverpush", "url": "/p", "body": "b"}))
            .await
            .unwrap();

        assert_eq!(queues.login.try_recv().unwrap().get("n"), Some(&json!(1)));
        assert_eq!(queues.quit.try_recv().unwrap().get("n"), Some(&json!(2)));
        assert_eq!(
            queues.client_push.try_recv().unwrap().get("n"),
            Some(&json!(3))
        );
        assert_eq!(queues.server_push.try_recv().unwrap().url, "/p");

        assert!(queues.login.try_recv().is_err());
        assert!(queues.quit.try_recv().is_err());
        assert!(queues.client_push.try_recv().is_err());
        assert!(queues.server_push.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_heartbeat_and_unknown_frames_reach_no_queue() {
        let (dispatcher, mut queues) = Dispatcher::new(4);
        dispatcher
            .dispatch(json!({"type": "heartbeat", "ok": true}))
            .await
            .unwrap();
        dispatcher
            .dispatch(json!({"type": "mystery"}))
            .await
            .unwrap();

        assert!(queues.login.try_recv().is_err());
        assert!(queues.quit.try_recv().is_err());
        assert!(queues.client_push.try_recv().is_err());
        assert!(queues.server_push.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_consumer_does_not_fail_dispatch() {
        let (dispatcher, queues) = Dispatcher::new(1);
        drop(queues);
        dispatcher
            .dispatch(json!({"type": "clientpush"}))
            .await
            .unwrap();
    }
}
