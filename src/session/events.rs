use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::health::HealthSnapshot;

/// Values of the `type` discriminator the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Login,
    Quit,
    Heartbeat,
    ClientPush,
    ServerPush,
}

impl FrameKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "login" => Some(FrameKind::Login),
            "quit" => Some(FrameKind::Quit),
            "heartbeat" => Some(FrameKind::Heartbeat),
            "clientpush" => Some(FrameKind::ClientPush),
            "serverpush" => Some(FrameKind::ServerPush),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Login => "login",
            FrameKind::Quit => "quit",
            FrameKind::Heartbeat => "heartbeat",
            FrameKind::ClientPush => "clientpush",
            FrameKind::ServerPush => "serverpush",
        }
    }
}

/// A frame received from the relay server, decoded by its `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Login(ServerMessage),
    Quit(ServerMessage),
    Heartbeat(ServerMessage),
    ClientPush(ServerMessage),
    ServerPush(ServerPush),
}

impl InboundFrame {
    pub fn kind(&self) -> FrameKind {
        match self {
            InboundFrame::Login(_) => FrameKind::Login,
            InboundFrame::Quit(_) => FrameKind::Quit,
            InboundFrame::Heartbeat(_) => FrameKind::Heartbeat,
            InboundFrame::ClientPush(_) => FrameKind::ClientPush,
            InboundFrame::ServerPush(_) => FrameKind::ServerPush,
        }
    }
}

/// Server-defined payload of a `login`, `quit`, `heartbeat` or `clientpush`
/// reply. The `type` field is stripped; every other field is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ServerMessage {
    pub payload: Map<String, Value>,
}

impl ServerMessage {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// A command the server wants forwarded to the HTTP backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerPush {
    /// Path relative to the configured backend base URL.
    pub url: String,
    pub body: String,
}

/// Frames written to the relay server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    Login {
        uid: String,
        body: String,
    },
    Quit {
        uid: String,
        token: String,
    },
    Heartbeat {
        uid: String,
        token: String,
        body: HealthSnapshot,
    },
    ClientPush {
        uid: String,
        token: String,
        body: String,
    },
    /// Acknowledgment of a forwarded push. Reuses the `serverpush` type.
    #[serde(rename = "serverpush")]
    ServerPushAck(PushAck),
}

pub const ACK_OK: u8 = 0;
pub const ACK_ERROR: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushAck {
    pub status: u8,
    pub msg: String,
    pub body: String,
}

impl PushAck {
    pub fn succeeded(body: String) -> Self {
        Self {
            status: ACK_OK,
            msg: "push succeed".to_string(),
            body,
        }
    }

    pub fn failed(msg: &str) -> Self {
        Self {
            status: ACK_ERROR,
            msg: msg.to_string(),
            body: String::new(),
        }
    }
}
