use super::connection::FrameWriter;
use super::events::OutboundFrame;
use crate::error::SessionError;

/// Outbound requests the embedding application sends to the relay.
///
/// Fire-and-forget: each call returns once the frame is on the socket and
/// does not wait for the server's reply.
#[derive(Clone)]
pub struct SessionActions {
    writer: FrameWriter,
}

impl SessionActions {
    pub fn new(writer: FrameWriter) -> Self {
        Self { writer }
    }

    pub async fn login(&self, uid: &str) -> Result<(), SessionError> {
        self.writer
            .send(&OutboundFrame::Login {
                uid: uid.to_string(),
                body: String::new(),
            })
            .await
    }

    pub async fn send_push(&self, uid: &str, token: &str, payload: &str) -> Result<(), SessionError> {
        self.writer
            .send(&OutboundFrame::ClientPush {
                uid: uid.to_string(),
                token: token.to_string(),
                body: payload.to_string(),
            })
            .await
    }

    pub async fn quit(&self, uid: &str, token: &str) -> Result<(), SessionError> {
        self.writer
            .send(&OutboundFrame::Quit {
                uid: uid.to_string(),
                token: token.to_string(),
            })
            .await
    }
}
