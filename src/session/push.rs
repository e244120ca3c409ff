use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::FrameWriter;
use super::events::{OutboundFrame, PushAck, ServerPush};
use super::shutdown::ShutdownListener;
use crate::backend::{BackendClient, BackendError};

/// Forwards `serverpush` commands to the HTTP backend and acknowledges
/// each one on the relay connection.
///
/// Pushes are handled one at a time in arrival order. Backend failures are
/// reported in the ack and never stop the loop.
pub struct PushForwarder {
    backend: BackendClient,
    writer: FrameWriter,
    queue: mpsc::Receiver<ServerPush>,
    shutdown: ShutdownListener,
}

impl PushForwarder {
    pub fn new(
        backend: BackendClient,
        writer: FrameWriter,
        queue: mpsc::Receiver<ServerPush>,
        shutdown: ShutdownListener,
    ) -> Self {
        Self {
            backend,
            writer,
            queue,
            shutdown,
        }
    }

    pub async fn run(self) {
        let Self {
            backend,
            writer,
            mut queue,
            mut shutdown,
        } = self;

        loop {
            let push = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                push = queue.recv() => match push {
                    Some(push) => push,
                    None => break,
                },
            };

            let ack = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                ack = forward(&backend, &push) => ack,
            };

            if let Err(e) = writer.send(&OutboundFrame::ServerPushAck(ack)).await {
                warn!(error = %e, "failed to write push ack");
                break;
            }
        }
        debug!("push forwarder stopped");
    }
}

/// Turns one push into the ack the server expects.
pub async fn forward(backend: &BackendClient, push: &ServerPush) -> PushAck {
    match backend.push(&push.url, &push.body).await {
        Ok(body) => {
            info!(url = %push.url, "push forwarded");
            PushAck::succeeded(body)
        }
        Err(BackendError::InvalidUrl { url, reason }) => {
            warn!(%url, %reason, "cannot build push url");
            PushAck::failed("url error")
        }
        Err(BackendError::Timeout) => {
            warn!(url = %push.url, "push request timed out");
            PushAck::failed("request timeout")
        }
        Err(e @ BackendError::Response(_)) => {
            warn!(url = %push.url, error = %e, "push response unreadable");
            PushAck::failed("response error")
        }
        Err(e @ BackendError::Http(_)) => {
            warn!(url = %push.url, error = %e, "push request failed");
            PushAck::failed("request failed")
        }
    }
}
