pub mod actions;
pub mod codec;
pub mod connection;
pub mod dispatcher;
pub mod events;
pub mod heartbeat;
pub mod push;
pub mod shutdown;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backend::BackendClient;
use crate::config::Config;
use crate::error::SessionError;
use crate::state::SessionState;
use actions::SessionActions;
use connection::FrameWriter;
use dispatcher::{DispatchQueues, Dispatcher};
use events::ServerMessage;
use heartbeat::{HeartbeatMonitor, HeartbeatOutcome, HeartbeatTrigger};
use push::PushForwarder;
use shutdown::Shutdown;

/// Inbound frames left for the embedding application to consume.
///
/// Each queue must be drained: the read loop waits on a full queue, which
/// holds up every other frame type as well.
pub struct InboundQueues {
    pub login: mpsc::Receiver<ServerMessage>,
    pub quit: mpsc::Receiver<ServerMessage>,
    pub client_push: mpsc::Receiver<ServerMessage>,
}

/// One live connection to the relay server and the tasks serving it.
pub struct Session {
    state: SessionState,
    actions: SessionActions,
    trigger: HeartbeatTrigger,
    shutdown: Shutdown,
    reader: JoinHandle<Result<(), SessionError>>,
    workers: Vec<JoinHandle<()>>,
}

impl Session {
    pub async fn connect(config: Config) -> Result<(Self, InboundQueues), SessionError> {
        let stream = connection::connect(&config.server_addr, config.connect_timeout).await?;
        info!(addr = %config.server_addr, uid = %config.uid, "connected to relay server");
        Ok(Self::start(stream, config))
    }

    /// Runs a session over an already-open stream.
    pub fn start<S>(stream: S, config: Config) -> (Self, InboundQueues)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let state = SessionState::new(config);
        let config = state.config.clone();
        let shutdown = Shutdown::new();

        let (writer, writer_task) = FrameWriter::spawn(write_half, shutdown.listener());
        let (dispatcher, queues) = Dispatcher::new(config.queue_capacity);
        let DispatchQueues {
            login,
            quit,
            client_push,
            server_push,
        } = queues;

        let reader = tokio::spawn({
            let listener = shutdown.listener();
            let shutdown = shutdown.clone();
            let max_frame_bytes = config.max_frame_bytes;
            async move {
                let result =
                    connection::read_loop(read_half, dispatcher, listener, max_frame_bytes).await;
                match &result {
                    Ok(()) => info!("session closed"),
                    Err(e) => error!(error = %e, "session ended"),
                }
                shutdown.trigger();
                result
            }
        });

        let backend = BackendClient::new(config.backend_url.clone(), config.push_timeout);
        let forwarder =
            PushForwarder::new(backend, writer.clone(), server_push, shutdown.listener());
        let (monitor, trigger) =
            HeartbeatMonitor::new(state.clone(), writer.clone(), shutdown.listener());

        let workers = vec![
            tokio::spawn(forwarder.run()),
            tokio::spawn(monitor.run()),
            writer_task,
        ];

        let session = Self {
            state,
            actions: SessionActions::new(writer),
            trigger,
            shutdown,
            reader,
            workers,
        };
        let inbound = InboundQueues {
            login,
            quit,
            client_push,
        };
        (session, inbound)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn token(&self) -> std::sync::Arc<String> {
        self.state.token()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.state.set_token(token);
    }

    pub fn actions(&self) -> SessionActions {
        self.actions.clone()
    }

    pub fn heartbeat_trigger(&self) -> HeartbeatTrigger {
        self.trigger.clone()
    }

    pub async fn login(&self) -> Result<(), SessionError> {
        self.actions.login(self.state.uid()).await
    }

    pub async fn send_push(&self, payload: &str) -> Result<(), SessionError> {
        self.actions
            .send_push(self.state.uid(), &self.state.token(), payload)
            .await
    }

    pub async fn quit(&self) -> Result<(), SessionError> {
        self.actions
            .quit(self.state.uid(), &self.state.token())
            .await
    }

    /// Runs one heartbeat now and returns what it observed.
    pub async fn trigger_heartbeat(&self) -> Result<HeartbeatOutcome, SessionError> {
        self.trigger.fire().await
    }

    /// Raises the shutdown signal. Use [`Session::wait`] to join the tasks.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Resolves once the session is shutting down, for whatever reason.
    pub async fn closed(&self) {
        self.shutdown.listener().wait().await;
    }

    /// Waits for the read loop to end, stops the other tasks and returns
    /// the error that ended the session, if any.
    pub async fn wait(self) -> Result<(), SessionError> {
        let Self {
            shutdown,
            reader,
            workers,
            ..
        } = self;

        let result = match reader.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "read task failed");
                Err(SessionError::Closed)
            }
        };
        shutdown.trigger();

        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "session task failed");
            }
        }
        result
    }

    /// Shuts the session down and waits for it.
    pub async fn close(self) -> Result<(), SessionError> {
        self.shutdown();
        self.wait().await
    }
}
