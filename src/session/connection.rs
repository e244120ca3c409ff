// TCP connection to the relay server.
// Owns the socket halves: the read loop on one side, a single writer task
// on the other.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::codec::{self, FrameDecoder};
use super::dispatcher::Dispatcher;
use super::events::OutboundFrame;
use super::shutdown::ShutdownListener;
use crate::error::SessionError;

/// Size of one socket read. Frames may be larger; the decoder buffers.
const READ_CHUNK: usize = 4096;
const WRITE_QUEUE: usize = 64;

pub async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream, SessionError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                debug!(error = %e, "failed to set TCP_NODELAY");
            }
            Ok(stream)
        }
        Ok(Err(source)) => Err(SessionError::Connect {
            addr: addr.to_string(),
            source,
        }),
        Err(_) => Err(SessionError::ConnectTimeout {
            addr: addr.to_string(),
            timeout,
        }),
    }
}

/// Reads frames until the connection fails or shutdown is raised.
///
/// EOF is reported as [`SessionError::Disconnected`]; a shutdown returns
/// `Ok(())`. Any error here ends the session.
pub async fn read_loop<R>(
    mut reader: R,
    dispatcher: Dispatcher,
    mut shutdown: ShutdownListener,
    max_frame_bytes: usize,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new(max_frame_bytes);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = tokio::select! {
            biased;
            _ = shutdown.wait() => return Ok(()),
            read = reader.read(&mut chunk) => read.map_err(SessionError::Read)?,
        };
        if n == 0 {
            return Err(SessionError::Disconnected);
        }
        trace!(bytes = n, "read from relay");
        decoder.extend(&chunk[..n]);

        while let Some(frame) = decoder.next_frame()? {
            tokio::select! {
                biased;
                _ = shutdown.wait() => return Ok(()),
                dispatched = dispatcher.dispatch(frame) => dispatched?,
            }
        }
    }
}

struct WriteRequest {
    frame: Vec<u8>,
    reply: oneshot::Sender<io::Result<()>>,
}

/// Handle to the single writer task. Cloning is cheap; every clone feeds
/// the same task, which writes each frame whole before taking the next.
#[derive(Clone)]
pub struct FrameWriter {
    tx: mpsc::Sender<WriteRequest>,
}

impl FrameWriter {
    /// Spawns the writer task. It runs until shutdown, until every handle
    /// is dropped, or until a write fails.
    pub fn spawn<W>(writer: W, shutdown: ShutdownListener) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(WRITE_QUEUE);
        let handle = tokio::spawn(writer_loop(writer, rx, shutdown));
        (Self { tx }, handle)
    }

    pub async fn send(&self, frame: &OutboundFrame) -> Result<(), SessionError> {
        let bytes = codec::encode(frame)?;
        self.write(bytes).await
    }

    /// Queues raw bytes and waits until they are flushed to the socket.
    pub async fn write(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(WriteRequest { frame, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        done.await
            .map_err(|_| SessionError::Closed)?
            .map_err(SessionError::Write)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn writer_loop<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<WriteRequest>,
    mut shutdown: ShutdownListener,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let WriteRequest { frame, reply } = tokio::select! {
            _ = shutdown.wait() => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };
        let result = write_frame(&mut writer, &frame).await;
        let failed = result.is_err();
        if let Err(e) = &result {
            warn!(error = %e, "write to relay failed");
        }
        let _ = reply.send(result);
        if failed {
            break;
        }
    }
    let _ = writer.shutdown().await;
    debug!("writer task stopped");
}

async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}
