#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use msgclient::config::Config;
use msgclient::session::codec::FrameDecoder;
use msgclient::{InboundQueues, Session};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How long a test waits for a frame before giving up.
pub const FRAME_WAIT: Duration = Duration::from_secs(5);

/// Stands in for the relay server: accepts one client connection per call
/// to [`FakeRelay::accept`].
pub struct FakeRelay {
    listener: TcpListener,
    pub addr: String,
}

impl FakeRelay {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        Self { listener, addr }
    }

    pub async fn accept(&self) -> RelayPeer {
        let (stream, _) = self.listener.accept().await.unwrap();
        RelayPeer {
            stream,
            decoder: FrameDecoder::new(usize::MAX),
        }
    }
}

/// The relay's end of one client connection.
pub struct RelayPeer {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl RelayPeer {
    pub async fn send(&mut self, frame: Value) {
        self.send_raw(frame.to_string().as_bytes()).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Next frame the client wrote. Panics on timeout or EOF.
    pub async fn next_frame(&mut self) -> Value {
        tokio::time::timeout(FRAME_WAIT, self.read_frame())
            .await
            .expect("timed out waiting for a frame")
            .expect("client closed the connection")
    }

    /// Asserts the client writes nothing for `wait`.
    pub async fn expect_silence(&mut self, wait: Duration) {
        if let Ok(Some(frame)) = tokio::time::timeout(wait, self.read_frame()).await {
            panic!("unexpected frame: {frame}");
        }
    }

    /// Reads until the client closes its side, returning any frames written
    /// before that.
    pub async fn drain_until_eof(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        loop {
            let next = tokio::time::timeout(FRAME_WAIT, self.read_frame())
                .await
                .expect("client never closed the connection");
            match next {
                Some(frame) => frames.push(frame),
                None => return frames,
            }
        }
    }

    async fn read_frame(&mut self) -> Option<Value> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(frame) = self.decoder.next_frame().unwrap() {
                return Some(frame);
            }
            let n = self.stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            self.decoder.extend(&chunk[..n]);
        }
    }
}

/// Config pointed at `addr` with timeouts short enough for tests. The
/// periodic heartbeat is pushed out of the way.
pub fn test_config(addr: &str) -> Config {
    let mut config = Config::new(addr, "node-1");
    config.token = Some("tok-1".to_string());
    config.heartbeat_interval = Duration::from_secs(3600);
    config.connect_timeout = Duration::from_secs(2);
    config.push_timeout = Duration::from_millis(500);
    config.monitor_timeout = Duration::from_millis(300);
    config
}

/// Connects a session to `relay` and returns both ends.
pub async fn start_session(
    relay: &FakeRelay,
    config: Config,
) -> (Session, InboundQueues, RelayPeer) {
    let (started, peer) = tokio::join!(Session::connect(config), relay.accept());
    let (session, inbound) = started.expect("session should connect");
    (session, inbound, peer)
}

/// Serves `app` on an ephemeral port and returns its base URL.
pub async fn spawn_http(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Base URL of a port nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Request bodies the mock backend received, in arrival order.
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<(String, Value)>>>);

impl RequestLog {
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0.lock().unwrap().clone()
    }

    fn record(&self, path: &str, body: &Value) {
        self.0.lock().unwrap().push((path.to_string(), body.clone()));
    }
}

/// Mock HTTP backend for server pushes.
///
/// - `/hooks/echo` replies `{"body": <request body>}`
/// - `/hooks/slow` sleeps two seconds, then echoes
/// - `/hooks/delay` sleeps 200ms, then echoes
/// - `/hooks/text` replies with plain text
/// - `/hooks/empty` replies `{}`
/// - `/hooks/null` replies `{"body": null}`
pub fn backend_router(log: RequestLog) -> Router {
    Router::new()
        .route("/hooks/echo", post(echo))
        .route("/hooks/slow", post(slow_echo))
        .route("/hooks/delay", post(delayed_echo))
        .route("/hooks/text", post(plain_text))
        .route("/hooks/empty", post(empty_reply))
        .route("/hooks/null", post(null_body))
        .with_state(log)
}

async fn echo(State(log): State<RequestLog>, Json(body): Json<Value>) -> Json<Value> {
    log.record("/hooks/echo", &body);
    Json(json!({ "body": body["body"] }))
}

async fn slow_echo(State(log): State<RequestLog>, Json(body): Json<Value>) -> Json<Value> {
    log.record("/hooks/slow", &body);
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({ "body": body["body"] }))
}

async fn delayed_echo(State(log): State<RequestLog>, Json(body): Json<Value>) -> Json<Value> {
    log.record("/hooks/delay", &body);
    tokio::time::sleep(Duration::from_millis(200)).await;
    Json(json!({ "body": body["body"] }))
}

async fn empty_reply(State(log): State<RequestLog>, Json(body): Json<Value>) -> Json<Value> {
    log.record("/hooks/empty", &body);
    Json(json!({}))
}

async fn null_body(State(log): State<RequestLog>, Json(body): Json<Value>) -> Json<Value> {
    log.record("/hooks/null", &body);
    Json(json!({ "body": null }))
}

async fn plain_text(State(log): State<RequestLog>, Json(body): Json<Value>) -> &'static str {
    log.record("/hooks/text", &body);
    "accepted"
}

/// Health report served by the mock monitor.
pub fn sample_health() -> Value {
    json!([
        {
            "ip": "10.0.0.5",
            "uid": "node-1",
            "body": {
                "process": {"nginx": 4, "php": 12, "mysql": 1},
                "http": {"disk": 41},
                "shell": {"network": "ok"}
            }
        },
        {
            "ip": "10.0.0.6",
            "uid": "node-2",
            "body": {
                "process": {"nginx": 0, "php": 0, "mysql": 0},
                "http": {"disk": 97},
                "shell": {"network": "down"}
            }
        }
    ])
}

/// Mock monitoring endpoint.
///
/// - `/status` serves [`sample_health`]
/// - `/slow` sleeps two seconds first
/// - `/broken` serves something that is not a health report
pub fn monitor_router() -> Router {
    Router::new()
        .route("/status", get(|| async { Json(sample_health()) }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(sample_health())
            }),
        )
        .route("/broken", get(|| async { "<html>down</html>" }))
}
