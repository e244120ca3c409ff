use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MONITOR_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024; // 1 MiB

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Relay server TCP address (`host:port`).
    pub server_addr: String,
    /// Base URL that relative `serverpush` paths are appended to.
    pub backend_url: String,
    /// Local monitoring endpoint. `None` disables health queries.
    pub monitor_url: Option<String>,
    pub heartbeat_interval: Duration,
    pub uid: String,
    /// Token to start with; the embedder usually sets it after login.
    pub token: Option<String>,
    pub connect_timeout: Duration,
    pub push_timeout: Duration,
    pub monitor_timeout: Duration,
    /// Depth of each inbound queue. 1 is a plain handoff: the read loop
    /// waits for the consumer before reading the next frame.
    pub queue_capacity: usize,
    pub max_frame_bytes: usize,
    /// Send an empty heartbeat on ticks when no monitor is configured,
    /// instead of only logging a timestamp.
    pub heartbeat_without_monitor: bool,
}

impl Config {
    pub fn new(server_addr: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            backend_url: String::new(),
            monitor_url: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            uid: uid.into(),
            token: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            monitor_timeout: DEFAULT_MONITOR_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            heartbeat_without_monitor: false,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(None, None)
    }

    /// Like [`Config::from_env`], with explicit values taking precedence
    /// over `MSGCLIENT_SERVER` and `MSGCLIENT_UID`.
    pub fn from_env_with(
        server_addr: Option<String>,
        uid: Option<String>,
    ) -> Result<Self, ConfigError> {
        let server_addr = match server_addr {
            Some(addr) => addr,
            None => required("MSGCLIENT_SERVER")?,
        };
        let uid = match uid {
            Some(uid) => uid,
            None => required("MSGCLIENT_UID")?,
        };
        let mut config = Self::new(server_addr, uid);

        if let Some(url) = optional("MSGCLIENT_BACKEND_URL") {
            config.backend_url = url;
        }
        config.monitor_url = optional("MSGCLIENT_MONITOR_URL");
        config.token = optional("MSGCLIENT_TOKEN");

        if let Some(secs) = parse::<u64>("MSGCLIENT_HEARTBEAT_INTERVAL")? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "MSGCLIENT_HEARTBEAT_INTERVAL",
                    value: secs.to_string(),
                });
            }
            config.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>("MSGCLIENT_CONNECT_TIMEOUT")? {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>("MSGCLIENT_PUSH_TIMEOUT")? {
            config.push_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>("MSGCLIENT_MONITOR_TIMEOUT")? {
            config.monitor_timeout = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse::<usize>("MSGCLIENT_QUEUE_CAPACITY")? {
            config.queue_capacity = capacity.max(1);
        }
        if let Some(bytes) = parse::<usize>("MSGCLIENT_MAX_FRAME_BYTES")? {
            config.max_frame_bytes = bytes;
        }
        config.heartbeat_without_monitor = std::env::var("MSGCLIENT_HEARTBEAT_WITHOUT_MONITOR")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(config)
    }
}

/// Unset and empty variables are both treated as absent.
fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn parse<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match optional(key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(None),
    }
}
