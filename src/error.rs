use std::time::Duration;

/// Errors raised while turning wire bytes into frames.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("invalid {kind} frame: {source}")]
    InvalidFrame {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("frame exceeds {limit} bytes ({buffered} buffered)")]
    FrameTooLarge { limit: usize, buffered: usize },
}

/// Everything that can go wrong with the relay session.
///
/// `Session::wait` returns the variant that ended the read loop; the
/// outbound actions return the variant that stopped a single write.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("connection closed by server")]
    Disconnected,

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("protocol violation: {0}")]
    Protocol(#[from] CodecError),

    #[error("session is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}
