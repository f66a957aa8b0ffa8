use std::time::Duration;

use thiserror::Error;

/// Convenience result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Canonical error surface of the session core.
///
/// Frame-level and transport-level failures are contained inside the session actor; the only
/// variants a caller normally sees come back from `connect` (`ConnectFailed`, `Aborted`,
/// `InvalidAddress`) or from talking to a stopped session (`SessionStopped`).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Connect aborted: {0}")]
    Aborted(String),

    #[error("Invalid session address: {0}")]
    InvalidAddress(String),

    #[error("Transport error ({context}): {error}")]
    TransportError {
        context: &'static str,
        error: String,
    },

    #[error("Session stopped")]
    SessionStopped,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Actor error: {0}")]
    ActorError(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Framing failures. Decode failures drop one frame; encode failures abort one send.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Envelope has no message type")]
    MissingType,

    #[error("Payload for `{kind}` does not match its schema: {error}")]
    Schema { kind: String, error: String },
}

/// Connection state of the one logical session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    #[inline]
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Result of handing an envelope to the session for sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Encoded and handed to the connection writer. Not acknowledged.
    Sent,
    /// Dropped: the session was not `Connected`.
    NotConnected,
    /// Dropped: the payload could not be serialized.
    EncodeFailed,
    /// Dropped: the session actor is no longer running.
    SessionStopped,
}

/// Transport-independent buffer sizing parameters used for websocket configuration.
#[derive(Clone, Copy, Debug)]
pub struct WebSocketBufferConfig {
    pub write_buffer_bytes: usize,
    pub max_write_buffer_bytes: usize,
    pub max_message_bytes: usize,
    pub max_frame_bytes: usize,
}

impl Default for WebSocketBufferConfig {
    fn default() -> Self {
        Self {
            write_buffer_bytes: 128 << 10,
            max_write_buffer_bytes: 256 << 10,
            max_message_bytes: 16 * 1024 * 1024,
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

/// TLS configuration for websocket connections.
///
/// Safe-by-default: certificate validation is enabled unless explicitly disabled for development /
/// controlled environments.
#[derive(Clone, Copy, Debug)]
pub struct WsTlsConfig {
    pub validate_certs: bool,
}

impl Default for WsTlsConfig {
    fn default() -> Self {
        Self {
            validate_certs: true,
        }
    }
}

/// Snapshot of session counters.
#[derive(Clone, Debug, Default)]
pub struct SessionStats {
    pub uptime: Duration,
    pub inbound: u64,
    pub outbound: u64,
    pub decode_failures: u64,
    pub route_misses: u64,
    pub handler_failures: u64,
    pub observer_failures: u64,
    pub reconnects: u64,
    pub recent_errors: usize,
    pub last_error: Option<String>,
    pub keepalive_p50_us: u64,
    pub keepalive_p99_us: u64,
    pub keepalive_samples: u64,
}

/// Why the current connection went away.
#[derive(Debug, Clone)]
pub enum WsDisconnectCause {
    RemoteClosed { code: Option<u16>, reason: String },
    ReadFailure { error: String },
    WriteFailure { error: String },
    StreamEnded,
    HandshakeFailed { message: String },
}

/// What the reconnect policy decided after a non-explicit close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPlan {
    /// Retry after `delay`; `attempt` is the counter value after incrementing.
    Retry { attempt: u32, delay: Duration },
    /// The attempt budget is spent; the session stays `Disconnected`.
    Exhausted { attempts: u32 },
}

/// Abstract reconnect strategy.
pub trait WsReconnectStrategy: Send + Sync + 'static {
    /// Consume one attempt from the budget and return the delay before it.
    fn plan_next(&mut self) -> ReconnectPlan;
    /// Called on every successful open.
    fn reset(&mut self);
    /// Attempts consumed since the last successful open.
    fn attempts(&self) -> u32;
}
