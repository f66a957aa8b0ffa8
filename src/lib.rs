//! Persistent websocket chat session client.
//!
//! One [`ChatSession`] owns one logical connection to the chat backend: it opens the socket,
//! frames typed envelopes, routes inbound messages to per-kind handlers, reconnects with
//! exponential backoff and keeps the connection alive with application-level pings.

pub mod chat;
pub mod client;
pub mod config;
pub mod core;
pub mod supervision;
pub mod testing;
pub mod tls;
pub mod transport;
pub mod ws;

pub use config::SessionConfig;
pub use core::{
    ConnectionState, Envelope, InboundMessage, ObserverId, OutboundMessage, SendOutcome,
    SessionError, SessionResult, SessionStats,
};
pub use ws::ChatSession;
