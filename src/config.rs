//! Session configuration.
//!
//! Defaults reproduce the stock deployment (plain `ws://` to a local backend, five reconnect
//! attempts starting at one second, 30s keepalive). `apply_env` layers deployment overrides on
//! top.

use std::time::Duration;

use tracing::warn;

use crate::core::{
    ClientIdentity, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_BASE_DELAY, ExponentialBackoffReconnect, WebSocketBufferConfig,
    WsTlsConfig,
};

pub const DEFAULT_HOST: &str = "localhost:8000";

pub const ENV_HOST: &str = "CHAT_WS_HOST";
pub const ENV_SECURE: &str = "CHAT_WS_SECURE";
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "CHAT_WS_MAX_RECONNECT_ATTEMPTS";
pub const ENV_RECONNECT_BASE_MS: &str = "CHAT_WS_RECONNECT_BASE_MS";
pub const ENV_PING_INTERVAL_MS: &str = "CHAT_WS_PING_INTERVAL_MS";

/// Where the session connects: host (with optional port) plus transport security.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    pub host: String,
    pub secure: bool,
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            secure: false,
        }
    }
}

impl Origin {
    #[inline]
    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
        }
    }
}

impl ReconnectConfig {
    pub fn strategy(&self) -> ExponentialBackoffReconnect {
        ExponentialBackoffReconnect::new(self.base_delay, self.max_attempts)
    }
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub origin: Origin,
    /// Fixed identity; generated when `None`.
    pub client_id: Option<String>,
    pub reconnect: ReconnectConfig,
    pub keepalive_interval: Duration,
    pub ws_buffers: WebSocketBufferConfig,
    pub tls: WsTlsConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            origin: Origin::default(),
            client_id: None,
            reconnect: ReconnectConfig::default(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            ws_buffers: WebSocketBufferConfig::default(),
            tls: WsTlsConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.origin.host = host.into();
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.origin.secure = secure;
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_reconnect(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.reconnect = ReconnectConfig {
            max_attempts,
            base_delay,
        };
        self
    }

    pub fn identity(&self) -> ClientIdentity {
        match self.client_id.as_deref() {
            Some(id) if !id.is_empty() => ClientIdentity::from_existing(id),
            _ => ClientIdentity::generate(),
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Unparsable values are logged and ignored.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.trim().is_empty()) {
            self.origin.host = host.trim().to_string();
        }

        if let Some(val) = lookup(ENV_SECURE) {
            match parse_bool(&val) {
                Some(secure) => self.origin.secure = secure,
                None => warn!(key = ENV_SECURE, value = %val, "ignoring unparsable override"),
            }
        }

        if let Some(val) = lookup(ENV_MAX_RECONNECT_ATTEMPTS) {
            match val.trim().parse::<u32>() {
                Ok(n) => self.reconnect.max_attempts = n,
                Err(err) => warn!(
                    key = ENV_MAX_RECONNECT_ATTEMPTS,
                    value = %val,
                    error = %err,
                    "ignoring unparsable override"
                ),
            }
        }

        if let Some(val) = lookup(ENV_RECONNECT_BASE_MS) {
            match val.trim().parse::<u64>() {
                Ok(ms) => self.reconnect.base_delay = Duration::from_millis(ms),
                Err(err) => warn!(
                    key = ENV_RECONNECT_BASE_MS,
                    value = %val,
                    error = %err,
                    "ignoring unparsable override"
                ),
            }
        }

        if let Some(val) = lookup(ENV_PING_INTERVAL_MS) {
            match val.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.keepalive_interval = Duration::from_millis(ms),
                Ok(_) => warn!(key = ENV_PING_INTERVAL_MS, "ignoring zero keepalive interval"),
                Err(err) => warn!(
                    key = ENV_PING_INTERVAL_MS,
                    value = %val,
                    error = %err,
                    "ignoring unparsable override"
                ),
            }
        }

        self
    }
}

/// `<ws|wss>://<host>/ws/<client_id>`
pub fn session_address(origin: &Origin, identity: &ClientIdentity) -> String {
    let host = origin.host.trim_end_matches('/');
    format!("{}://{}/ws/{}", origin.scheme(), host, identity)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
