//! Network transport for the chat client.
//!
//! Thin I/O layer around the Sans-IO [`ChatClient`](crate::ChatClient):
//!
//! - [`HttpDirectory`]: token issuer over HTTP (reqwest)
//! - [`connect`]: spawns the socket runtime (tokio-tungstenite) and returns a
//!   [`ChatHandle`] for sending, sharing, and receiving updates
//! - [`SystemEnv`]: production environment (real clock, OS RNG)
//!
//! Protocol decisions stay in the client; this module only moves text frames
//! and executes actions.

mod http;
mod socket;
mod system_env;

use std::time::Duration;

use thiserror::Error;
use url::Url;

pub use http::HttpDirectory;
pub use socket::{ChatHandle, connect};
pub use system_env::SystemEnv;

/// Default token issuer base URL.
pub const DEFAULT_HTTP_BASE: &str = "http://localhost:8080";

/// Default Socket.IO endpoint (Engine.IO v4 over WebSocket).
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:3000/socket.io/?EIO=4&transport=websocket";

/// Default pause between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Default reconnect attempts after a drop before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Runtime task has stopped.
    #[error("chat session closed")]
    Closed,

    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Endpoints and reconnect policy.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Token issuer base URL.
    pub http_base: Url,
    /// Socket.IO WebSocket URL.
    pub socket_url: Url,
    /// Pause between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts before the runtime gives up.
    pub max_reconnect_attempts: u32,
}

impl TransportConfig {
    /// Configuration with the given endpoints and default reconnect policy.
    pub fn new(http_base: Url, socket_url: Url) -> Self {
        Self {
            http_base,
            socket_url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }

    /// Configuration for a server running on localhost.
    ///
    /// # Errors
    ///
    /// - `TransportError::Config` if a default URL fails to parse
    pub fn localhost() -> Result<Self, TransportError> {
        let parse = |raw: &str| Url::parse(raw).map_err(|e| TransportError::Config(e.to_string()));
        Ok(Self::new(parse(DEFAULT_HTTP_BASE)?, parse(DEFAULT_SOCKET_URL)?))
    }
}
