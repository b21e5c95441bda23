//! Error types for wire encoding and decoding.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while parsing or producing wire data.
///
/// Variants never carry token contents; a malformed token is reported by
/// length only so that error messages are safe to log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Token does not match `^[a-f0-9]{64}$`
    #[error("invalid token shape ({len} characters)")]
    InvalidToken {
        /// Length of the rejected input
        len: usize,
    },

    /// Empty text message received
    #[error("empty packet")]
    EmptyPacket,

    /// Packet exceeds the maximum accepted size
    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge {
        /// Actual size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Unknown Engine.IO or Socket.IO packet type
    #[error("unknown packet type: {0:?}")]
    UnknownPacketType(char),

    /// Packet framing is structurally invalid
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// Event name is not part of the room protocol
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Event name is valid but not allowed in this direction
    #[error("unexpected event {name} for this direction")]
    UnexpectedEvent {
        /// Wire name of the event
        name: &'static str,
    },

    /// JSON (de)serialization failed
    #[error("json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
