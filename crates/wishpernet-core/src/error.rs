//! Error types for the connection lifecycle.

use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: String,
    },

    /// Received a packet that is not valid in the current state
    #[error("unexpected {packet} packet in state {state:?}")]
    UnexpectedPacket {
        /// Current state when the packet was received
        state: ConnectionState,
        /// Packet kind
        packet: &'static str,
    },

    /// Handshake or room join did not complete within the timeout
    #[error("join timeout after {elapsed:?}")]
    JoinTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Server stopped sending heartbeats
    #[error("heartbeat timeout after {elapsed:?}")]
    HeartbeatTimeout {
        /// Time since the last packet
        elapsed: Duration,
    },

    /// Server refused the namespace connection
    #[error("connection refused: {0}")]
    ConnectRefused(String),

    /// Server rejected the room join
    #[error("room rejected: {0}")]
    RoomRejected(String),
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Timeouts are transient: the session survives and a reconnect can
    /// resume it. Refusals and state violations are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::JoinTimeout { .. } | Self::HeartbeatTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_transient() {
        assert!(ConnectionError::JoinTimeout { elapsed: Duration::from_secs(31) }.is_transient());
        assert!(
            ConnectionError::HeartbeatTimeout { elapsed: Duration::from_secs(46) }.is_transient()
        );
    }

    #[test]
    fn refusals_and_violations_are_fatal() {
        assert!(
            !ConnectionError::InvalidState {
                state: ConnectionState::Disconnected,
                operation: "room_joined".to_string(),
            }
            .is_transient()
        );
        assert!(
            !ConnectionError::UnexpectedPacket {
                state: ConnectionState::Joined,
                packet: "open",
            }
            .is_transient()
        );
        assert!(!ConnectionError::ConnectRefused("bad namespace".to_string()).is_transient());
        assert!(!ConnectionError::RoomRejected("expired".to_string()).is_transient());
    }
}
