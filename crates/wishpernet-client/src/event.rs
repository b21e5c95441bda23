//! Client events and actions.

use std::fmt;

use wishpernet_core::ConnectionState;
use wishpernet_crypto::CipherError;
use wishpernet_proto::{Packet, ShareToken};

use crate::error::ShareError;

/// Text shown in place of a message that could not be decrypted.
pub const DECRYPTION_FAILED_PLACEHOLDER: &str = "[Encrypted message - decryption failed]";

/// Alert shown when an outgoing message cannot be encrypted.
pub const ENCRYPTION_FAILED_NOTICE: &str = "Failed to encrypt message";

/// Caller-chosen id correlating a share request with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShareRequestId(pub u64);

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Opening the transport and reporting open/close
/// - Decoding text messages into packets
/// - Driving time forward via ticks
/// - Forwarding user intents (send, share, leave)
///
/// Generic over `I` (Instant type) to support both production and simulated
/// clocks.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Transport connected; the handshake starts.
    TransportOpened {
        /// Current time from the environment.
        now: I,
    },

    /// Transport closed or failed.
    TransportClosed {
        /// Why the transport went away.
        reason: String,
    },

    /// Packet received from the server.
    PacketReceived {
        /// Decoded packet.
        packet: Packet,
        /// Current time from the environment.
        now: I,
    },

    /// Time tick for timeout processing.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// User submitted message text.
    SendMessage {
        /// Raw input; trimmed before sending.
        text: String,
    },

    /// User asked for an invite token.
    ///
    /// Always answered by exactly one [`ClientAction::ShareTokenReady`] with
    /// the same `request` id.
    RequestShareToken {
        /// Correlation id.
        request: ShareRequestId,
    },

    /// User leaves the room.
    Leave,
}

/// Content of a displayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Decrypted text.
    Text(String),

    /// Envelope failed to decrypt; rendered as a placeholder.
    Undecryptable {
        /// Why decryption failed.
        reason: CipherError,
    },
}

impl fmt::Display for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Undecryptable { .. } => f.write_str(DECRYPTION_FAILED_PLACEHOLDER),
        }
    }
}

/// A message ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Server-assigned or synthesized id.
    pub id: String,
    /// Sender display name.
    pub username: String,
    /// Sender wall-clock time, epoch milliseconds.
    pub timestamp: u64,
    /// Decrypted text or placeholder.
    pub body: MessageBody,
    /// Sent under this session's username.
    pub own: bool,
    /// Delivered as part of the join history replay.
    pub history: bool,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// Send a packet to the server.
    Send(Packet),

    /// Close the transport.
    CloseTransport {
        /// Reason for closing.
        reason: String,
    },

    /// Connection state changed; reflect it in the status display.
    StatusChanged(ConnectionState),

    /// Render a chat message.
    DisplayMessage(ChatMessage),

    /// Render a system line (presence changes).
    SystemNotice {
        /// Notice text.
        text: String,
    },

    /// Update the member count display.
    UserCount(u32),

    /// Enable or disable the send affordance.
    SendAffordance {
        /// Whether sending is allowed.
        enabled: bool,
    },

    /// Completion of a share request.
    ShareTokenReady {
        /// Correlation id from the request.
        request: ShareRequestId,
        /// Share token or failure.
        result: Result<ShareToken, ShareError>,
    },

    /// Alert the user.
    Notify {
        /// Alert text.
        message: String,
    },

    /// Session was cleared; return to the entry screen.
    ReturnToEntry {
        /// Why the session ended.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecryptable_renders_placeholder() {
        let body = MessageBody::Undecryptable { reason: CipherError::AuthenticationFailed };
        assert_eq!(body.to_string(), "[Encrypted message - decryption failed]");
    }

    #[test]
    fn text_renders_verbatim() {
        assert_eq!(MessageBody::Text("hi there".to_string()).to_string(), "hi there");
    }
}
