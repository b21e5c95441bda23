//! Client error types.

use thiserror::Error;
use wishpernet_core::ConnectionError;
use wishpernet_crypto::CipherError;
use wishpernet_proto::ProtocolError;

/// Errors from the token issuer (HTTP directory).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Token failed the shape check; nothing was sent
    #[error("invalid token format")]
    InvalidToken,

    /// Server answered with a non-success status
    #[error("server returned status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Request could not be completed
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure of a share-token request, delivered through its completion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    /// Not in a joined room
    #[error("not joined to a room")]
    NotJoined,

    /// Connection dropped before the server answered
    #[error("connection lost before share token arrived")]
    ConnectionLost,

    /// Server answered without a token
    #[error("server refused to issue a share token")]
    Refused,

    /// Server answered with something that is not a token
    #[error("server returned an invalid share token")]
    InvalidToken,
}

/// Errors surfaced by the chat client and its entry flows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Username is empty after trimming
    #[error("username must not be empty")]
    EmptyUsername,

    /// Token failed the shape check
    #[error("invalid token format")]
    InvalidToken,

    /// No session is stored
    #[error("no active session")]
    NoSession,

    /// Server reports the room does not exist or has expired
    #[error("room does not exist or has expired")]
    RoomNotFound,

    /// Operation requires a joined room
    #[error("not joined to a room")]
    NotJoined,

    /// Token issuer failure
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Connection lifecycle failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Encryption of an outgoing message failed
    #[error(transparent)]
    Crypto(#[from] CipherError),

    /// Wire encoding or decoding failure
    #[error(transparent)]
    Protocol(ProtocolError),
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidToken { .. } => Self::InvalidToken,
            other => Self::Protocol(other),
        }
    }
}

impl ClientError {
    /// Whether the session survives this error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(err) => err.is_transient(),
            Self::Directory(DirectoryError::Network(_) | DirectoryError::Status { .. }) => true,
            _ => false,
        }
    }
}
