//! Cipher error types

use thiserror::Error;

/// Errors from envelope encryption and decryption.
///
/// Receive-path errors are expected in normal operation (garbled relay,
/// foreign room, stale history) and are rendered as a placeholder by the
/// client, never propagated as faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Envelope is not valid base64
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope {
        /// Decoder diagnostic
        reason: String,
    },

    /// Envelope is shorter than nonce plus tag
    #[error("envelope too short: {len} bytes (minimum {min})")]
    EnvelopeTooShort {
        /// Decoded length
        len: usize,
        /// Minimum valid length
        min: usize,
    },

    /// Tag verification failed (wrong key or tampered data)
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Plaintext authenticated but is not UTF-8
    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,

    /// AEAD refused to encrypt
    #[error("encryption failed")]
    EncryptionFailed,
}
