//! Message envelope encryption using AES-256-GCM
//!
//! All functions are pure: the nonce must be provided by the caller.
//!
//! Envelope layout before base64:
//!
//! ```text
//! [nonce: 12 bytes][ciphertext: n bytes][tag: 16 bytes]
//! ```
//!
//! The layout is self-describing only by these fixed offsets; there is no
//! length or version field.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::{derivation::RoomKey, error::CipherError};

/// AES-GCM nonce size (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Decoded envelope: nonce plus ciphertext with trailing tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Per-message random nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext including the 16-byte GCM tag
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }

    /// Encode as base64 of `nonce ‖ ciphertext ‖ tag`.
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        raw.extend_from_slice(&self.nonce);
        raw.extend_from_slice(&self.ciphertext);
        STANDARD.encode(raw)
    }

    /// Decode from base64 and split at the fixed nonce offset.
    ///
    /// # Errors
    ///
    /// - `MalformedEnvelope` if the input is not standard base64
    /// - `EnvelopeTooShort` if fewer than `NONCE_SIZE + TAG_SIZE` bytes decode
    pub fn decode(encoded: &str) -> Result<Self, CipherError> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CipherError::MalformedEnvelope { reason: e.to_string() })?;

        let min = NONCE_SIZE + TAG_SIZE;
        if raw.len() < min {
            return Err(CipherError::EnvelopeTooShort { len: raw.len(), min });
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);

        Ok(Self { nonce, ciphertext: ciphertext.to_vec() })
    }
}

/// Encrypt a message under a room key.
///
/// No associated data is bound.
///
/// # Errors
///
/// - `EncryptionFailed` if the AEAD rejects the input (plaintext beyond the
///   GCM length limit)
///
/// # Security
///
/// - Caller MUST provide a fresh cryptographically random nonce per call
/// - Reusing a nonce under the same key breaks confidentiality and lets an
///   attacker forge tags
pub fn encrypt(
    plaintext: &[u8],
    key: &RoomKey,
    nonce: [u8; NONCE_SIZE],
) -> Result<Envelope, CipherError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CipherError::EncryptionFailed)?;

    Ok(Envelope { nonce, ciphertext })
}

/// Decrypt a base64 envelope under a room key into UTF-8 text.
///
/// # Errors
///
/// - `MalformedEnvelope` / `EnvelopeTooShort` for undecodable input
/// - `AuthenticationFailed` on a wrong key or tampered data
/// - `InvalidUtf8` if the authenticated plaintext is not text
pub fn decrypt(encoded: &str, key: &RoomKey) -> Result<String, CipherError> {
    let envelope = Envelope::decode(encoded)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
        .map_err(|_| CipherError::AuthenticationFailed)?;

    String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use wishpernet_proto::RoomToken;

    use super::*;
    use crate::derivation::derive_room_key;

    fn key(hex_pair: &str) -> RoomKey {
        derive_room_key(&RoomToken::parse(&hex_pair.repeat(32)).unwrap())
    }

    const COUNTING_NONCE: [u8; NONCE_SIZE] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

    #[test]
    fn known_answer_hello() {
        let envelope = encrypt(b"hello", &key("ab"), COUNTING_NONCE).unwrap();
        assert_eq!(envelope.encode(), "AAECAwQFBgcICQoL4/5vXAeXzUfXaGnxySqzcgRDcpbl");
    }

    #[test]
    fn known_answer_decrypts() {
        let plaintext = decrypt("AAECAwQFBgcICQoL4/5vXAeXzUfXaGnxySqzcgRDcpbl", &key("ab")).unwrap();
        assert_eq!(plaintext, "hello");
    }

    #[test]
    fn ciphertext_length_is_plaintext_plus_tag() {
        let envelope = encrypt(b"hello", &key("ab"), COUNTING_NONCE).unwrap();
        assert_eq!(envelope.ciphertext.len(), 5 + TAG_SIZE);
        assert_eq!(envelope.plaintext_len(), 5);
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let k = key("01");
        let encoded = encrypt(b"", &k, [7; NONCE_SIZE]).unwrap().encode();
        assert_eq!(decrypt(&encoded, &k).unwrap(), "");
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let encoded = encrypt(b"secret", &key("ab"), COUNTING_NONCE).unwrap().encode();
        assert_eq!(decrypt(&encoded, &key("cd")), Err(CipherError::AuthenticationFailed));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let k = key("ab");
        let mut envelope = encrypt(b"secret", &k, COUNTING_NONCE).unwrap();
        envelope.ciphertext[0] ^= 0x01;
        assert_eq!(decrypt(&envelope.encode(), &k), Err(CipherError::AuthenticationFailed));
    }

    #[test]
    fn tampered_nonce_fails_authentication() {
        let k = key("ab");
        let mut envelope = encrypt(b"secret", &k, COUNTING_NONCE).unwrap();
        envelope.nonce[11] ^= 0x80;
        assert_eq!(decrypt(&envelope.encode(), &k), Err(CipherError::AuthenticationFailed));
    }

    #[test]
    fn malformed_base64_is_reported() {
        assert!(matches!(
            decrypt("not base64!!", &key("ab")),
            Err(CipherError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn short_envelope_is_reported() {
        let short = STANDARD.encode([0u8; NONCE_SIZE + TAG_SIZE - 1]);
        assert_eq!(
            decrypt(&short, &key("ab")),
            Err(CipherError::EnvelopeTooShort { len: 27, min: 28 })
        );
    }

    #[test]
    fn non_utf8_plaintext_is_reported() {
        let k = key("ab");
        let encoded = encrypt(&[0xff, 0xfe], &k, COUNTING_NONCE).unwrap().encode();
        assert_eq!(decrypt(&encoded, &k), Err(CipherError::InvalidUtf8));
    }
}
