//! Cache-backed encrypt/decrypt by room token.

use wishpernet_proto::RoomToken;

use crate::{
    cache::RoomKeyCache,
    envelope::{NONCE_SIZE, decrypt, encrypt},
    error::CipherError,
};

/// Encrypts and decrypts message text for rooms, deriving keys on demand.
///
/// The only side effect of [`RoomCipher::seal`] and [`RoomCipher::open`] is
/// populating the key cache on first use of a token.
#[derive(Debug, Default)]
pub struct RoomCipher {
    keys: RoomKeyCache,
}

impl RoomCipher {
    /// Create a cipher with an empty key cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt `plaintext` for the room named by `token`.
    ///
    /// Returns the base64 envelope ready for the `encryptedMessage` field.
    ///
    /// # Errors
    ///
    /// - `CipherError::EncryptionFailed` if the AEAD rejects the input
    pub fn seal(
        &mut self,
        plaintext: &str,
        token: &RoomToken,
        nonce: [u8; NONCE_SIZE],
    ) -> Result<String, CipherError> {
        let key = self.keys.get_or_derive(token);
        Ok(encrypt(plaintext.as_bytes(), key, nonce)?.encode())
    }

    /// Decrypt a base64 envelope received on the room named by `token`.
    ///
    /// # Errors
    ///
    /// Any [`CipherError`] decode or authentication failure. Callers on the
    /// receive path render these as a placeholder.
    pub fn open(&mut self, envelope: &str, token: &RoomToken) -> Result<String, CipherError> {
        let key = self.keys.get_or_derive(token);
        decrypt(envelope, key)
    }

    /// Evict the key for `token`.
    pub fn forget(&mut self, token: &RoomToken) -> bool {
        self.keys.evict(token)
    }

    /// Evict all keys.
    pub fn forget_all(&mut self) {
        self.keys.clear();
    }

    /// Read access to the key cache.
    pub fn keys(&self) -> &RoomKeyCache {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(pair: &str) -> RoomToken {
        RoomToken::parse(&pair.repeat(32)).unwrap()
    }

    #[test]
    fn seal_open_round_trip() {
        let mut cipher = RoomCipher::new();
        let t = token("ab");

        let envelope = cipher.seal("hello", &t, [3; NONCE_SIZE]).unwrap();
        assert_eq!(cipher.open(&envelope, &t).unwrap(), "hello");
        assert_eq!(cipher.keys().derivations(), 1);
    }

    #[test]
    fn separate_ciphers_interoperate() {
        let t = token("5e");
        let mut alice = RoomCipher::new();
        let mut bob = RoomCipher::new();

        let envelope = alice.seal("hi bob", &t, [9; NONCE_SIZE]).unwrap();
        assert_eq!(bob.open(&envelope, &t).unwrap(), "hi bob");
    }

    #[test]
    fn forget_then_reopen_rederives_same_key() {
        let mut cipher = RoomCipher::new();
        let t = token("ab");
        let envelope = cipher.seal("before drop", &t, [1; NONCE_SIZE]).unwrap();

        assert!(cipher.forget(&t));
        assert!(cipher.keys().is_empty());

        assert_eq!(cipher.open(&envelope, &t).unwrap(), "before drop");
        assert_eq!(cipher.keys().derivations(), 2);
    }

    #[test]
    fn open_under_other_room_fails() {
        let mut cipher = RoomCipher::new();
        let envelope = cipher.seal("room a only", &token("aa"), [0; NONCE_SIZE]).unwrap();
        assert_eq!(cipher.open(&envelope, &token("bb")), Err(CipherError::AuthenticationFailed));
    }
}
