//! Room key derivation using HKDF

use hkdf::Hkdf;
use sha2::Sha256;
use wishpernet_proto::RoomToken;
use zeroize::Zeroize;

/// Fixed application salt, shared with browser clients.
pub const ROOM_KEY_SALT: &[u8] = b"wishpernet-room-salt";

/// Context string distinguishing room message encryption.
pub const ROOM_KEY_INFO: &[u8] = b"room-encryption";

/// AES-256 key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Symmetric AEAD key for one room.
///
/// Deliberately not `Clone` and without a public byte accessor: the key can
/// only be used through [`crate::encrypt`] / [`crate::decrypt`]. Zeroized on
/// drop.
pub struct RoomKey {
    key: [u8; KEY_SIZE],
}

impl RoomKey {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RoomKey(..)")
    }
}

impl Drop for RoomKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Derive the room key for a token.
///
/// The UTF-8 bytes of the token string are the HKDF input keying material.
/// Infallible for any token that passed shape validation, which
/// [`RoomToken`] guarantees by construction.
///
/// # Security
///
/// - Deterministic: the same token yields bit-identical keys on every client
/// - Different tokens produce independent keys (cross-room isolation)
/// - Interoperable with WebCrypto `HKDF` + `AES-GCM` browser clients
pub fn derive_room_key(token: &RoomToken) -> RoomKey {
    let hkdf = Hkdf::<Sha256>::new(Some(ROOM_KEY_SALT), token.as_str().as_bytes());

    let mut key = [0u8; KEY_SIZE];
    let Ok(()) = hkdf.expand(ROOM_KEY_INFO, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    RoomKey { key }
}
