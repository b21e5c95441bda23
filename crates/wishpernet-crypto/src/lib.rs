//! WishperNet room cryptography
//!
//! Symmetric, room-scoped end-to-end encryption. Every member of a room
//! derives the same key from the room token, so any member can decrypt any
//! other member's messages without a key exchange. Pure functions with
//! deterministic outputs: callers provide nonces, which keeps encryption
//! testable under a seeded environment.
//!
//! # Key Lifecycle
//!
//! ```text
//! RoomToken (64 hex chars, canonical)
//!        │
//!        ▼
//! HKDF-SHA256(salt = "wishpernet-room-salt", info = "room-encryption")
//!        │
//!        ▼
//! RoomKey (32 bytes, cached per token, zeroized on evict/drop)
//!        │
//!        ▼
//! AES-256-GCM(nonce = 12 random bytes, no associated data)
//!        │
//!        ▼
//! base64(nonce ‖ ciphertext ‖ tag)
//! ```
//!
//! Keys live in a [`RoomKeyCache`] owned by the caller (see [`RoomCipher`]),
//! never in process-wide state. The cache is populated on first use and
//! evicted when the connection drops or the room is left.
//!
//! # Security
//!
//! Confidentiality:
//! - Envelopes are opaque to the server, which only relays them
//! - A fresh random nonce per message; nonce reuse under one key is fatal to
//!   AES-GCM and must never happen
//!
//! Authenticity:
//! - The GCM tag rejects any modification of nonce or ciphertext
//! - Failed authentication is reported as [`CipherError::AuthenticationFailed`]
//!
//! Trust model limitations:
//! - Any holder of the room token, past or future, can decrypt every message
//!   ever sent in that room. There is no forward secrecy and no rotation.
//! - Share tokens resolve to the room token through the server, so invite
//!   confidentiality rests on server trust.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cache;
pub mod cipher;
pub mod derivation;
pub mod envelope;
pub mod error;

pub use cache::RoomKeyCache;
pub use cipher::RoomCipher;
pub use derivation::{KEY_SIZE, ROOM_KEY_INFO, ROOM_KEY_SALT, RoomKey, derive_room_key};
pub use envelope::{Envelope, NONCE_SIZE, TAG_SIZE, decrypt, encrypt};
pub use error::CipherError;
