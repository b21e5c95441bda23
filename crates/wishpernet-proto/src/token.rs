//! Room and share tokens.
//!
//! Both token kinds share one wire shape: 64 lowercase hex characters
//! (`^[a-f0-9]{64}$`), i.e. 32 bytes of server-generated randomness.
//!
//! - A **room token** names a room and is the input keying material for the
//!   room key. A room has exactly one *primary* (canonical) room token; the
//!   server reports it on join and on check-room.
//! - A **share token** is an invite alias minted by the server. It is
//!   distributed in invite links and must never be used for key derivation
//!   directly; it is resolved to the primary token by the server.
//!
//! A token the user types or pastes cannot be classified by shape, so entry
//! flows parse it as a [`RoomToken`] candidate and adopt the server's
//! canonical token as soon as one is reported.
//!
//! # Security
//!
//! Tokens are bearer secrets for room membership. Both types:
//! - validate shape on every construction path, including `serde`
//! - print as `RoomToken(..)` / `ShareToken(..)` under `Debug`
//! - do not implement `Display`, so they cannot leak through `{}` formatting

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Length of a token in hex characters.
pub const TOKEN_HEX_LEN: usize = 64;

/// Length of the random material a token encodes.
pub const TOKEN_BYTES: usize = 32;

/// Whether `s` matches `^[a-f0-9]{64}$`.
///
/// Uppercase hex is rejected. The token string is used verbatim as key
/// derivation input, so case variants would derive a different key.
pub fn is_valid_token_shape(s: &str) -> bool {
    s.len() == TOKEN_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn check_shape(s: &str) -> Result<()> {
    if is_valid_token_shape(s) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidToken { len: s.len() })
    }
}

/// Token naming a room.
///
/// # Invariants
///
/// - Inner string always satisfies [`is_valid_token_shape`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomToken(String);

impl RoomToken {
    /// Parse a room token. The input must match exactly; callers handling
    /// pasted text trim it themselves.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidToken` if the input is not exactly 64
    ///   lowercase hex characters
    pub fn parse(input: &str) -> Result<Self> {
        check_shape(input)?;
        Ok(Self(input.to_owned()))
    }

    /// Hex-encode 32 random bytes into a token.
    pub fn from_bytes(bytes: &[u8; TOKEN_BYTES]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Token as its wire string.
    ///
    /// This is the exact input keying material for room key derivation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RoomToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoomToken(..)")
    }
}

impl FromStr for RoomToken {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomToken {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self> {
        check_shape(&value)?;
        Ok(Self(value))
    }
}

impl From<RoomToken> for String {
    fn from(token: RoomToken) -> Self {
        token.0
    }
}

/// Invite alias for a room, minted by the server on request.
///
/// # Invariants
///
/// - Inner string always satisfies [`is_valid_token_shape`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShareToken(String);

impl ShareToken {
    /// Parse a share token, exact match only.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidToken` on a shape mismatch
    pub fn parse(input: &str) -> Result<Self> {
        check_shape(input)?;
        Ok(Self(input.to_owned()))
    }

    /// Hex-encode 32 random bytes into a token.
    pub fn from_bytes(bytes: &[u8; TOKEN_BYTES]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Token as its wire string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Treat this invite alias as a room token candidate for joining.
    ///
    /// The result must only be sent to the server; the key is derived from
    /// the canonical token the server answers with.
    pub fn into_join_candidate(self) -> RoomToken {
        RoomToken(self.0)
    }
}

impl fmt::Debug for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShareToken(..)")
    }
}

impl FromStr for ShareToken {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShareToken {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self> {
        check_shape(&value)?;
        Ok(Self(value))
    }
}

impl From<ShareToken> for String {
    fn from(token: ShareToken) -> Self {
        token.0
    }
}
