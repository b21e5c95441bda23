//! Ephemeral per-tab session.
//!
//! Holds the identity the client chats under and the ids of messages already
//! rendered. Lives in memory only: nothing here outlives the process.

use std::collections::HashSet;

use wishpernet_proto::RoomToken;

use crate::error::ClientError;

/// Username and room token of the active chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
    room_token: RoomToken,
}

impl Session {
    /// Display name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Room token; canonical once the server has reported one.
    pub fn room_token(&self) -> &RoomToken {
        &self.room_token
    }
}

/// Holder of at most one [`Session`] plus its displayed message ids.
///
/// # Invariants
///
/// - Username and room token are always set together; there is no way to
///   store one without the other.
/// - Displayed ids are session-scoped: [`SessionStore::save`] and
///   [`SessionStore::clear`] both reset them.
#[derive(Debug, Default)]
pub struct SessionStore {
    session: Option<Session>,
    displayed: HashSet<String>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session, replacing any existing one.
    ///
    /// The username is trimmed.
    ///
    /// # Errors
    ///
    /// - `ClientError::EmptyUsername` if the trimmed username is empty
    pub fn save(&mut self, username: &str, room_token: RoomToken) -> Result<(), ClientError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::EmptyUsername);
        }

        self.session = Some(Session { username: username.to_string(), room_token });
        self.displayed.clear();
        Ok(())
    }

    /// Active session, if any.
    pub fn load(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Drop the session and its displayed ids.
    pub fn clear(&mut self) {
        self.session = None;
        self.displayed.clear();
    }

    /// Adopt the server's canonical token for the active session.
    ///
    /// Displayed ids are kept: the room is the same. Returns `true` if the
    /// token changed.
    pub fn replace_room_token(&mut self, canonical: RoomToken) -> bool {
        match &mut self.session {
            Some(session) if session.room_token != canonical => {
                session.room_token = canonical;
                true
            },
            _ => false,
        }
    }

    /// Record a message id as displayed. Returns `false` if already seen.
    pub fn mark_displayed(&mut self, message_id: &str) -> bool {
        if self.displayed.contains(message_id) {
            return false;
        }
        self.displayed.insert(message_id.to_string())
    }

    /// Whether a message id has been displayed in this session.
    pub fn is_displayed(&self, message_id: &str) -> bool {
        self.displayed.contains(message_id)
    }

    /// Number of distinct messages displayed in this session.
    pub fn displayed_count(&self) -> usize {
        self.displayed.len()
    }
}
