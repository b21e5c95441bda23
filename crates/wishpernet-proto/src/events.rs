//! Typed room events carried inside Socket.IO event packets.
//!
//! [`ClientRequest`] covers client → server events and [`ServerEvent`]
//! covers server → client events. Both convert to and from
//! [`Packet::Event`].
//!
//! The reference server serialises event bodies to JSON strings before
//! emitting them, so inbound data may be either a JSON object or a JSON
//! string containing an object. Both forms decode identically.
//!
//! The share-token acknowledgement is not a [`ServerEvent`]. It arrives as
//! [`Packet::Ack`] correlated by ack id, never through the broadcast event
//! path.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    Packet,
    errors::{ProtocolError, Result},
    token::RoomToken,
};

/// Event names of the room protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// `join-room` (client → server)
    JoinRoom,
    /// `room-joined` (server → client)
    RoomJoined,
    /// `room-error` (server → client)
    RoomError,
    /// `send-message` (client → server)
    SendMessage,
    /// `new-message` (server → client)
    NewMessage,
    /// `user-joined` (server → client)
    UserJoined,
    /// `user-left` (server → client)
    UserLeft,
    /// `generate-share-token` (client → server, acknowledged)
    GenerateShareToken,
}

impl EventName {
    /// Wire name of the event.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JoinRoom => "join-room",
            Self::RoomJoined => "room-joined",
            Self::RoomError => "room-error",
            Self::SendMessage => "send-message",
            Self::NewMessage => "new-message",
            Self::UserJoined => "user-joined",
            Self::UserLeft => "user-left",
            Self::GenerateShareToken => "generate-share-token",
        }
    }

    /// Look up an event by wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "join-room" => Some(Self::JoinRoom),
            "room-joined" => Some(Self::RoomJoined),
            "room-error" => Some(Self::RoomError),
            "send-message" => Some(Self::SendMessage),
            "new-message" => Some(Self::NewMessage),
            "user-joined" => Some(Self::UserJoined),
            "user-left" => Some(Self::UserLeft),
            "generate-share-token" => Some(Self::GenerateShareToken),
            _ => None,
        }
    }
}

/// Request to enter a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    /// Room or share token the client holds
    pub room_token: RoomToken,
    /// Display name
    pub username: String,
}

/// Join accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    /// Canonical room token, if the server reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_token: Option<RoomToken>,
    /// Members currently in the room
    #[serde(default)]
    pub user_count: u32,
    /// History replay, oldest first
    #[serde(default)]
    pub messages: Vec<MessageEnvelope>,
}

/// Join rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomError {
    /// Human-readable reason
    #[serde(default)]
    pub message: String,
}

/// Encrypted message submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// Canonical room token
    pub room_token: RoomToken,
    /// Base64 envelope (nonce ‖ ciphertext ‖ tag)
    pub encrypted_message: String,
    /// Sender wall-clock time, epoch milliseconds
    pub timestamp: u64,
    /// Sender display name
    pub username: String,
}

/// Encrypted message as delivered by the server.
///
/// Used for `new-message` broadcasts and for history entries inside
/// [`RoomJoined`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// Sender display name
    pub username: String,
    /// Base64 envelope (nonce ‖ ciphertext ‖ tag). Missing or `null` is kept
    /// as `None` so the message can still be shown as undecryptable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_message: Option<String>,
    /// Sender wall-clock time, epoch milliseconds
    #[serde(default)]
    pub timestamp: u64,
    /// Server-assigned id, absent on some deliveries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Membership change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    /// Member who joined or left
    pub username: String,
    /// Members in the room after the change
    #[serde(default)]
    pub user_count: u32,
}

/// Invite token request; answered through an ack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateShareToken {
    /// Canonical room token
    pub room_token: RoomToken,
}

/// Client → server event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// `join-room`
    JoinRoom(JoinRoom),
    /// `send-message`
    SendMessage(SendMessage),
    /// `generate-share-token`
    GenerateShareToken(GenerateShareToken),
}

impl ClientRequest {
    /// Event name of this request.
    pub const fn name(&self) -> EventName {
        match self {
            Self::JoinRoom(_) => EventName::JoinRoom,
            Self::SendMessage(_) => EventName::SendMessage,
            Self::GenerateShareToken(_) => EventName::GenerateShareToken,
        }
    }

    /// Wrap into an event packet, optionally requesting an ack.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if the payload fails to serialize
    pub fn into_packet(self, ack: Option<u64>) -> Result<Packet> {
        let name = self.name().as_str().to_owned();
        let data = match self {
            Self::JoinRoom(payload) => serde_json::to_value(payload)?,
            Self::SendMessage(payload) => serde_json::to_value(payload)?,
            Self::GenerateShareToken(payload) => serde_json::to_value(payload)?,
        };
        Ok(Packet::Event { ack, name, data })
    }

    /// Decode from an event name and data.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownEvent` for names outside the protocol
    /// - `ProtocolError::UnexpectedEvent` for server → client names
    /// - `ProtocolError::Json` / `ProtocolError::InvalidToken` for bad payloads
    pub fn from_event(name: &str, data: Value) -> Result<Self> {
        let event = EventName::from_wire(name)
            .ok_or_else(|| ProtocolError::UnknownEvent(name.to_owned()))?;
        match event {
            EventName::JoinRoom => Ok(Self::JoinRoom(decode_data(data)?)),
            EventName::SendMessage => Ok(Self::SendMessage(decode_data(data)?)),
            EventName::GenerateShareToken => Ok(Self::GenerateShareToken(decode_data(data)?)),
            other => Err(ProtocolError::UnexpectedEvent { name: other.as_str() }),
        }
    }
}

/// Server → client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// `room-joined`
    RoomJoined(RoomJoined),
    /// `room-error`
    RoomError(RoomError),
    /// `new-message`
    NewMessage(MessageEnvelope),
    /// `user-joined`
    UserJoined(Presence),
    /// `user-left`
    UserLeft(Presence),
}

impl ServerEvent {
    /// Event name of this event.
    pub const fn name(&self) -> EventName {
        match self {
            Self::RoomJoined(_) => EventName::RoomJoined,
            Self::RoomError(_) => EventName::RoomError,
            Self::NewMessage(_) => EventName::NewMessage,
            Self::UserJoined(_) => EventName::UserJoined,
            Self::UserLeft(_) => EventName::UserLeft,
        }
    }

    /// Wrap into an event packet.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if the payload fails to serialize
    pub fn into_packet(self) -> Result<Packet> {
        let name = self.name().as_str().to_owned();
        let data = match self {
            Self::RoomJoined(payload) => serde_json::to_value(payload)?,
            Self::RoomError(payload) => serde_json::to_value(payload)?,
            Self::NewMessage(payload) => serde_json::to_value(payload)?,
            Self::UserJoined(payload) | Self::UserLeft(payload) => serde_json::to_value(payload)?,
        };
        Ok(Packet::event(name, data))
    }

    /// Decode from an event name and data.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownEvent` for names outside the protocol
    /// - `ProtocolError::UnexpectedEvent` for client → server names
    /// - `ProtocolError::Json` / `ProtocolError::InvalidToken` for bad payloads
    pub fn from_event(name: &str, data: Value) -> Result<Self> {
        let event = EventName::from_wire(name)
            .ok_or_else(|| ProtocolError::UnknownEvent(name.to_owned()))?;
        match event {
            EventName::RoomJoined => Ok(Self::RoomJoined(decode_data(data)?)),
            EventName::RoomError => Ok(Self::RoomError(decode_data(data)?)),
            EventName::NewMessage => Ok(Self::NewMessage(decode_data(data)?)),
            EventName::UserJoined => Ok(Self::UserJoined(decode_data(data)?)),
            EventName::UserLeft => Ok(Self::UserLeft(decode_data(data)?)),
            other => Err(ProtocolError::UnexpectedEvent { name: other.as_str() }),
        }
    }
}

/// Decode event data, unwrapping one level of string-encoded JSON.
fn decode_data<T: DeserializeOwned>(data: Value) -> Result<T> {
    match data {
        Value::String(text) => Ok(serde_json::from_str(&text)?),
        other => Ok(serde_json::from_value(other)?),
    }
}
