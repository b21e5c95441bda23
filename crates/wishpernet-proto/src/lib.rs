//! WishperNet wire protocol.
//!
//! Everything that crosses the network boundary lives here: the token shapes
//! that name rooms, the Engine.IO/Socket.IO text packets carried over the
//! persistent WebSocket, the typed room events inside those packets, and the
//! JSON bodies of the two HTTP endpoints.
//!
//! # Layering
//!
//! ```text
//! WebSocket text message
//!        │
//!        ▼
//! Packet (Engine.IO type + Socket.IO type + ack id + JSON args)
//!        │
//!        ▼
//! ClientRequest / ServerEvent (typed payload structs)
//! ```
//!
//! [`Packet`] is a pure framing layer: it never interprets event names. The
//! [`events`] module maps `(name, data)` pairs to typed payloads, mirroring
//! how a frame header is decoded separately from its payload.
//!
//! # Security
//!
//! Tokens are secret-adjacent. [`RoomToken`] and [`ShareToken`] validate
//! their shape on construction (including deserialization), redact themselves
//! in `Debug` output and intentionally do not implement `Display`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod events;
pub mod http;
pub mod packet;
pub mod token;

pub use errors::{ProtocolError, Result};
pub use events::{
    ClientRequest, EventName, GenerateShareToken, JoinRoom, MessageEnvelope, Presence, RoomError,
    RoomJoined, SendMessage, ServerEvent,
};
pub use http::{
    CHECK_ROOM_PATH, CREATE_ROOM_PATH, CheckRoomResponse, CreateRoomResponse, TOKEN_QUERY_PARAM,
};
pub use packet::{OpenHandshake, Packet};
pub use token::{RoomToken, ShareToken, TOKEN_BYTES, TOKEN_HEX_LEN, is_valid_token_shape};
