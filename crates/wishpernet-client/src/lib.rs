//! Client
//!
//! Action-based chat client for end-to-end encrypted WishperNet rooms. Owns
//! the session, the room key cache, and the dispatch of server events; the
//! caller owns the sockets.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`wishpernet_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! # Components
//!
//! - [`ChatClient`]: room session state machine (join, receive, send, share)
//! - [`SessionStore`]: username, room token, displayed message ids
//! - [`RoomDirectory`]: token issuer seam (create-room, check-room)
//! - [`entry`]: create, join, resume, and invite-link flows
//!
//! # Flow
//!
//! ```text
//! entry::create_room / entry::join_room ──> SessionStore ──> ChatClient
//!                                                               │
//!        TransportOpened, PacketReceived, SendMessage, ... ─────┤
//!                                                               ▼
//!        Send, DisplayMessage, ShareTokenReady, ReturnToEntry, ...
//! ```
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::HttpDirectory`]: reqwest-backed token issuer
//! - [`transport::connect`]: run a session over tokio-tungstenite
//! - [`transport::SystemEnv`]: production environment

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod directory;
pub mod entry;
mod error;
mod event;
mod session;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::{ChatClient, ClientConfig};
pub use directory::{RoomDirectory, check_room_exists, request_new_room};
pub use error::{ClientError, DirectoryError, ShareError};
pub use event::{
    ChatMessage, ClientAction, ClientEvent, DECRYPTION_FAILED_PLACEHOLDER,
    ENCRYPTION_FAILED_NOTICE, MessageBody, ShareRequestId,
};
pub use session::{Session, SessionStore};
pub use wishpernet_core::{ConnectionState, Environment};
