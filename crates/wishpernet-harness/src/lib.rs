//! Deterministic simulation harness for WishperNet client testing.
//!
//! In-memory implementations of the environment and the external room server
//! for deterministic, reproducible tests of the full join, send, share, and
//! replay protocol without sockets.
//!
//! # Components
//!
//! - [`SimEnv`]: seeded ChaCha RNG and a virtual clock
//! - [`SimServer`]: model of the room server (HTTP directory plus Socket.IO
//!   event handling), shareable between simulated clients
//! - [`SimClient`]: a [`ChatClient`](wishpernet_client::ChatClient) wired to
//!   one simulated socket, recording everything it would show the user

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod sim_client;
pub mod sim_env;
pub mod sim_server;

pub use sim_client::SimClient;
pub use sim_env::{SimEnv, SimInstant};
pub use sim_server::{HISTORY_LIMIT, ROOM_TTL, SimServer, SocketId};
