//! WishperNet protocol core.
//!
//! Sans-IO building blocks shared by the client and the test harness:
//!
//! - [`env::Environment`]: time and randomness, injected so that tests run
//!   under a virtual clock and a seeded RNG
//! - [`connection::Connection`]: lifecycle of the persistent channel, from
//!   transport open through the Engine.IO/Socket.IO handshake to a joined
//!   room
//! - [`error::ConnectionError`]: lifecycle failures, split into transient
//!   and fatal
//!
//! Nothing here performs I/O. Methods take the current instant as a
//! parameter and return actions for a driver to execute.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;

pub use connection::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionState, DEFAULT_JOIN_TIMEOUT,
    HandshakePhase,
};
pub use env::Environment;
pub use error::ConnectionError;
