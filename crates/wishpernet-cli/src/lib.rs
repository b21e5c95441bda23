//! Terminal client for WishperNet rooms.
//!
//! A line-oriented shell over [`wishpernet_client::transport`]: stdin lines
//! become [`Command`]s, and [`render`] turns client updates into output
//! lines. Everything protocol-related lives in the client crate.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
pub mod render;

pub use command::{Command, CommandError};
pub use render::{render, render_message};
