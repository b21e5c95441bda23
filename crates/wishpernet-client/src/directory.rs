//! Token issuer client.
//!
//! The external server issues room tokens and resolves share tokens over
//! plain HTTP, outside the persistent connection. [`RoomDirectory`] is the
//! seam: production uses the reqwest-backed directory from the `transport`
//! feature, tests use the in-memory server from the harness.
//!
//! Every token is shape-checked before it is trusted. A token that fails the
//! check never reaches the network or the key derivation.

use async_trait::async_trait;
use tracing::{debug, info};
use wishpernet_proto::{CheckRoomResponse, CreateRoomResponse, RoomToken};

use crate::error::DirectoryError;

/// HTTP endpoints of the room server.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// `GET /api/create-room`.
    async fn create_room(&self) -> Result<CreateRoomResponse, DirectoryError>;

    /// `GET /api/check-room?token=T`.
    ///
    /// `token` may be a room token or a share token.
    async fn check_room(&self, token: &RoomToken) -> Result<CheckRoomResponse, DirectoryError>;
}

/// Request a fresh room from the server.
///
/// The returned token is shape-checked during deserialization.
pub async fn request_new_room<D>(directory: &D) -> Result<RoomToken, DirectoryError>
where
    D: RoomDirectory + ?Sized,
{
    let response = directory.create_room().await?;
    info!("room created");
    Ok(response.room_token)
}

/// Look up a token the user supplied.
///
/// # Errors
///
/// - `DirectoryError::InvalidToken` if `raw` fails the shape check; no
///   request is made in that case
/// - any error from the directory
pub async fn check_room_exists<D>(
    directory: &D,
    raw: &str,
) -> Result<(RoomToken, CheckRoomResponse), DirectoryError>
where
    D: RoomDirectory + ?Sized,
{
    let token = RoomToken::parse(raw).map_err(|_| DirectoryError::InvalidToken)?;
    let status = directory.check_room(&token).await?;
    debug!(exists = status.exists, user_count = status.user_count, "room checked");
    Ok((token, status))
}
