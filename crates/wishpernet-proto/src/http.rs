//! HTTP endpoint paths and response bodies of the token issuer.

use serde::{Deserialize, Serialize};

use crate::token::RoomToken;

/// Path of the room creation endpoint, relative to the server origin.
pub const CREATE_ROOM_PATH: &str = "/api/create-room";

/// Path of the room lookup endpoint, relative to the server origin.
pub const CHECK_ROOM_PATH: &str = "/api/check-room";

/// Query parameter carrying the token for [`CHECK_ROOM_PATH`].
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Body of `GET /api/create-room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    /// Freshly issued primary room token
    pub room_token: RoomToken,
}

/// Body of `GET /api/check-room?token=T`.
///
/// `T` may be a room token or a share token; when the room exists the server
/// resolves it to the primary token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRoomResponse {
    /// Whether the room is live
    pub exists: bool,
    /// Members currently connected
    #[serde(default)]
    pub user_count: u32,
    /// Canonical token of the room
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_room_token: Option<RoomToken>,
}
