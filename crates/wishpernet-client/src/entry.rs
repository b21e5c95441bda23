//! Entry flows: create, join, resume, and invite links.
//!
//! These run before the persistent connection exists. Each ends with a
//! stored [`Session`] whose token the chat client connects with.

use tracing::{info, warn};
use url::Url;
use wishpernet_proto::{RoomToken, ShareToken, is_valid_token_shape};

use crate::{
    directory::{RoomDirectory, check_room_exists, request_new_room},
    error::{ClientError, DirectoryError},
    session::{Session, SessionStore},
};

/// Page that consumes the `token` query parameter of an invite link.
pub const INVITE_PAGE: &str = "index.html";

/// Query parameter carrying the share token.
pub const INVITE_TOKEN_PARAM: &str = "token";

/// Create a room and start a session in it.
///
/// # Errors
///
/// - `ClientError::EmptyUsername` before any request is made
/// - `ClientError::Directory` if the server fails or answers with a
///   malformed token
pub async fn create_room<D>(
    directory: &D,
    store: &mut SessionStore,
    username: &str,
) -> Result<Session, ClientError>
where
    D: RoomDirectory + ?Sized,
{
    if username.trim().is_empty() {
        return Err(ClientError::EmptyUsername);
    }

    let token = request_new_room(directory).await?;
    store.save(username, token)?;
    current(store)
}

/// Join an existing room by room token or share token.
///
/// The token is shape-checked, then resolved by the server. The session
/// stores the canonical token when the server reports one.
///
/// # Errors
///
/// - `ClientError::EmptyUsername` / `ClientError::InvalidToken` before any
///   request is made
/// - `ClientError::RoomNotFound` if the room does not exist
pub async fn join_room<D>(
    directory: &D,
    store: &mut SessionStore,
    username: &str,
    raw_token: &str,
) -> Result<Session, ClientError>
where
    D: RoomDirectory + ?Sized,
{
    if username.trim().is_empty() {
        return Err(ClientError::EmptyUsername);
    }

    let (token, status) = check_room_exists(directory, raw_token).await.map_err(|e| match e {
        DirectoryError::InvalidToken => ClientError::InvalidToken,
        other => ClientError::Directory(other),
    })?;

    if !status.exists {
        return Err(ClientError::RoomNotFound);
    }

    store.save(username, status.primary_room_token.unwrap_or(token))?;
    info!("joining existing room");
    current(store)
}

/// Re-validate the stored session before reconnecting.
///
/// Adopts the server's canonical token. A room that no longer exists clears
/// the session.
///
/// # Errors
///
/// - `ClientError::NoSession` if nothing is stored
/// - `ClientError::RoomNotFound` if the room is gone (session cleared)
pub async fn resume<D>(directory: &D, store: &mut SessionStore) -> Result<Session, ClientError>
where
    D: RoomDirectory + ?Sized,
{
    let token = store.load().ok_or(ClientError::NoSession)?.room_token().clone();
    let status = directory.check_room(&token).await?;

    if !status.exists {
        warn!("stored room no longer exists");
        store.clear();
        return Err(ClientError::RoomNotFound);
    }

    if let Some(canonical) = status.primary_room_token {
        store.replace_room_token(canonical);
    }
    current(store)
}

/// Build an invite link for a share token: `{origin}/index.html?token={share}`.
pub fn invite_link(origin: &Url, share: &ShareToken) -> Url {
    let mut link = origin.clone();
    link.set_path(INVITE_PAGE);
    link.set_fragment(None);
    link.query_pairs_mut().clear().append_pair(INVITE_TOKEN_PARAM, share.as_str());
    link
}

/// Extract the token from an invite link or a bare token.
///
/// The result is a join candidate: it may be a share token, resolved to the
/// canonical room token by [`join_room`].
///
/// # Errors
///
/// - `ClientError::InvalidToken` if no well-formed token is found
pub fn token_from_invite(input: &str) -> Result<RoomToken, ClientError> {
    let trimmed = input.trim();
    if is_valid_token_shape(trimmed) {
        return Ok(RoomToken::parse(trimmed)?);
    }

    let link = Url::parse(trimmed).map_err(|_| ClientError::InvalidToken)?;
    let token = link
        .query_pairs()
        .find(|(key, _)| key == INVITE_TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
        .ok_or(ClientError::InvalidToken)?;

    Ok(RoomToken::parse(&token)?)
}

fn current(store: &SessionStore) -> Result<Session, ClientError> {
    store.load().cloned().ok_or(ClientError::NoSession)
}
