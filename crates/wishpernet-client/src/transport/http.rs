//! Token issuer over HTTP.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;
use wishpernet_proto::{
    CHECK_ROOM_PATH, CREATE_ROOM_PATH, CheckRoomResponse, CreateRoomResponse, RoomToken,
    TOKEN_QUERY_PARAM,
};

use crate::{directory::RoomDirectory, error::DirectoryError};

/// [`RoomDirectory`] backed by the room server's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: Client,
    base: Url,
}

impl HttpDirectory {
    /// Directory rooted at `base` (scheme, host, port).
    pub fn new(base: Url) -> Self {
        Self { client: Client::new(), base }
    }

    fn endpoint(&self, path: &str) -> Result<Url, DirectoryError> {
        self.base.join(path).map_err(|e| DirectoryError::Network(format!("bad endpoint: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, DirectoryError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, DirectoryError> {
    let status = response.status();
    if !status.is_success() {
        return Err(DirectoryError::Status { status: status.as_u16() });
    }

    response.json::<T>().await.map_err(|e| DirectoryError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl RoomDirectory for HttpDirectory {
    async fn create_room(&self) -> Result<CreateRoomResponse, DirectoryError> {
        self.get_json(self.endpoint(CREATE_ROOM_PATH)?).await
    }

    async fn check_room(&self, token: &RoomToken) -> Result<CheckRoomResponse, DirectoryError> {
        let mut url = self.endpoint(CHECK_ROOM_PATH)?;
        url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token.as_str());
        self.get_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_replace_base_path() {
        let directory = HttpDirectory::new(Url::parse("http://chat.example:8080/app/").unwrap());
        let url = directory.endpoint(CHECK_ROOM_PATH).unwrap();
        assert_eq!(url.as_str(), "http://chat.example:8080/api/check-room");
    }
}
