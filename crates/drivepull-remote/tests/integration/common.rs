//! Shared wiremock helpers for the destination API
//!
//! Each helper mounts the endpoints a test needs and returns a configured
//! [`RemoteClient`] pointing at the mock server.

#![allow(dead_code)]

use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivepull_core::domain::ApiError;
use drivepull_core::ports::{Credentials, DestinationApi, RangeReader};
use drivepull_remote::RemoteClient;

pub const TOKEN: &str = "test-access-token";

/// Starts a mock server and a client already holding [`TOKEN`]
pub async fn setup_remote_mock() -> (MockServer, RemoteClient) {
    let server = MockServer::start().await;
    let client = RemoteClient::new(&server.uri(), Duration::from_secs(5))
        .expect("client for mock server");
    client.set_credentials(Credentials::new(TOKEN));
    (server, client)
}

pub fn folder(id: &str, parent: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "parent_id": parent,
        "name": name,
        "path": format!("/{name}"),
        "is_directory": true
    })
}

pub fn file(id: &str, parent: &str, name: &str, size: u64, hash: &str) -> serde_json::Value {
    json!({
        "id": id,
        "parent_id": parent,
        "name": name,
        "path": format!("/{name}"),
        "is_directory": false,
        "size": size,
        "hash": hash
    })
}

/// Mounts `GET /files/{id}` for an authenticated caller
pub async fn mount_attr(server: &MockServer, id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{id}")))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// In-memory content for range checks
pub struct StaticReader(pub &'static [u8]);

#[async_trait::async_trait]
impl RangeReader for StaticReader {
    async fn read_range(&self, range: &str) -> Result<Bytes, ApiError> {
        let (start, end) = range
            .split_once('-')
            .and_then(|(a, b)| Some((a.parse::<usize>().ok()?, b.parse::<usize>().ok()?)))
            .ok_or_else(|| ApiError::InvalidResponse(range.to_string()))?;
        Ok(Bytes::from_static(&self.0[start..=end]))
    }
}
