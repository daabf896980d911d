//! Shared wiremock setup for the source API
//!
//! The mock server answers the attribute/listing queries for a small tree:
//! `/` (id 0) containing `a.txt` (id 1) and `sub` (id 2).

#![allow(dead_code)]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivepull_source::SourceClient;

pub fn root_attr() -> serde_json::Value {
    json!({
        "id": 0,
        "parent_id": 0,
        "name": "",
        "path": "/",
        "is_directory": true,
        "size": 0
    })
}

pub fn file_attr() -> serde_json::Value {
    json!({
        "id": 1,
        "parent_id": 0,
        "name": "a.txt",
        "path": "/a.txt",
        "is_directory": false,
        "size": 10,
        "sha1": "3F786850E387550FDAB836ED7E6DC881DE23001B",
        "url": "/file/1"
    })
}

pub fn dir_attr() -> serde_json::Value {
    json!({
        "id": 2,
        "parent_id": 0,
        "name": "sub",
        "path": "/sub",
        "is_directory": true,
        "size": 0
    })
}

/// Starts a mock server with attr/list answers for the tree above
pub async fn setup_source_mock() -> (MockServer, SourceClient) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("id", "0"))
        .and(query_param("method", "attr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(root_attr()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("id", "0"))
        .and(query_param("method", "list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([file_attr(), dir_attr()])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("path", "/a.txt"))
        .and(query_param("method", "attr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_attr()))
        .mount(&server)
        .await;

    let client = SourceClient::new(&server.uri(), Duration::from_secs(5))
        .expect("client for mock server");
    (server, client)
}

/// Mounts the content of `/file/1`, honouring `Range` headers
pub async fn mount_content(server: &MockServer, content: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path("/file/1"))
        .and(wiremock::matchers::header("Range", "bytes=0-3"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(&content[..4]))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/file/1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content))
        .with_priority(2)
        .mount(server)
        .await;
}
