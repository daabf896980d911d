//! Attribute, listing and directory creation calls

use drivepull_core::domain::{ApiError, EntryId, EntryRef};
use drivepull_core::ports::DestinationApi;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_attr_by_id_sends_bearer_token() {
    let (server, client) = common::setup_remote_mock().await;
    common::mount_attr(&server, "0", common::folder("0", "0", "")).await;

    let root = client.attr(&EntryRef::Id(EntryId::from(0))).await.unwrap();
    assert!(root.is_directory);
    assert_eq!(root.id.as_str(), "0");
}

#[tokio::test]
async fn test_attr_by_path() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("path", "/backup/2024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::folder(
            "77", "12", "2024",
        )))
        .mount(&server)
        .await;

    let entry = client
        .attr(&EntryRef::Path("/backup/2024".into()))
        .await
        .unwrap();
    assert_eq!(entry.id.as_str(), "77");
    assert_eq!(entry.parent_id, Some(EntryId::new("12").unwrap()));
}

#[tokio::test]
async fn test_make_directory() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/files/0/folders"))
        .and(body_json(json!({"name": "sub"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::folder("5", "0", "sub")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = client
        .make_directory("sub", &EntryId::from(0))
        .await
        .unwrap();
    assert_eq!(dir.name, "sub");
    assert!(dir.is_directory);
}

#[tokio::test]
async fn test_make_directory_conflict_is_already_exists() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/files/0/folders"))
        .respond_with(ResponseTemplate::new(409).set_body_string("name taken"))
        .mount(&server)
        .await;

    let result = client.make_directory("sub", &EntryId::from(0)).await;
    assert_eq!(result, Err(ApiError::AlreadyExists("name taken".into())));
}

#[tokio::test]
async fn test_list_children() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/files/0/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                common::file("1", "0", "a.txt", 10, "H1"),
                common::folder("2", "0", "sub")
            ]
        })))
        .mount(&server)
        .await;

    let children = client.list_children(&EntryId::from(0)).await.unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].hash.as_deref(), Some("H1"));
    assert!(children[1].is_directory);
}

#[tokio::test]
async fn test_not_allowed_statuses() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/files/1/children"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/2/children"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.list_children(&EntryId::from(1)).await.unwrap_err();
    assert_eq!(err, ApiError::NotAllowed("405 Method Not Allowed".into()));
    let err = client.list_children(&EntryId::from(2)).await.unwrap_err();
    assert!(err.is_not_allowed());
}

#[tokio::test]
async fn test_missing_entry_and_server_failure() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/files/9"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let missing = client.attr(&EntryRef::Id(EntryId::from(8))).await;
    assert!(matches!(missing, Err(ApiError::NotFound(_))));
    let failed = client.attr(&EntryRef::Id(EntryId::from(9))).await;
    assert!(matches!(failed, Err(ApiError::Server { status: 502, .. })));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/files/0/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entries": []})))
        .mount(&server)
        .await;

    let result = client.list_children(&EntryId::from(0)).await;
    assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
}
