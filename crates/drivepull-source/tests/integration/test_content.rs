//! Ranged reads and streamed downloads

use futures_util::StreamExt;

use drivepull_core::domain::ApiError;
use drivepull_core::ports::SourceApi;

use crate::common;

const CONTENT: &[u8] = b"0123456789";

#[tokio::test]
async fn test_read_range_sends_range_header() {
    let (server, client) = common::setup_source_mock().await;
    common::mount_content(&server, CONTENT).await;

    let head = client.read_range("/file/1", "0-3").await.unwrap();
    assert_eq!(&head[..], b"0123");
}

#[tokio::test]
async fn test_open_streams_full_content() {
    let (server, client) = common::setup_source_mock().await;
    common::mount_content(&server, CONTENT).await;

    let url = format!("{}/file/1", server.uri());
    let mut stream = client.open(&url).await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(body, CONTENT);
}

#[tokio::test]
async fn test_open_missing_file_is_not_found() {
    let (_server, client) = common::setup_source_mock().await;

    let result = client.open("/file/999").await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}
