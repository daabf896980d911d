//! Attribute and listing queries

use std::time::Duration;

use drivepull_core::domain::{ApiError, EntryId, EntryRef};
use drivepull_core::ports::SourceApi;
use drivepull_source::SourceClient;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_attr_by_id() {
    let (_server, client) = common::setup_source_mock().await;

    let root = client.attr(&EntryRef::Id(EntryId::from(0))).await.unwrap();
    assert!(root.is_directory);
    assert_eq!(root.path, "/");
}

#[tokio::test]
async fn test_attr_by_path_resolves_content_url() {
    let (server, client) = common::setup_source_mock().await;

    let file = client.attr(&EntryRef::Path("/a.txt".into())).await.unwrap();
    assert_eq!(file.id.as_str(), "1");
    assert_eq!(file.size, 10);
    assert_eq!(
        file.hash.as_deref(),
        Some("3F786850E387550FDAB836ED7E6DC881DE23001B")
    );
    assert_eq!(file.url, Some(format!("{}/file/1", server.uri())));
}

#[tokio::test]
async fn test_list_children() {
    let (_server, client) = common::setup_source_mock().await;

    let children = client
        .list_children(&EntryRef::Id(EntryId::from(0)))
        .await
        .unwrap();
    let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "sub"]);
    assert!(children[1].is_directory);
    assert_eq!(children[1].parent_id, Some(EntryId::from(0)));
}

#[tokio::test]
async fn test_status_codes_map_to_categories() {
    let server = MockServer::start().await;
    for (id, status) in [("404", 404), ("403", 403), ("405", 405), ("400", 400), ("503", 503)] {
        Mock::given(method("GET"))
            .and(query_param("id", id))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }
    let client = SourceClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let attr = |id: u64| {
        let client = client.clone();
        async move { client.attr(&EntryRef::Id(EntryId::from(id))).await }
    };

    assert!(matches!(attr(404).await, Err(ApiError::NotFound(_))));
    // refusals from the source are plain client rejections
    assert!(matches!(
        attr(403).await,
        Err(ApiError::Client { status: 403, .. })
    ));
    assert!(matches!(
        attr(405).await,
        Err(ApiError::Client { status: 405, .. })
    ));
    assert!(matches!(
        attr(400).await,
        Err(ApiError::Client { status: 400, .. })
    ));
    assert!(matches!(
        attr(503).await,
        Err(ApiError::Server { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_undecodable_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    let client = SourceClient::new(&server.uri(), Duration::from_secs(5)).unwrap();

    let result = client.attr(&EntryRef::Id(EntryId::from(1))).await;
    assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::root_attr())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    let client = SourceClient::new(&server.uri(), Duration::from_millis(50)).unwrap();

    let result = client.attr(&EntryRef::Id(EntryId::from(0))).await;
    assert!(matches!(result, Err(ApiError::Timeout(_))));
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    // nothing listens on the discard port
    let client = SourceClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

    let result = client.attr(&EntryRef::Id(EntryId::from(0))).await;
    assert!(matches!(result, Err(ApiError::Connection(_))));
}
