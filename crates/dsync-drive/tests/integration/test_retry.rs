//! Retries for throttling and server errors.

use dsync_core::domain::entry::EntryKind;
use dsync_core::domain::newtypes::RemoteId;
use dsync_drive::DriveError;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, file_json};

#[tokio::test]
async fn test_server_errors_are_retried() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v2/files"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    common::mount_listing(
        &server,
        "root",
        json!([file_json("a", "a.txt", false, "2024-01-01T00:00:00.000Z")]),
    )
    .await;

    let entries = client.list_children(&RemoteId::root()).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_throttling_honours_retry_after() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/drive/v2/files/x"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v2/files/x"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .delete(&RemoteId::new("x".to_string()).unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rate_limit_403_is_retried() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v2/files/x"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("Retry-After", "0")
                .set_body_json(json!({
                    "error": {
                        "errors": [{"domain": "usageLimits", "reason": "userRateLimitExceeded"}],
                        "code": 403
                    }
                })),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    common::mount_download(&server, "x", b"payload").await;

    let data = client
        .download_content(&RemoteId::new("x".to_string()).unwrap())
        .await
        .unwrap();
    assert_eq!(data, b"payload");
}

#[tokio::test]
async fn test_plain_403_is_not_retried() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v2/files/x"))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficientPermissions"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .download_content(&RemoteId::new("x".to_string()).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::Forbidden(_)));
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (server, client) = common::setup_drive_mock().await;

    // One attempt plus two retries.
    Mock::given(method("GET"))
        .and(path("/drive/v2/files"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.list_children(&RemoteId::root()).await.unwrap_err();
    assert!(matches!(err, DriveError::ServerError(ref m) if m.contains("backend error")));
}

#[tokio::test]
async fn test_create_is_not_repeated_after_server_error() {
    let (server, client) = common::setup_drive_mock().await;

    // The insert may have happened; sending it again could duplicate the file.
    Mock::given(method("POST"))
        .and(path("/drive/v2/files"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .create(&RemoteId::root(), "a.txt", EntryKind::File)
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::ServerError(_)));
}

#[tokio::test]
async fn test_create_is_repeated_after_throttling() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v2/files"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drive/v2/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(
            "new-1",
            "a.txt",
            false,
            "2024-01-01T00:00:00.000Z",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let entry = client
        .create(&RemoteId::root(), "a.txt", EntryKind::File)
        .await
        .unwrap();
    assert_eq!(entry.id.as_str(), "new-1");
}

#[tokio::test]
async fn test_unauthorized_with_fixed_token_is_not_retried() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v2/files"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.list_children(&RemoteId::root()).await.unwrap_err();
    assert!(matches!(err, DriveError::Unauthorized(_)));
}
