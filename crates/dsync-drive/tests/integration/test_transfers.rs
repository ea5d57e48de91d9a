//! Creation, upload, download and deletion.

use dsync_core::domain::entry::EntryKind;
use dsync_core::domain::newtypes::RemoteId;
use dsync_core::ports::remote_store::IRemoteStore;
use dsync_drive::provider::DriveRemoteStore;
use dsync_drive::DriveError;
use serde_json::json;
use wiremock::matchers::{body_bytes, body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, file_json};

fn id(s: &str) -> RemoteId {
    RemoteId::new(s.to_string()).unwrap()
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_create_folder_sends_folder_mime_type() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("POST"))
        .and(path("/drive/v2/files"))
        .and(body_json(json!({
            "title": "docs",
            "parents": [{"id": "root"}],
            "mimeType": "application/vnd.google-apps.folder"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(file_json("new-folder", "docs", true, "2024-05-01T08:00:00.000Z")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let entry = store.create_folder(&RemoteId::root(), "docs").await.unwrap();

    assert_eq!(entry.id.as_str(), "new-folder");
    assert_eq!(entry.kind, EntryKind::Folder);
}

#[tokio::test]
async fn test_create_file_omits_mime_type() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("POST"))
        .and(path("/drive/v2/files"))
        .and(body_json(json!({"title": "a.txt", "parents": [{"id": "parent-1"}]})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(file_json("new-file", "a.txt", false, "2024-05-01T08:00:00.000Z")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let entry = client
        .create(&id("parent-1"), "a.txt", EntryKind::File)
        .await
        .unwrap();
    assert_eq!(entry.kind, EntryKind::File);
    assert_eq!(entry.name, "a.txt");
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_content_puts_media() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("PUT"))
        .and(path("/upload/drive/v2/files/file-1"))
        .and(query_param("uploadType", "media"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(b"Hello, Drive!".to_vec()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(file_json("file-1", "a.txt", false, "2024-05-01T08:00:00.000Z")),
        )
        .expect(1)
        .mount(&server)
        .await;

    client
        .upload_content(&id("file-1"), b"Hello, Drive!")
        .await
        .expect("Upload failed");
}

#[tokio::test]
async fn test_upload_empty_file() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("PUT"))
        .and(path("/upload/drive/v2/files/empty-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client.upload_content(&id("empty-1"), &[]).await.unwrap();
}

// ============================================================================
// Download
// ============================================================================

#[tokio::test]
async fn test_download_returns_content() {
    let (server, client) = common::setup_drive_mock().await;
    let content = b"Hello, Drive! This is test content.";
    common::mount_download(&server, "download-001", content).await;

    let data = client
        .download_content(&id("download-001"))
        .await
        .expect("Download failed");
    assert_eq!(data, content);
}

#[tokio::test]
async fn test_download_large_file() {
    let (server, client) = common::setup_drive_mock().await;
    let content: Vec<u8> = (0..1_048_576).map(|i| (i % 256) as u8).collect();
    common::mount_download(&server, "large-001", &content).await;

    let data = client.download_content(&id("large-001")).await.unwrap();
    assert_eq!(data.len(), 1_048_576);
    assert_eq!(data, content);
}

#[tokio::test]
async fn test_download_missing_file_is_not_retried() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/v2/files/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.download_content(&id("gone")).await.unwrap_err();
    assert!(matches!(err, DriveError::NotFound(_)));
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_is_permanent() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v2/files/doomed"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    store.delete(&id("doomed")).await.unwrap();
}

#[tokio::test]
async fn test_delete_unauthorized() {
    let (server, client) = common::setup_drive_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v2/files/doomed"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.delete(&id("doomed")).await.unwrap_err();
    assert!(matches!(err, DriveError::Unauthorized(ref body) if body == "Invalid Credentials"));
}
