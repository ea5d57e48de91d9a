//! Shared test helpers for Drive API integration tests
//!
//! Each helper mounts mock endpoints on a wiremock server and returns a
//! DriveClient pointing at it.

use std::time::Duration;

use dsync_drive::client::DriveClient;
use dsync_drive::retry::RetryPolicy;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-access-token";

/// Starts a mock server and a client with fast retries.
pub async fn setup_drive_mock() -> (MockServer, DriveClient) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_url(TOKEN, server.uri())
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(1)));
    (server, client)
}

/// A file resource as returned by the v2 API.
pub fn file_json(id: &str, title: &str, folder: bool, modified: &str) -> Value {
    let mime = if folder {
        "application/vnd.google-apps.folder"
    } else {
        "text/plain"
    };
    json!({
        "kind": "drive#file",
        "id": id,
        "title": title,
        "mimeType": mime,
        "modifiedDate": modified,
        "labels": {"trashed": false}
    })
}

/// Mounts a single-page listing of `parent`.
pub async fn mount_listing(server: &MockServer, parent: &str, items: Value) {
    Mock::given(method("GET"))
        .and(path("/drive/v2/files"))
        .and(query_param("q", format!("'{parent}' in parents and trashed=false")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "drive#fileList",
            "items": items
        })))
        .mount(server)
        .await;
}

/// Mounts a download of `id` returning `content`.
#[allow(dead_code)]
pub async fn mount_download(server: &MockServer, id: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/v2/files/{id}")))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}
