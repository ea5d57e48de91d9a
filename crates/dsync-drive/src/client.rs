//! Google Drive v2 REST client
//!
//! Provides a typed HTTP client for the handful of Drive endpoints the sync
//! engine needs. Handles the bearer token, endpoint construction, status
//! mapping and retries.
//!
//! The bearer token comes from a [`TokenSource`]. A request answered with
//! 401 is sent once more with a refreshed token before the error surfaces.
//!
//! ## Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list      | `GET /drive/v2/files?q='<id>' in parents and trashed=false` |
//! | create    | `POST /drive/v2/files` |
//! | upload    | `PUT /upload/drive/v2/files/<id>?uploadType=media` |
//! | download  | `GET /drive/v2/files/<id>?alt=media` |
//! | delete    | `DELETE /drive/v2/files/<id>` |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dsync_core::domain::newtypes::RemoteId;
//! use dsync_drive::client::DriveClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token-here");
//! for entry in client.list_children(&RemoteId::root()).await? {
//!     println!("{} ({})", entry.name, entry.kind);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dsync_core::config::DEFAULT_DRIVE_BASE_URL;
use dsync_core::domain::entry::{EntryKind, RemoteEntry};
use dsync_core::domain::newtypes::RemoteId;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::retry::{parse_retry_after, RetryPolicy, DEFAULT_RETRY_AFTER};
use crate::DriveError;

/// MIME type Drive uses to mark folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Partial response selector for listings
const LIST_FIELDS: &str = "nextPageToken,items(id,title,mimeType,modifiedDate,labels/trashed)";

/// Page size requested from the listing endpoint
const PAGE_SIZE: &str = "1000";

// ============================================================================
// Drive API response types
// ============================================================================

/// File resource, reduced to the fields the engine reads
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    title: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    modified_date: String,
    #[serde(default)]
    labels: Option<DriveLabels>,
}

#[derive(Debug, Default, Deserialize)]
struct DriveLabels {
    #[serde(default)]
    trashed: bool,
}

/// One page of `files.list`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    items: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// Body of `files.insert`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFile<'a> {
    title: &'a str,
    parents: [ParentRef<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ParentRef<'a> {
    id: &'a str,
}

impl DriveFile {
    fn into_entry(self) -> Result<RemoteEntry, DriveError> {
        let id = RemoteId::new(self.id)
            .map_err(|e| DriveError::InvalidResponse(format!("bad file id: {e}")))?;
        let trashed = self.labels.map(|l| l.trashed).unwrap_or(false);
        let mut entry = RemoteEntry::new(
            self.title,
            EntryKind::from_type_marker(&self.mime_type),
            id,
            self.modified_date,
        );
        entry.trashed = trashed;
        Ok(entry)
    }
}

// ============================================================================
// Token source
// ============================================================================

/// Supplies the bearer token for Drive requests
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Token to send with the next request
    async fn access_token(&self) -> anyhow::Result<String>;

    /// Called after the server rejected `rejected` with 401.
    ///
    /// Returns the token to retry with, or `None` when no other token can be
    /// obtained.
    async fn refresh(&self, rejected: &str) -> anyhow::Result<Option<String>>;
}

/// A fixed access token that cannot be refreshed
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self(access_token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }

    async fn refresh(&self, _rejected: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Token source failures keep their [`DriveError`] when they carry one
fn token_error(err: anyhow::Error) -> DriveError {
    match err.downcast::<DriveError>() {
        Ok(drive) => drive,
        Err(other) => DriveError::AuthenticationRequired(format!("{other:#}")),
    }
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Google Drive API calls
///
/// Wraps `reqwest::Client` with a [`TokenSource`], base URL construction and
/// a [`RetryPolicy`] applied to every request.
#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
    retry: RetryPolicy,
}

impl fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl DriveClient {
    /// Creates a new DriveClient with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DEFAULT_DRIVE_BASE_URL)
    }

    /// Creates a new DriveClient with a custom base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_token_source(Arc::new(StaticToken::new(access_token)), base_url)
    }

    /// Creates a DriveClient whose token can be refreshed during its lifetime
    pub fn with_token_source(tokens: Arc<dyn TokenSource>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Creates a request builder for the given method and path
    ///
    /// The bearer token is added when the request is sent.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to the base URL, e.g. `/drive/v2/files`
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url)
    }

    /// Sends the request built by `build`, retrying transient failures.
    ///
    /// The builder runs once per attempt since request bodies are consumed.
    async fn send<B>(&self, operation: &str, build: B) -> Result<Response, DriveError>
    where
        B: Fn() -> RequestBuilder,
    {
        self.send_when(operation, DriveError::is_transient, build).await
    }

    /// Sends with retries limited to errors accepted by `retry_if`.
    ///
    /// A 401 triggers one token refresh and one more round of attempts.
    async fn send_when<B>(
        &self,
        operation: &str,
        retry_if: fn(&DriveError) -> bool,
        build: B,
    ) -> Result<Response, DriveError>
    where
        B: Fn() -> RequestBuilder,
    {
        let token = self.tokens.access_token().await.map_err(token_error)?;
        match self.attempt(operation, retry_if, &build, &token).await {
            Err(DriveError::Unauthorized(body)) => {
                match self.tokens.refresh(&token).await.map_err(token_error)? {
                    Some(renewed) => {
                        info!(operation, "Access token rejected, retrying with a refreshed one");
                        self.attempt(operation, retry_if, &build, &renewed).await
                    }
                    None => Err(DriveError::Unauthorized(body)),
                }
            }
            other => other,
        }
    }

    async fn attempt<B>(
        &self,
        operation: &str,
        retry_if: fn(&DriveError) -> bool,
        build: &B,
        token: &str,
    ) -> Result<Response, DriveError>
    where
        B: Fn() -> RequestBuilder,
    {
        self.retry
            .run_when(operation, retry_if, move || async move {
                let response = build().bearer_auth(token).send().await?;
                check_status(response).await
            })
            .await
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Lists the non-trashed children of a folder, following pagination
    #[instrument(skip(self), fields(folder = %folder_id))]
    pub async fn list_children(
        &self,
        folder_id: &RemoteId,
    ) -> Result<Vec<RemoteEntry>, DriveError> {
        let query = format!("'{}' in parents and trashed=false", folder_id.as_str());
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.clone();
            let response = self
                .send("list", || {
                    let mut request = self.request(Method::GET, "/drive/v2/files").query(&[
                        ("q", query.as_str()),
                        ("maxResults", PAGE_SIZE),
                        ("fields", LIST_FIELDS),
                    ]);
                    if let Some(token) = &token {
                        request = request.query(&[("pageToken", token.as_str())]);
                    }
                    request
                })
                .await?;

            let page: FileList = response
                .json()
                .await
                .map_err(|e| DriveError::InvalidResponse(format!("file list: {e}")))?;

            for file in page.items {
                let entry = file.into_entry()?;
                if !entry.trashed {
                    entries.push(entry);
                }
            }

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!(count = entries.len(), "Listed remote folder");
        Ok(entries)
    }

    /// Creates a folder or an empty file under `parent_id`
    ///
    /// Not idempotent: a 5xx or a timeout may follow a successful insert, so
    /// only requests the server certainly did not process are repeated.
    #[instrument(skip(self), fields(parent = %parent_id))]
    pub async fn create(
        &self,
        parent_id: &RemoteId,
        name: &str,
        kind: EntryKind,
    ) -> Result<RemoteEntry, DriveError> {
        let body = NewFile {
            title: name,
            parents: [ParentRef {
                id: parent_id.as_str(),
            }],
            mime_type: kind.is_folder().then_some(FOLDER_MIME_TYPE),
        };

        let response = self
            .send_when("create", DriveError::is_unprocessed, || {
                self.request(Method::POST, "/drive/v2/files").json(&body)
            })
            .await?;

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| DriveError::InvalidResponse(format!("created file: {e}")))?;
        let entry = file.into_entry()?;
        debug!(id = %entry.id, "Created remote {}", kind);
        Ok(entry)
    }

    /// Replaces the content of a file with `data`
    #[instrument(skip(self, data), fields(file = %file_id, bytes = data.len()))]
    pub async fn upload_content(&self, file_id: &RemoteId, data: &[u8]) -> Result<(), DriveError> {
        let path = format!("/upload/drive/v2/files/{}", file_id.as_str());
        self.send("upload", || {
            self.request(Method::PUT, &path)
                .query(&[("uploadType", "media")])
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(data.to_vec())
        })
        .await?;
        debug!("Upload complete");
        Ok(())
    }

    /// Downloads the full content of a file
    #[instrument(skip(self), fields(file = %file_id))]
    pub async fn download_content(&self, file_id: &RemoteId) -> Result<Vec<u8>, DriveError> {
        let path = format!("/drive/v2/files/{}", file_id.as_str());
        let response = self
            .send("download", || {
                self.request(Method::GET, &path).query(&[("alt", "media")])
            })
            .await?;

        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "Download complete");
        Ok(bytes.to_vec())
    }

    /// Permanently deletes a file or folder, bypassing the trash
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: &RemoteId) -> Result<(), DriveError> {
        let path = format!("/drive/v2/files/{}", id.as_str());
        self.send("delete", || self.request(Method::DELETE, &path))
            .await?;
        Ok(())
    }
}

/// Maps a non-success status to a [`DriveError`].
///
/// Drive reports per-user quota exhaustion as 403 with a `rateLimitExceeded`
/// reason; that case is treated like 429.
async fn check_status(response: Response) -> Result<Response, DriveError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER));
    let body = response.text().await.unwrap_or_default();

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => DriveError::TooManyRequests {
            retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
        },
        StatusCode::FORBIDDEN
            if body.contains("RateLimitExceeded") || body.contains("rateLimitExceeded") =>
        {
            DriveError::TooManyRequests {
                retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
            }
        }
        StatusCode::UNAUTHORIZED => DriveError::Unauthorized(body),
        StatusCode::FORBIDDEN => DriveError::Forbidden(body),
        StatusCode::NOT_FOUND => DriveError::NotFound(body),
        s if s.is_server_error() => DriveError::ServerError(format!("{s}: {body}")),
        s => DriveError::UnexpectedStatus {
            status: s.as_u16(),
            body,
        },
    })
}
