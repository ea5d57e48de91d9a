//! DSync Drive - Google Drive API client
//!
//! Provides:
//! - OAuth2 authentication (Authorization Code with PKCE, loopback redirect)
//! - Folder listing, creation, upload, download and deletion over the
//!   Drive v2 REST API
//! - Retry with backoff for throttled and failed requests
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 PKCE flow, client secrets and token storage
//! - [`client`] - Drive HTTP client
//! - [`retry`] - Retry policy and `Retry-After` parsing
//! - [`provider`] - `IRemoteStore` implementation over the client
//! - [`session`] - `ISessionProvider` that loads and refreshes stored tokens

pub mod auth;
pub mod client;
pub mod provider;
pub mod retry;
pub mod session;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when communicating with the Google Drive API
#[derive(Debug, Error)]
pub enum DriveError {
    /// Credentials are invalid, expired or revoked
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested file or folder does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded; retry after the specified duration
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other unexpected HTTP status
    #[error("HTTP {status}: {body}")]
    UnexpectedStatus {
        status: u16,
        body: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No usable stored credentials; an interactive login is needed
    #[error("{0}")]
    AuthenticationRequired(String),

    /// The OAuth client secrets file is unreadable or malformed
    #[error("Invalid client secrets: {0}")]
    InvalidClientSecrets(String),
}

impl DriveError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TooManyRequests { .. } | Self::ServerError(_) => true,
            Self::NetworkError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Whether the request certainly was not acted upon, so that even a
    /// non-idempotent request can be sent again.
    ///
    /// A 5xx or a timeout may arrive after the server committed the change.
    pub fn is_unprocessed(&self) -> bool {
        match self {
            Self::TooManyRequests { .. } => true,
            Self::NetworkError(e) => e.is_connect(),
            _ => false,
        }
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::TooManyRequests { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
