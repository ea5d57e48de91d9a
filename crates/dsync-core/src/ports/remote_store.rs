//! Remote store port (driven/secondary port)
//!
//! This module defines the interface to a hierarchical remote store whose
//! nodes are addressed by opaque IDs. The primary implementation targets
//! Google Drive, but the engine only relies on the operations below.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific; the engine wraps them as transport failures.
//! - Uses `#[async_trait]` for async trait methods.
//! - Retries for transient failures belong to the implementation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entry::RemoteEntry;
use crate::domain::newtypes::RemoteId;

// ============================================================================
// Tokens
// ============================================================================

/// OAuth tokens used to authorize remote store requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token will expire within the given duration
    pub fn expires_within(&self, duration: chrono::Duration) -> bool {
        Utc::now() + duration >= self.expires_at
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for remote tree operations
///
/// Every call is a single remote round trip from the engine's point of
/// view. Implementations must not cache listings across calls: the engine
/// relies on seeing its own creations and deletions.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Lists the direct children of a folder, excluding trashed entries
    ///
    /// Order is whatever the store reports and is not guaranteed stable.
    async fn list_children(&self, folder_id: &RemoteId) -> anyhow::Result<Vec<RemoteEntry>>;

    /// Creates a folder named `name` under `parent_id`
    ///
    /// Name collisions are not checked; the store may hold duplicates.
    async fn create_folder(&self, parent_id: &RemoteId, name: &str)
        -> anyhow::Result<RemoteEntry>;

    /// Creates an empty file named `name` under `parent_id`
    async fn create_file(&self, parent_id: &RemoteId, name: &str) -> anyhow::Result<RemoteEntry>;

    /// Replaces the content of an existing file
    async fn upload_content(&self, file_id: &RemoteId, data: &[u8]) -> anyhow::Result<()>;

    /// Fetches the full content of a file
    async fn download_content(&self, file_id: &RemoteId) -> anyhow::Result<Vec<u8>>;

    /// Permanently deletes a file, or a folder together with its subtree
    async fn delete(&self, id: &RemoteId) -> anyhow::Result<()>;
}

// ============================================================================
// ISessionProvider trait
// ============================================================================

/// Port trait for opening an authenticated remote session
///
/// Implementations load stored credentials (refreshing them when needed)
/// and fail when the user has not authorized the application yet.
#[async_trait::async_trait]
pub trait ISessionProvider: Send + Sync {
    /// Opens a session and returns a remote store bound to it
    async fn open_session(&self) -> anyhow::Result<Arc<dyn IRemoteStore>>;
}
