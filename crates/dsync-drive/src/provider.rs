//! DriveRemoteStore - IRemoteStore implementation for Google Drive
//!
//! Delegates every port call to a [`DriveClient`] and adds the operation
//! context to failures. Authentication is handled separately by
//! [`crate::session::DriveSessionProvider`]; a store is bound to one
//! access token for its whole lifetime.

use anyhow::{Context, Result};
use async_trait::async_trait;
use dsync_core::domain::entry::{EntryKind, RemoteEntry};
use dsync_core::domain::newtypes::RemoteId;
use dsync_core::ports::remote_store::IRemoteStore;

use crate::client::DriveClient;

/// Remote store backed by the Google Drive API
pub struct DriveRemoteStore {
    client: DriveClient,
}

impl DriveRemoteStore {
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IRemoteStore for DriveRemoteStore {
    async fn list_children(&self, folder_id: &RemoteId) -> Result<Vec<RemoteEntry>> {
        self.client
            .list_children(folder_id)
            .await
            .with_context(|| format!("Drive listing of {folder_id} failed"))
    }

    async fn create_folder(&self, parent_id: &RemoteId, name: &str) -> Result<RemoteEntry> {
        self.client
            .create(parent_id, name, EntryKind::Folder)
            .await
            .with_context(|| format!("Drive folder creation of '{name}' failed"))
    }

    async fn create_file(&self, parent_id: &RemoteId, name: &str) -> Result<RemoteEntry> {
        self.client
            .create(parent_id, name, EntryKind::File)
            .await
            .with_context(|| format!("Drive file creation of '{name}' failed"))
    }

    async fn upload_content(&self, file_id: &RemoteId, data: &[u8]) -> Result<()> {
        self.client
            .upload_content(file_id, data)
            .await
            .with_context(|| format!("Drive upload to {file_id} failed"))
    }

    async fn download_content(&self, file_id: &RemoteId) -> Result<Vec<u8>> {
        self.client
            .download_content(file_id)
            .await
            .with_context(|| format!("Drive download of {file_id} failed"))
    }

    async fn delete(&self, id: &RemoteId) -> Result<()> {
        self.client
            .delete(id)
            .await
            .with_context(|| format!("Drive deletion of {id} failed"))
    }
}
