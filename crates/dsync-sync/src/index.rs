//! Query façade over the remote store's folder listings.

use std::sync::Arc;

use anyhow::Context;
use dsync_core::domain::entry::{EntryKind, RemoteEntry};
use dsync_core::domain::newtypes::RemoteId;
use dsync_core::ports::remote_store::IRemoteStore;
use tracing::{debug, instrument};

use crate::SyncError;

/// Lists remote folders and finds children by name.
///
/// Stateless: every listing is a fresh call to the store.
#[derive(Clone)]
pub struct RemoteDirectoryIndex {
    store: Arc<dyn IRemoteStore>,
}

impl RemoteDirectoryIndex {
    pub fn new(store: Arc<dyn IRemoteStore>) -> Self {
        Self { store }
    }

    /// The underlying store, for mutations.
    pub fn store(&self) -> &Arc<dyn IRemoteStore> {
        &self.store
    }

    /// Children of `folder_id` in the order the store reports them.
    ///
    /// Trashed entries are dropped even if the store lets them through.
    #[instrument(skip(self), fields(folder = %folder_id))]
    pub async fn list_children(&self, folder_id: &RemoteId) -> Result<Vec<RemoteEntry>, SyncError> {
        let mut children = self
            .store
            .list_children(folder_id)
            .await
            .with_context(|| format!("Failed to list children of remote folder {folder_id}"))
            .map_err(SyncError::remote)?;
        children.retain(|entry| !entry.trashed);
        debug!(count = children.len(), "Listed remote folder");
        Ok(children)
    }

    /// First child whose name equals `name` exactly.
    pub fn find_by_name<'a>(children: &'a [RemoteEntry], name: &str) -> Option<&'a RemoteEntry> {
        children.iter().find(|entry| entry.name == name)
    }

    /// First folder child whose name equals `name` exactly.
    pub fn find_folder_by_name<'a>(
        children: &'a [RemoteEntry],
        name: &str,
    ) -> Option<&'a RemoteEntry> {
        Self::find_by_name_and_kind(children, name, EntryKind::Folder)
    }

    /// First child of the given kind whose name equals `name` exactly.
    pub fn find_by_name_and_kind<'a>(
        children: &'a [RemoteEntry],
        name: &str,
        kind: EntryKind,
    ) -> Option<&'a RemoteEntry> {
        children
            .iter()
            .find(|entry| entry.kind == kind && entry.name == name)
    }
}
