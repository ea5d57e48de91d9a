//! Resolution of a logical remote path to the ID of its folder.

use anyhow::Context;
use dsync_core::domain::newtypes::{LogicalPath, RemoteId};
use tracing::{debug, info, instrument};

use crate::index::RemoteDirectoryIndex;
use crate::SyncError;

/// Walks a [`LogicalPath`] down the remote tree from the root.
pub struct PathResolver<'a> {
    index: &'a RemoteDirectoryIndex,
}

impl<'a> PathResolver<'a> {
    pub fn new(index: &'a RemoteDirectoryIndex) -> Self {
        Self { index }
    }

    /// Resolve `path` to a folder ID, one segment per listing.
    ///
    /// With `create_missing`, absent folders are created along the way.
    ///
    /// # Errors
    /// `PathNotFound` names the first missing segment when `create_missing`
    /// is false; transport failures abort immediately.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn resolve(
        &self,
        path: &LogicalPath,
        create_missing: bool,
    ) -> Result<RemoteId, SyncError> {
        let mut current = RemoteId::root();
        let mut resolved = Vec::with_capacity(path.segments().len());

        for segment in path.segments() {
            let children = self.index.list_children(&current).await?;

            current = match RemoteDirectoryIndex::find_folder_by_name(&children, segment) {
                Some(folder) => {
                    debug!(segment = %segment, id = %folder.id, "Found remote folder");
                    folder.id.clone()
                }
                None if create_missing => {
                    let created = self
                        .index
                        .store()
                        .create_folder(&current, segment)
                        .await
                        .with_context(|| format!("Failed to create remote folder '{segment}'"))
                        .map_err(SyncError::remote)?;
                    info!(segment = %segment, id = %created.id, "Created remote folder");
                    created.id
                }
                None => {
                    return Err(SyncError::PathNotFound {
                        segment: segment.clone(),
                        resolved: format!("/{}", resolved.join("/")),
                    });
                }
            };

            resolved.push(segment.as_str());
        }

        Ok(current)
    }
}
