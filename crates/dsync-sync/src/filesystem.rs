//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: Uses write-to-temp + rename to avoid partial writes
//!   on crash or power loss.
//! - **Symlinks**: Listing follows symlinks; dangling links and special
//!   files are skipped.
//! - **Names**: Entries whose name is not valid UTF-8 cannot be mirrored
//!   under the same name and are skipped with a warning.

use std::io::ErrorKind;

use anyhow::Context;
use chrono::{DateTime, Utc};
use dsync_core::domain::entry::{EntryKind, LocalEntry};
use dsync_core::domain::newtypes::SyncPath;
use dsync_core::ports::local_filesystem::ILocalFileSystem;
use tracing::{debug, instrument, warn};

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations derive their context
/// from the [`SyncPath`] arguments.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(path = %path))]
    async fn list_dir(&self, path: &SyncPath) -> anyhow::Result<Vec<LocalEntry>> {
        let mut reader = tokio::fs::read_dir(path.as_path())
            .await
            .with_context(|| format!("Failed to read directory: {path}"))?;

        let mut entries = Vec::new();
        while let Some(dir_entry) = reader.next_entry().await? {
            let name = match dir_entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(name = ?raw, "Skipping entry whose name is not valid UTF-8");
                    continue;
                }
            };

            // tokio::fs::metadata follows symlinks, DirEntry::metadata does not.
            let metadata = match tokio::fs::metadata(dir_entry.path()).await {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(name = %name, "Skipping dangling symlink");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let kind = if metadata.is_dir() {
                EntryKind::Folder
            } else if metadata.is_file() {
                EntryKind::File
            } else {
                debug!(name = %name, "Skipping special file");
                continue;
            };

            let modified_at: DateTime<Utc> = metadata
                .modified()
                .with_context(|| format!("No modification time for {name}"))?
                .into();

            entries.push(LocalEntry::new(name, kind, modified_at));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = entries.len(), "Listed local directory");
        Ok(entries)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn exists(&self, path: &SyncPath) -> anyhow::Result<bool> {
        Ok(tokio::fs::try_exists(path.as_path()).await?)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn create_directory(&self, path: &SyncPath) -> anyhow::Result<()> {
        debug!("creating directory");
        tokio::fs::create_dir_all(path.as_path()).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn remove_directory(&self, path: &SyncPath) -> anyhow::Result<()> {
        debug!("removing directory recursively");
        tokio::fs::remove_dir_all(path.as_path()).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn remove_file(&self, path: &SyncPath) -> anyhow::Result<()> {
        debug!("removing file");
        tokio::fs::remove_file(path.as_path()).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn read_file(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(path.as_path())
            .await
            .with_context(|| format!("Failed to read {path}"))?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self, data), fields(path = %path, bytes = data.len()))]
    async fn write_file(&self, path: &SyncPath, data: &[u8]) -> anyhow::Result<()> {
        let target = path.as_path();

        // Temporary file in the same directory so the rename stays on one
        // filesystem.
        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(".dsync-tmp");
            std::path::PathBuf::from(p)
        };

        debug!(?tmp_path, "writing to temporary file");
        tokio::fs::write(&tmp_path, data)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

        if let Err(e) = tokio::fs::rename(&tmp_path, target).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| format!("Failed to replace {path}"));
        }

        debug!("write complete");
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
