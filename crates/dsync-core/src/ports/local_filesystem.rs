//! Local filesystem port (driven/secondary port)
//!
//! This module defines the interface for listing, reading, writing and
//! removing entries in the local tree.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - All paths are `SyncPath` instances, which are guaranteed to be absolute.

use crate::domain::entry::LocalEntry;
use crate::domain::newtypes::SyncPath;

/// Port trait for local filesystem operations
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Lists the direct children of a directory, sorted by name
    ///
    /// Entries that are neither regular files nor directories (after
    /// following symlinks) are skipped.
    async fn list_dir(&self, path: &SyncPath) -> anyhow::Result<Vec<LocalEntry>>;

    /// Returns whether something exists at the path
    async fn exists(&self, path: &SyncPath) -> anyhow::Result<bool>;

    /// Creates a directory and all parent directories as needed
    ///
    /// This is equivalent to `mkdir -p` behavior.
    async fn create_directory(&self, path: &SyncPath) -> anyhow::Result<()>;

    /// Removes a directory together with everything below it
    async fn remove_directory(&self, path: &SyncPath) -> anyhow::Result<()>;

    /// Deletes a single file
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be deleted
    async fn remove_file(&self, path: &SyncPath) -> anyhow::Result<()>;

    /// Reads the entire contents of a file
    async fn read_file(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>>;

    /// Writes data to a file, replacing any previous contents
    ///
    /// Parent directories are NOT automatically created.
    async fn write_file(&self, path: &SyncPath, data: &[u8]) -> anyhow::Result<()>;
}
