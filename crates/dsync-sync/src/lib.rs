//! DSync Sync - one-shot push/pull synchronization
//!
//! Provides:
//! - Newer-wins mirroring of a local tree to a remote folder and back
//! - Ignore rules by extension, folder name and file name
//! - Resolution of logical remote paths to folder IDs
//!
//! ## Modules
//!
//! - [`engine`] - Recursive push/pull over one folder level at a time
//! - [`ignore`] - Parsing and evaluation of `ignore.txt`
//! - [`timestamp`] - Field-wise comparison of remote and local modification times
//! - [`index`] - Listing and name lookup of remote folder children
//! - [`resolver`] - Logical path to remote folder ID
//! - [`session`] - Loading and initializing the per-project `.dsync` directory
//! - [`filesystem`] - Local filesystem adapter
//! - `memory` - In-memory remote store for tests (`test-support` feature)

pub mod engine;
pub mod filesystem;
pub mod ignore;
pub mod index;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod resolver;
pub mod session;
pub mod timestamp;

use std::path::PathBuf;

use dsync_core::domain::errors::DomainError;
use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A segment of the remote root path does not exist and creation was
    /// not requested
    #[error("Remote folder '{segment}' not found under '{resolved}'")]
    PathNotFound {
        /// The first segment that could not be found
        segment: String,
        /// The prefix that did resolve, e.g. `/backup`
        resolved: String,
    },

    /// An expected local directory does not exist
    #[error("Local path missing: {}", .0.display())]
    LocalPathMissing(PathBuf),

    /// The remote store reported a failure
    #[error("Remote transport error: {0:#}")]
    RemoteTransport(anyhow::Error),

    /// The local filesystem adapter reported a failure
    #[error("Local filesystem error: {0:#}")]
    LocalFileSystem(anyhow::Error),

    /// Stored credentials or session configuration are absent or rejected
    #[error("{0}")]
    AuthenticationRequired(String),

    /// A remote timestamp could not be parsed
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The ignore rules file is absent
    #[error("Ignore file missing: {}", .0.display())]
    IgnoreFileMissing(PathBuf),

    /// An I/O error occurred while reading session files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A domain-level error propagated from dsync-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SyncError {
    pub(crate) fn remote(err: anyhow::Error) -> Self {
        Self::RemoteTransport(err)
    }

    pub(crate) fn local(err: anyhow::Error) -> Self {
        Self::LocalFileSystem(err)
    }
}
