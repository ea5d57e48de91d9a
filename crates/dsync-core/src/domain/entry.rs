//! Directory entries on both sides of a sync
//!
//! A sync compares one level at a time: the children of a local directory
//! ([`LocalEntry`]) against the children of the matching remote folder
//! ([`RemoteEntry`]). Entries are matched by exact, case-sensitive name.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RemoteId;

/// Whether an entry is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Folder,
}

impl EntryKind {
    /// Classify a remote type marker (a MIME type)
    ///
    /// Any marker containing the substring `folder` denotes a folder,
    /// everything else is a file.
    #[must_use]
    pub fn from_type_marker(marker: &str) -> Self {
        if marker.contains("folder") {
            Self::Folder
        } else {
            Self::File
        }
    }

    #[must_use]
    pub fn is_folder(self) -> bool {
        self == Self::Folder
    }
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Folder => write!(f, "folder"),
        }
    }
}

/// A child of a remote folder as reported by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Display name, unique only by convention
    pub name: String,
    pub kind: EntryKind,
    pub id: RemoteId,
    /// Last-modified instant in the remote's textual form,
    /// `YYYY-MM-DDTHH:MM:SS(.fff)?Z`
    pub modified_at: String,
    /// Entries in the remote trash are never part of a listing
    #[serde(default)]
    pub trashed: bool,
}

impl RemoteEntry {
    /// Create a non-trashed entry
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: EntryKind,
        id: RemoteId,
        modified_at: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            id,
            modified_at: modified_at.into(),
            trashed: false,
        }
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }
}

/// A child of a local directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Filesystem modification time
    pub modified_at: DateTime<Utc>,
}

impl LocalEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: EntryKind, modified_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            kind,
            modified_at,
        }
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }
}

/// Which side is authoritative for a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Local tree is authoritative; the remote is made to mirror it
    Push,
    /// Remote tree is authoritative; the local tree is made to mirror it
    Pull,
}

impl Display for SyncDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Pull => write!(f, "pull"),
        }
    }
}
