//! Ignore rules for both sync directions.
//!
//! The rule file is line oriented:
//!
//! ```text
//! # comment
//! *.log        extension rule (files and folders)
//! /build       folder rule
//! secrets.env  file rule
//! ```
//!
//! Anything that is neither a comment, an extension rule nor a folder rule
//! is taken as a file name. Rules match entry names only, never paths, so
//! `/build` ignores a folder named `build` at any depth.

use std::collections::HashSet;
use std::path::Path;

use dsync_core::domain::entry::EntryKind;
use tracing::debug;

use crate::SyncError;

/// Content written to `ignore.txt` when a project is first configured.
pub const DEFAULT_IGNORE_RULES: &str = "\
# Extensions to ignore (ex: *.txt, *.pdf)


# Folders to ignore (ex: /data, /tmp)
/.dsync
/.git
/.idea
/__pycache__
/venv

# Files to ignore (ex: my_txt.txt, my_pdf.pdf)


";

/// Parsed ignore rules, immutable for a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreRuleSet {
    extensions: HashSet<String>,
    folder_names: HashSet<String>,
    file_names: HashSet<String>,
}

impl IgnoreRuleSet {
    /// A rule set that ignores nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse rules from the text of an ignore file.
    pub fn parse(text: &str) -> Self {
        let mut rules = Self::empty();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(extension) = line.strip_prefix("*.") {
                rules.extensions.insert(extension.to_string());
            } else if let Some(folder) = line.strip_prefix('/') {
                let folder = folder.trim_end_matches('/');
                if !folder.is_empty() {
                    rules.folder_names.insert(folder.to_string());
                }
            } else {
                rules.file_names.insert(line.to_string());
            }
        }

        rules
    }

    /// Load and parse the ignore file at `path`.
    ///
    /// # Errors
    /// `IgnoreFileMissing` when the file does not exist, `Io` for any other
    /// read failure.
    pub async fn load(path: &Path) -> Result<Self, SyncError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::IgnoreFileMissing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let rules = Self::parse(&text);
        debug!(
            path = %path.display(),
            extensions = rules.extensions.len(),
            folders = rules.folder_names.len(),
            files = rules.file_names.len(),
            "Loaded ignore rules"
        );
        Ok(rules)
    }

    /// Whether an entry with this name and kind is excluded from syncing.
    pub fn should_ignore(&self, name: &str, kind: EntryKind) -> bool {
        if let Some(extension) = extension_of(name) {
            if self.extensions.contains(extension) {
                return true;
            }
        }

        match kind {
            EntryKind::Folder => self.folder_names.contains(name),
            EntryKind::File => self.file_names.contains(name),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty() && self.folder_names.is_empty() && self.file_names.is_empty()
    }

    pub fn extensions(&self) -> &HashSet<String> {
        &self.extensions
    }

    pub fn folder_names(&self) -> &HashSet<String> {
        &self.folder_names
    }

    pub fn file_names(&self) -> &HashSet<String> {
        &self.file_names
    }
}

/// The text after the last `.`, if the name has one.
fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, extension)| extension)
}
