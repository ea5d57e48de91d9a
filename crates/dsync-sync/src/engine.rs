//! Newer-wins synchronization engine
//!
//! The [`SyncEngine`] mirrors a local directory tree onto a remote folder
//! (push) or a remote folder onto a local directory tree (pull).
//!
//! ## Per-level Flow
//!
//! Both directions walk the tree depth-first, one folder level at a time:
//!
//! 1. **Snapshot**: list the local directory and the remote folder once.
//! 2. **Deletion pass**: remove entries on the target side that have no
//!    counterpart (same name, same kind) on the authoritative side.
//! 3. **Creation/update pass**: create what is missing on the target side,
//!    replace files whose authoritative copy is newer, and recurse into
//!    folders before moving on to the next sibling.
//!
//! Every call is awaited before the next is issued. The first failure
//! aborts the whole run; re-running converges because each step is
//! idempotent per entry.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use dsync_core::config::SyncConfig;
use dsync_core::domain::entry::{EntryKind, LocalEntry, RemoteEntry, SyncDirection};
use dsync_core::domain::newtypes::{LogicalPath, RemoteId, SyncPath};
use dsync_core::ports::local_filesystem::ILocalFileSystem;
use dsync_core::ports::remote_store::IRemoteStore;
use tracing::{debug, info, instrument, warn};

use crate::ignore::IgnoreRuleSet;
use crate::index::RemoteDirectoryIndex;
use crate::resolver::PathResolver;
use crate::timestamp::{TimestampComparator, Verdict};
use crate::SyncError;

type LevelFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send + 'a>>;

// ============================================================================
// SyncReport
// ============================================================================

/// Summary of a completed push or pull
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Folders created on the target side
    pub folders_created: u32,
    /// Files uploaded to the remote, new or replaced
    pub files_uploaded: u32,
    /// Files downloaded to the local tree, new or replaced
    pub files_downloaded: u32,
    /// Remote entries deleted because they have no local counterpart
    pub remote_deletions: u32,
    /// Local entries deleted because they have no remote counterpart
    pub local_deletions: u32,
    /// Entries skipped by the ignore rules
    pub skipped_ignored: u32,
    /// Files left alone because the target copy is as new or newer
    pub unchanged: u32,
    /// Whether the run only reported decisions
    pub dry_run: bool,
}

impl SyncReport {
    /// Number of create, transfer and delete decisions.
    pub fn changes(&self) -> u32 {
        self.folders_created
            + self.files_uploaded
            + self.files_downloaded
            + self.remote_deletions
            + self.local_deletions
    }
}

// ============================================================================
// SyncObserver
// ============================================================================

/// What the engine decided for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Started processing a folder level
    EnterFolder,
    /// Created a folder on the target side
    CreateFolder,
    /// Transferred a file that did not exist on the target side
    Transfer,
    /// Replaced an older target file with the newer authoritative copy
    Replace,
    /// Deleted a target entry without a counterpart
    Delete,
    /// Skipped by the ignore rules
    Ignore,
    /// Target copy is as new or newer
    Unchanged,
}

/// A progress notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub direction: SyncDirection,
    pub action: SyncAction,
    pub kind: EntryKind,
    /// Path relative to the local sync root; `.` is the root itself
    pub path: PathBuf,
    /// Folder depth below the sync root
    pub depth: usize,
    pub dry_run: bool,
}

/// Receives progress notifications while a sync runs
pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// Observer that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_event(&self, _event: &SyncEvent) {}
}

// ============================================================================
// Walk state
// ============================================================================

/// One folder level: the local directory and its remote counterpart
///
/// Either side may be absent during a dry run, when the folder would have
/// been created; an absent side lists as empty.
struct Level {
    local: SyncPath,
    local_exists: bool,
    remote: Option<RemoteId>,
    relative: PathBuf,
    depth: usize,
}

impl Level {
    fn root(local: &SyncPath, remote: Option<RemoteId>) -> Self {
        Self {
            local: local.clone(),
            local_exists: true,
            remote,
            relative: PathBuf::from("."),
            depth: 0,
        }
    }

    fn child(
        &self,
        name: &str,
        local_exists: bool,
        remote: Option<RemoteId>,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            local: self.local.join(name)?,
            local_exists,
            remote,
            relative: self.relative_path(name),
            depth: self.depth + 1,
        })
    }

    fn relative_path(&self, name: &str) -> PathBuf {
        if self.depth == 0 {
            PathBuf::from(name)
        } else {
            self.relative.join(name)
        }
    }
}

fn has_counterpart<'a, I>(mut names: I, name: &str, kind: EntryKind) -> bool
where
    I: Iterator<Item = (&'a str, EntryKind)>,
{
    names.any(|(other, other_kind)| other == name && other_kind == kind)
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Push/pull engine over a remote store and the local filesystem
///
/// ## Dependencies
///
/// - `index`: Remote listings and name lookup over the `IRemoteStore`
/// - `local_filesystem`: Local listing and file I/O
/// - `ignore_rules`: Entries excluded from both directions
/// - `comparator`: Newer-wins decisions for files present on both sides
pub struct SyncEngine {
    index: RemoteDirectoryIndex,
    local_filesystem: Arc<dyn ILocalFileSystem>,
    ignore_rules: IgnoreRuleSet,
    comparator: TimestampComparator,
    observer: Arc<dyn SyncObserver>,
    strict_pull: bool,
    dry_run: bool,
}

impl SyncEngine {
    /// Creates a new `SyncEngine` with the given dependencies
    ///
    /// # Arguments
    /// * `remote_store` - Remote tree operations (IRemoteStore)
    /// * `local_filesystem` - Local file operations (ILocalFileSystem)
    /// * `ignore_rules` - Rules loaded from the session's ignore file
    /// * `config` - Clock mode, strict pull resolution and dry run
    pub fn new(
        remote_store: Arc<dyn IRemoteStore>,
        local_filesystem: Arc<dyn ILocalFileSystem>,
        ignore_rules: IgnoreRuleSet,
        config: &SyncConfig,
    ) -> Self {
        Self {
            index: RemoteDirectoryIndex::new(remote_store),
            local_filesystem,
            ignore_rules,
            comparator: TimestampComparator::new(config.clock_mode),
            observer: Arc::new(NoopObserver),
            strict_pull: config.strict_pull,
            dry_run: config.dry_run,
        }
    }

    /// Replaces the progress observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Resolves the logical remote root and runs one push or pull
    ///
    /// Push always creates missing root folders. Pull does too unless the
    /// engine was configured with `strict_pull`.
    #[instrument(skip(self), fields(local = %local_root, remote = %remote_root))]
    pub async fn sync(
        &self,
        direction: SyncDirection,
        local_root: &SyncPath,
        remote_root: &LogicalPath,
    ) -> Result<SyncReport, SyncError> {
        let create_missing = match direction {
            SyncDirection::Push => true,
            SyncDirection::Pull => !self.strict_pull,
        };

        self.ensure_local_root(local_root).await?;

        let resolver = PathResolver::new(&self.index);
        let mut report = SyncReport {
            dry_run: self.dry_run,
            ..SyncReport::default()
        };

        let remote_id = if self.dry_run {
            match resolver.resolve(remote_root, false).await {
                Ok(id) => Some(id),
                Err(SyncError::PathNotFound { segment, resolved }) if create_missing => {
                    let existing = LogicalPath::parse(&resolved).segments().len();
                    let missing = remote_root.segments().len() - existing;
                    info!(%segment, missing, "Remote root would be created");
                    report.folders_created += u32::try_from(missing).unwrap_or(u32::MAX);
                    self.observer.on_event(&SyncEvent {
                        direction,
                        action: SyncAction::CreateFolder,
                        kind: EntryKind::Folder,
                        path: PathBuf::from(remote_root.to_string()),
                        depth: 0,
                        dry_run: true,
                    });
                    None
                }
                Err(err) => return Err(err),
            }
        } else {
            Some(resolver.resolve(remote_root, create_missing).await?)
        };

        info!(%direction, "Starting sync");
        let level = Level::root(local_root, remote_id);
        match direction {
            SyncDirection::Push => self.push_level(level, &mut report).await?,
            SyncDirection::Pull => self.pull_level(level, &mut report).await?,
        }
        info!(changes = report.changes(), "Sync complete");
        Ok(report)
    }

    /// Makes `remote_folder` mirror `local_root`
    ///
    /// # Errors
    /// `LocalPathMissing` if `local_root` does not exist; any transport or
    /// filesystem failure aborts the run.
    #[instrument(skip(self), fields(local = %local_root, remote = %remote_folder))]
    pub async fn push(
        &self,
        local_root: &SyncPath,
        remote_folder: &RemoteId,
    ) -> Result<SyncReport, SyncError> {
        self.ensure_local_root(local_root).await?;
        let mut report = SyncReport {
            dry_run: self.dry_run,
            ..SyncReport::default()
        };
        self.push_level(Level::root(local_root, Some(remote_folder.clone())), &mut report)
            .await?;
        Ok(report)
    }

    /// Makes `local_root` mirror `remote_folder`
    ///
    /// # Errors
    /// `LocalPathMissing` if `local_root` does not exist; any transport or
    /// filesystem failure aborts the run.
    #[instrument(skip(self), fields(local = %local_root, remote = %remote_folder))]
    pub async fn pull(
        &self,
        local_root: &SyncPath,
        remote_folder: &RemoteId,
    ) -> Result<SyncReport, SyncError> {
        self.ensure_local_root(local_root).await?;
        let mut report = SyncReport {
            dry_run: self.dry_run,
            ..SyncReport::default()
        };
        self.pull_level(Level::root(local_root, Some(remote_folder.clone())), &mut report)
            .await?;
        Ok(report)
    }

    async fn ensure_local_root(&self, local_root: &SyncPath) -> Result<(), SyncError> {
        let exists = self
            .local_filesystem
            .exists(local_root)
            .await
            .map_err(SyncError::local)?;
        if exists {
            Ok(())
        } else {
            Err(SyncError::LocalPathMissing(local_root.as_path().to_path_buf()))
        }
    }

    // ========================================================================
    // Push
    // ========================================================================

    fn push_level<'a>(&'a self, level: Level, report: &'a mut SyncReport) -> LevelFuture<'a> {
        Box::pin(async move {
            self.notify(
                SyncDirection::Push,
                SyncAction::EnterFolder,
                EntryKind::Folder,
                &level.relative,
                level.depth,
            );

            let local_entries = self.list_local(&level).await?;
            let remote_entries = self.list_remote(&level).await?;

            // Deletion pass
            for remote in &remote_entries {
                let names = local_entries.iter().map(|l| (l.name.as_str(), l.kind));
                if has_counterpart(names, &remote.name, remote.kind) {
                    continue;
                }
                debug!(
                    name = %remote.name,
                    kind = %remote.kind,
                    "Remote entry has no local counterpart"
                );
                self.delete_remote(remote).await?;
                report.remote_deletions += 1;
                self.notify_entry(
                    SyncDirection::Push,
                    SyncAction::Delete,
                    remote.kind,
                    &level,
                    &remote.name,
                );
            }

            // Creation/update pass
            for local in &local_entries {
                if self.ignore_rules.should_ignore(&local.name, local.kind) {
                    debug!(name = %local.name, "Ignored");
                    report.skipped_ignored += 1;
                    self.notify_entry(
                        SyncDirection::Push,
                        SyncAction::Ignore,
                        local.kind,
                        &level,
                        &local.name,
                    );
                    continue;
                }

                match local.kind {
                    EntryKind::Folder => {
                        let existing =
                            RemoteDirectoryIndex::find_folder_by_name(&remote_entries, &local.name);
                        let remote_id = match existing {
                            Some(folder) => Some(folder.id.clone()),
                            None => {
                                report.folders_created += 1;
                                self.notify_entry(
                                    SyncDirection::Push,
                                    SyncAction::CreateFolder,
                                    EntryKind::Folder,
                                    &level,
                                    &local.name,
                                );
                                self.create_remote_folder(&level, &local.name).await?
                            }
                        };
                        let child = level.child(&local.name, true, remote_id)?;
                        self.push_level(child, report).await?;
                    }
                    EntryKind::File => {
                        let existing = RemoteDirectoryIndex::find_by_name_and_kind(
                            &remote_entries,
                            &local.name,
                            EntryKind::File,
                        );
                        match existing {
                            None => {
                                self.upload(&level, local, None).await?;
                                report.files_uploaded += 1;
                            }
                            Some(remote) => {
                                let verdict = self
                                    .comparator
                                    .compare(&remote.modified_at, local.modified_at)?;
                                match verdict {
                                    Verdict::Local => {
                                        debug!(name = %local.name, "Local copy is newer");
                                        self.upload(&level, local, Some(remote)).await?;
                                        report.files_uploaded += 1;
                                    }
                                    Verdict::Remote | Verdict::Equal => {
                                        report.unchanged += 1;
                                        self.notify_entry(
                                            SyncDirection::Push,
                                            SyncAction::Unchanged,
                                            EntryKind::File,
                                            &level,
                                            &local.name,
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
            }

            Ok(())
        })
    }

    async fn create_remote_folder(
        &self,
        level: &Level,
        name: &str,
    ) -> Result<Option<RemoteId>, SyncError> {
        let Some(parent) = level.remote.as_ref().filter(|_| !self.dry_run) else {
            return Ok(None);
        };
        let created = self
            .index
            .store()
            .create_folder(parent, name)
            .await
            .with_context(|| format!("Failed to create remote folder '{name}'"))
            .map_err(SyncError::remote)?;
        debug!(name, id = %created.id, "Created remote folder");
        Ok(Some(created.id))
    }

    /// Uploads a local file as a fresh remote file, deleting `replaced` first
    async fn upload(
        &self,
        level: &Level,
        local: &LocalEntry,
        replaced: Option<&RemoteEntry>,
    ) -> Result<(), SyncError> {
        let action = if replaced.is_some() {
            SyncAction::Replace
        } else {
            SyncAction::Transfer
        };
        self.notify_entry(SyncDirection::Push, action, EntryKind::File, level, &local.name);

        let Some(parent) = level.remote.as_ref().filter(|_| !self.dry_run) else {
            return Ok(());
        };

        let path = level.local.join(&local.name)?;
        let data = self
            .local_filesystem
            .read_file(&path)
            .await
            .map_err(SyncError::local)?;

        if let Some(old) = replaced {
            self.delete_remote(old).await?;
        }

        let store = self.index.store();
        let created = store
            .create_file(parent, &local.name)
            .await
            .with_context(|| format!("Failed to create remote file '{}'", local.name))
            .map_err(SyncError::remote)?;
        store
            .upload_content(&created.id, &data)
            .await
            .with_context(|| format!("Failed to upload '{path}'"))
            .map_err(SyncError::remote)?;

        debug!(path = %path, bytes = data.len(), id = %created.id, "Uploaded");
        Ok(())
    }

    async fn delete_remote(&self, entry: &RemoteEntry) -> Result<(), SyncError> {
        if self.dry_run {
            return Ok(());
        }
        self.index
            .store()
            .delete(&entry.id)
            .await
            .with_context(|| format!("Failed to delete remote {} '{}'", entry.kind, entry.name))
            .map_err(SyncError::remote)
    }

    // ========================================================================
    // Pull
    // ========================================================================

    fn pull_level<'a>(&'a self, level: Level, report: &'a mut SyncReport) -> LevelFuture<'a> {
        Box::pin(async move {
            self.notify(
                SyncDirection::Pull,
                SyncAction::EnterFolder,
                EntryKind::Folder,
                &level.relative,
                level.depth,
            );

            let local_entries = self.list_local(&level).await?;
            let remote_entries = self.list_remote(&level).await?;

            // Deletion pass
            for local in &local_entries {
                let names = remote_entries.iter().map(|r| (r.name.as_str(), r.kind));
                if has_counterpart(names, &local.name, local.kind) {
                    continue;
                }
                if self.ignore_rules.should_ignore(&local.name, local.kind) {
                    debug!(name = %local.name, "Keeping ignored local entry");
                    continue;
                }
                debug!(
                    name = %local.name,
                    kind = %local.kind,
                    "Local entry has no remote counterpart"
                );
                self.delete_local(&level, local).await?;
                report.local_deletions += 1;
                self.notify_entry(
                    SyncDirection::Pull,
                    SyncAction::Delete,
                    local.kind,
                    &level,
                    &local.name,
                );
            }

            // Creation/update pass
            let mut seen: HashSet<(&str, EntryKind)> = HashSet::new();
            for remote in &remote_entries {
                if !seen.insert((remote.name.as_str(), remote.kind)) {
                    debug!(name = %remote.name, id = %remote.id, "Skipping duplicate remote entry");
                    continue;
                }

                if self.ignore_rules.should_ignore(&remote.name, remote.kind) {
                    debug!(name = %remote.name, "Ignored");
                    report.skipped_ignored += 1;
                    self.notify_entry(
                        SyncDirection::Pull,
                        SyncAction::Ignore,
                        remote.kind,
                        &level,
                        &remote.name,
                    );
                    continue;
                }

                // An ignored local entry of the other kind occupies the name
                let blocked = local_entries.iter().any(|l| {
                    l.name == remote.name
                        && l.kind != remote.kind
                        && self.ignore_rules.should_ignore(&l.name, l.kind)
                });
                if blocked {
                    warn!(
                        name = %remote.name,
                        kind = %remote.kind,
                        "Name taken by an ignored local entry, skipping"
                    );
                    report.skipped_ignored += 1;
                    self.notify_entry(
                        SyncDirection::Pull,
                        SyncAction::Ignore,
                        remote.kind,
                        &level,
                        &remote.name,
                    );
                    continue;
                }

                let local_path = match level.local.join(&remote.name) {
                    Ok(path) => path,
                    Err(err) => {
                        warn!(
                            name = %remote.name,
                            %err,
                            "Remote name cannot be used locally, skipping"
                        );
                        continue;
                    }
                };

                let local_match = local_entries
                    .iter()
                    .find(|l| l.name == remote.name && l.kind == remote.kind);

                match remote.kind {
                    EntryKind::Folder => {
                        let local_exists = local_match.is_some();
                        if !local_exists {
                            report.folders_created += 1;
                            self.notify_entry(
                                SyncDirection::Pull,
                                SyncAction::CreateFolder,
                                EntryKind::Folder,
                                &level,
                                &remote.name,
                            );
                            if !self.dry_run {
                                self.local_filesystem
                                    .create_directory(&local_path)
                                    .await
                                    .map_err(SyncError::local)?;
                            }
                        }
                        let child = level.child(
                            &remote.name,
                            local_exists || !self.dry_run,
                            Some(remote.id.clone()),
                        )?;
                        self.pull_level(child, report).await?;
                    }
                    EntryKind::File => match local_match {
                        None => {
                            self.download(&level, remote, &local_path, false).await?;
                            report.files_downloaded += 1;
                        }
                        Some(local) => {
                            let verdict = self
                                .comparator
                                .compare(&remote.modified_at, local.modified_at)?;
                            match verdict {
                                Verdict::Remote => {
                                    debug!(name = %remote.name, "Remote copy is newer");
                                    self.download(&level, remote, &local_path, true).await?;
                                    report.files_downloaded += 1;
                                }
                                Verdict::Local | Verdict::Equal => {
                                    report.unchanged += 1;
                                    self.notify_entry(
                                        SyncDirection::Pull,
                                        SyncAction::Unchanged,
                                        EntryKind::File,
                                        &level,
                                        &remote.name,
                                    );
                                }
                            }
                        }
                    },
                }
            }

            Ok(())
        })
    }

    /// Downloads a remote file, removing the stale local copy first when `replace`
    async fn download(
        &self,
        level: &Level,
        remote: &RemoteEntry,
        local_path: &SyncPath,
        replace: bool,
    ) -> Result<(), SyncError> {
        let action = if replace {
            SyncAction::Replace
        } else {
            SyncAction::Transfer
        };
        self.notify_entry(SyncDirection::Pull, action, EntryKind::File, level, &remote.name);

        if self.dry_run {
            return Ok(());
        }

        let data = self
            .index
            .store()
            .download_content(&remote.id)
            .await
            .with_context(|| format!("Failed to download '{}'", remote.name))
            .map_err(SyncError::remote)?;

        if replace {
            self.local_filesystem
                .remove_file(local_path)
                .await
                .map_err(SyncError::local)?;
        }
        self.local_filesystem
            .write_file(local_path, &data)
            .await
            .map_err(SyncError::local)?;

        debug!(path = %local_path, bytes = data.len(), "Downloaded");
        Ok(())
    }

    async fn delete_local(&self, level: &Level, local: &LocalEntry) -> Result<(), SyncError> {
        if self.dry_run {
            return Ok(());
        }
        let path = level.local.join(&local.name)?;
        let result = match local.kind {
            EntryKind::Folder => self.local_filesystem.remove_directory(&path).await,
            EntryKind::File => self.local_filesystem.remove_file(&path).await,
        };
        result.map_err(SyncError::local)
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    async fn list_local(&self, level: &Level) -> Result<Vec<LocalEntry>, SyncError> {
        if !level.local_exists {
            return Ok(Vec::new());
        }
        self.local_filesystem
            .list_dir(&level.local)
            .await
            .map_err(SyncError::local)
    }

    async fn list_remote(&self, level: &Level) -> Result<Vec<RemoteEntry>, SyncError> {
        match &level.remote {
            Some(id) => self.index.list_children(id).await,
            None => Ok(Vec::new()),
        }
    }

    fn notify_entry(
        &self,
        direction: SyncDirection,
        action: SyncAction,
        kind: EntryKind,
        level: &Level,
        name: &str,
    ) {
        self.notify(direction, action, kind, &level.relative_path(name), level.depth);
    }

    fn notify(
        &self,
        direction: SyncDirection,
        action: SyncAction,
        kind: EntryKind,
        path: &std::path::Path,
        depth: usize,
    ) {
        self.observer.on_event(&SyncEvent {
            direction,
            action,
            kind,
            path: path.to_path_buf(),
            depth,
            dry_run: self.dry_run,
        });
    }
}
