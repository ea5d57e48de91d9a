//! In-memory implementation of [`IRemoteStore`] for tests.
//!
//! Compiled for this crate's own tests and, through the `test-support`
//! feature, for integration tests.
//!
//! The store behaves like a Drive folder tree: names are not unique, IDs
//! are opaque, deleting a folder removes its subtree, and trashed entries
//! are hidden from listings. Modification times come from a clock that
//! tests can pin and advance.

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail};
use chrono::{DateTime, Duration, Utc};
use dsync_core::domain::entry::{EntryKind, RemoteEntry};
use dsync_core::domain::newtypes::RemoteId;
use dsync_core::ports::remote_store::IRemoteStore;

/// Remote timestamp layout, millisecond precision with a `Z` suffix.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Operations recorded by the store, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    List,
    CreateFolder,
    CreateFile,
    Upload,
    Download,
    Delete,
}

impl StoreOperation {
    /// Whether the operation changes the remote tree.
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::List | Self::Download)
    }
}

#[derive(Debug, Clone)]
struct Node {
    id: RemoteId,
    parent: RemoteId,
    name: String,
    kind: EntryKind,
    modified_at: DateTime<Utc>,
    content: Vec<u8>,
    trashed: bool,
}

impl Node {
    fn to_entry(&self) -> RemoteEntry {
        RemoteEntry {
            name: self.name.clone(),
            kind: self.kind,
            id: self.id.clone(),
            modified_at: self.modified_at.format(TIMESTAMP_FORMAT).to_string(),
            trashed: self.trashed,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    nodes: Vec<Node>,
    next_id: u64,
    clock: Option<DateTime<Utc>>,
    operations: Vec<StoreOperation>,
    fail_on: Option<StoreOperation>,
}

impl State {
    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn allocate_id(&mut self) -> anyhow::Result<RemoteId> {
        self.next_id += 1;
        Ok(RemoteId::new(format!("mem-{}", self.next_id))?)
    }

    fn is_folder(&self, id: &RemoteId) -> bool {
        id.is_root()
            || self
                .nodes
                .iter()
                .any(|node| &node.id == id && node.kind == EntryKind::Folder)
    }

    fn record(&mut self, operation: StoreOperation) -> anyhow::Result<()> {
        if self.fail_on == Some(operation) {
            bail!("injected failure on {operation:?}");
        }
        self.operations.push(operation);
        Ok(())
    }

    fn insert(
        &mut self,
        parent: &RemoteId,
        name: &str,
        kind: EntryKind,
        content: Vec<u8>,
        modified_at: DateTime<Utc>,
    ) -> anyhow::Result<RemoteEntry> {
        if !self.is_folder(parent) {
            bail!("parent folder {parent} does not exist");
        }
        let node = Node {
            id: self.allocate_id()?,
            parent: parent.clone(),
            name: name.to_string(),
            kind,
            modified_at,
            content,
            trashed: false,
        };
        let entry = node.to_entry();
        self.nodes.push(node);
        Ok(entry)
    }

    fn node_mut(&mut self, id: &RemoteId) -> anyhow::Result<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|node| &node.id == id)
            .ok_or_else(|| anyhow!("remote entry {id} not found"))
    }
}

/// In-memory remote folder tree rooted at [`RemoteId::root`].
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<State>,
}

impl InMemoryRemoteStore {
    /// Create an empty store containing only the root folder.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- clock ---

    /// Pin the clock used for modification times.
    pub fn set_clock(&self, now: DateTime<Utc>) {
        self.state().clock = Some(now);
    }

    /// Move the pinned clock forward (pins it to the current time first if unset).
    pub fn advance_clock(&self, by: Duration) {
        let mut state = self.state();
        let now = state.now();
        state.clock = Some(now + by);
    }

    // --- seeding ---

    /// Add a folder without recording an operation.
    pub fn insert_folder(&self, parent: &RemoteId, name: &str) -> anyhow::Result<RemoteId> {
        let mut state = self.state();
        let now = state.now();
        Ok(state
            .insert(parent, name, EntryKind::Folder, Vec::new(), now)?
            .id)
    }

    /// Add a file with explicit content and modification time without
    /// recording an operation.
    pub fn insert_file(
        &self,
        parent: &RemoteId,
        name: &str,
        content: &[u8],
        modified_at: DateTime<Utc>,
    ) -> anyhow::Result<RemoteId> {
        let mut state = self.state();
        Ok(state
            .insert(parent, name, EntryKind::File, content.to_vec(), modified_at)?
            .id)
    }

    /// Move an entry to the trash; it stays in the store but is no longer listed.
    pub fn trash(&self, id: &RemoteId) -> anyhow::Result<()> {
        self.state().node_mut(id)?.trashed = true;
        Ok(())
    }

    /// Make every subsequent call of `operation` fail.
    pub fn fail_on(&self, operation: StoreOperation) {
        self.state().fail_on = Some(operation);
    }

    // --- inspection ---

    /// Non-trashed children of `parent`, in insertion order.
    pub fn children(&self, parent: &RemoteId) -> Vec<RemoteEntry> {
        self.state()
            .nodes
            .iter()
            .filter(|node| &node.parent == parent && !node.trashed)
            .map(Node::to_entry)
            .collect()
    }

    /// Sorted names of the non-trashed children of `parent`.
    pub fn child_names(&self, parent: &RemoteId) -> Vec<String> {
        let mut names: Vec<String> = self
            .children(parent)
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        names.sort();
        names
    }

    /// Walk a slash-separated path of non-trashed entries from the root.
    pub fn lookup(&self, path: &str) -> Option<RemoteEntry> {
        let mut current: Option<RemoteEntry> = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let parent = current.as_ref().map_or_else(RemoteId::root, |e| e.id.clone());
            current = Some(
                self.children(&parent)
                    .into_iter()
                    .find(|entry| entry.name == segment)?,
            );
        }
        current
    }

    /// Content of the file at `path`, if there is one.
    pub fn content_at(&self, path: &str) -> Option<Vec<u8>> {
        let entry = self.lookup(path)?;
        let state = self.state();
        state
            .nodes
            .iter()
            .find(|node| node.id == entry.id && node.kind == EntryKind::File)
            .map(|node| node.content.clone())
    }

    /// Every recorded operation, in call order.
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.state().operations.clone()
    }

    /// Number of recorded operations that changed the tree.
    pub fn mutation_count(&self) -> usize {
        self.state()
            .operations
            .iter()
            .filter(|op| op.is_mutation())
            .count()
    }

    pub fn clear_operations(&self) {
        self.state().operations.clear();
    }
}

#[async_trait::async_trait]
impl IRemoteStore for InMemoryRemoteStore {
    async fn list_children(&self, folder_id: &RemoteId) -> anyhow::Result<Vec<RemoteEntry>> {
        let mut state = self.state();
        state.record(StoreOperation::List)?;
        if !state.is_folder(folder_id) {
            bail!("folder {folder_id} not found");
        }
        Ok(state
            .nodes
            .iter()
            .filter(|node| &node.parent == folder_id && !node.trashed)
            .map(Node::to_entry)
            .collect())
    }

    async fn create_folder(
        &self,
        parent_id: &RemoteId,
        name: &str,
    ) -> anyhow::Result<RemoteEntry> {
        let mut state = self.state();
        state.record(StoreOperation::CreateFolder)?;
        let now = state.now();
        state.insert(parent_id, name, EntryKind::Folder, Vec::new(), now)
    }

    async fn create_file(&self, parent_id: &RemoteId, name: &str) -> anyhow::Result<RemoteEntry> {
        let mut state = self.state();
        state.record(StoreOperation::CreateFile)?;
        let now = state.now();
        state.insert(parent_id, name, EntryKind::File, Vec::new(), now)
    }

    async fn upload_content(&self, file_id: &RemoteId, data: &[u8]) -> anyhow::Result<()> {
        let mut state = self.state();
        state.record(StoreOperation::Upload)?;
        let now = state.now();
        let node = state.node_mut(file_id)?;
        if node.kind != EntryKind::File {
            bail!("{file_id} is a folder");
        }
        node.content = data.to_vec();
        node.modified_at = now;
        Ok(())
    }

    async fn download_content(&self, file_id: &RemoteId) -> anyhow::Result<Vec<u8>> {
        let mut state = self.state();
        state.record(StoreOperation::Download)?;
        let node = state.node_mut(file_id)?;
        if node.kind != EntryKind::File {
            bail!("{file_id} is a folder");
        }
        Ok(node.content.clone())
    }

    async fn delete(&self, id: &RemoteId) -> anyhow::Result<()> {
        let mut state = self.state();
        state.record(StoreOperation::Delete)?;
        if !state.nodes.iter().any(|node| &node.id == id) {
            bail!("remote entry {id} not found");
        }

        let mut doomed = vec![id.clone()];
        let mut index = 0;
        while index < doomed.len() {
            let current = doomed[index].clone();
            doomed.extend(
                state
                    .nodes
                    .iter()
                    .filter(|node| node.parent == current)
                    .map(|node| node.id.clone()),
            );
            index += 1;
        }
        state.nodes.retain(|node| !doomed.contains(&node.id));
        Ok(())
    }
}
