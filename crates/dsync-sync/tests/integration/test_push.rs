//! Push: local tree is authoritative.

use std::sync::Arc;

use dsync_core::domain::entry::{EntryKind, SyncDirection};
use dsync_core::domain::newtypes::{LogicalPath, RemoteId, SyncPath};
use dsync_sync::engine::SyncAction;
use dsync_sync::memory::StoreOperation;
use dsync_sync::SyncError;

use crate::common::{at, later, old, Fixture, RecordingObserver};

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_push_uploads_nested_tree() {
    let fx = Fixture::new();
    fx.write("a.txt", b"alpha", old());
    fx.write("docs/b.txt", b"beta", old());
    fx.write("docs/deep/c.txt", b"gamma", old());
    fx.mkdir("empty");

    let report = fx
        .engine("")
        .push(&fx.root(), &RemoteId::root())
        .await
        .expect("push failed");

    assert_eq!(report.folders_created, 3);
    assert_eq!(report.files_uploaded, 3);
    assert_eq!(report.remote_deletions, 0);
    assert_eq!(fx.store.content_at("a.txt").unwrap(), b"alpha");
    assert_eq!(fx.store.content_at("docs/b.txt").unwrap(), b"beta");
    assert_eq!(fx.store.content_at("docs/deep/c.txt").unwrap(), b"gamma");
    assert!(fx.store.lookup("empty").unwrap().is_folder());
}

#[tokio::test]
async fn test_second_push_makes_no_mutations() {
    let fx = Fixture::new();
    fx.write("a.txt", b"alpha", old());
    fx.write("docs/b.txt", b"beta", old());
    let engine = fx.engine("");

    engine.push(&fx.root(), &RemoteId::root()).await.unwrap();
    fx.store.clear_operations();
    let report = engine.push(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(fx.store.mutation_count(), 0);
    assert_eq!(report.changes(), 0);
    assert_eq!(report.unchanged, 2);
}

#[tokio::test]
async fn test_push_reuses_existing_remote_folder() {
    let fx = Fixture::new();
    let docs = fx.store.insert_folder(&RemoteId::root(), "docs").unwrap();
    fx.write("docs/b.txt", b"beta", old());

    let report = fx.engine("").push(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.folders_created, 0);
    assert_eq!(fx.store.child_names(&docs), vec!["b.txt"]);
    assert_eq!(fx.store.child_names(&RemoteId::root()), vec!["docs"]);
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_push_deletes_remote_entries_missing_locally() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "a", b"remote a", later()).unwrap();
    fx.store.insert_file(&RemoteId::root(), "b", b"remote b", later()).unwrap();
    fx.write("a", b"local a", old());

    let report = fx.engine("").push(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.remote_deletions, 1);
    assert_eq!(fx.store.child_names(&RemoteId::root()), vec!["a"]);
    let deletes = fx
        .store
        .operations()
        .into_iter()
        .filter(|op| *op == StoreOperation::Delete)
        .count();
    assert_eq!(deletes, 1);
    // The remote copy of `a` is newer and stays untouched.
    assert_eq!(fx.store.content_at("a").unwrap(), b"remote a");
}

#[tokio::test]
async fn test_push_deletes_remote_folder_subtree() {
    let fx = Fixture::new();
    let stale = fx.store.insert_folder(&RemoteId::root(), "stale").unwrap();
    fx.store.insert_file(&stale, "x.txt", b"x", later()).unwrap();

    fx.engine("").push(&fx.root(), &RemoteId::root()).await.unwrap();

    assert!(fx.store.child_names(&RemoteId::root()).is_empty());
    assert!(fx.store.lookup("stale/x.txt").is_none());
}

#[tokio::test]
async fn test_push_replaces_remote_entry_of_other_kind() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "docs", b"file", later()).unwrap();
    fx.write("docs/b.txt", b"beta", old());

    let report = fx.engine("").push(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.remote_deletions, 1);
    assert_eq!(report.folders_created, 1);
    let docs = fx.store.lookup("docs").unwrap();
    assert_eq!(docs.kind, EntryKind::Folder);
    assert_eq!(fx.store.content_at("docs/b.txt").unwrap(), b"beta");
}

// ============================================================================
// Ignore rules
// ============================================================================

#[tokio::test]
async fn test_ignored_file_is_never_uploaded() {
    let fx = Fixture::new();
    fx.write("secret.key", b"hunter2", old());
    fx.write("keys/nested.key", b"hunter3", old());
    fx.write("readme.md", b"hello", old());

    let report = fx
        .engine("*.key\n")
        .push(&fx.root(), &RemoteId::root())
        .await
        .unwrap();

    assert!(fx.store.lookup("secret.key").is_none());
    assert!(fx.store.lookup("keys/nested.key").is_none());
    assert!(fx.store.lookup("readme.md").is_some());
    assert_eq!(report.skipped_ignored, 2);
}

#[tokio::test]
async fn test_push_skips_ignored_folders() {
    let fx = Fixture::new();
    fx.write(".git/config", b"[core]", old());
    fx.write("build/out.bin", b"\x00", old());
    fx.write("src/main.rs", b"fn main() {}", old());

    fx.engine("/.git\n/build\n")
        .push(&fx.root(), &RemoteId::root())
        .await
        .unwrap();

    assert_eq!(fx.store.child_names(&RemoteId::root()), vec!["src"]);
}

#[tokio::test]
async fn test_ignore_rules_do_not_protect_remote_only_entries() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "old.log", b"", later()).unwrap();
    fx.store.insert_file(&RemoteId::root(), "kept.log", b"remote", later()).unwrap();
    fx.write("kept.log", b"local", old());

    fx.engine("*.log\n")
        .push(&fx.root(), &RemoteId::root())
        .await
        .unwrap();

    // `kept.log` has a local counterpart; `old.log` does not.
    assert_eq!(fx.store.child_names(&RemoteId::root()), vec!["kept.log"]);
    assert_eq!(fx.store.content_at("kept.log").unwrap(), b"remote");
}

// ============================================================================
// Newer-wins
// ============================================================================

#[tokio::test]
async fn test_newer_local_file_replaces_remote() {
    let fx = Fixture::new();
    fx.store
        .insert_file(&RemoteId::root(), "notes.txt", b"old", at(2023, 12, 31, 10, 0, 0))
        .unwrap();
    fx.write("notes.txt", b"new", at(2024, 1, 1, 10, 0, 0));

    let report = fx.engine("").push(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.files_uploaded, 1);
    assert_eq!(fx.store.content_at("notes.txt").unwrap(), b"new");
    assert_eq!(fx.store.child_names(&RemoteId::root()), vec!["notes.txt"]);
    assert_eq!(
        fx.store.operations(),
        vec![
            StoreOperation::List,
            StoreOperation::Delete,
            StoreOperation::CreateFile,
            StoreOperation::Upload,
        ]
    );
}

#[tokio::test]
async fn test_newer_remote_file_is_kept() {
    let fx = Fixture::new();
    fx.store
        .insert_file(&RemoteId::root(), "notes.txt", b"remote", at(2024, 3, 1, 0, 0, 0))
        .unwrap();
    fx.write("notes.txt", b"local", at(2024, 1, 1, 0, 0, 0));

    let report = fx.engine("").push(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(fx.store.mutation_count(), 0);
    assert_eq!(fx.store.content_at("notes.txt").unwrap(), b"remote");
}

#[tokio::test]
async fn test_equal_timestamps_are_unchanged() {
    let fx = Fixture::new();
    let t = at(2024, 2, 2, 2, 2, 2);
    fx.store.insert_file(&RemoteId::root(), "same.txt", b"remote", t).unwrap();
    fx.write("same.txt", b"local", t);

    let report = fx.engine("").push(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(fx.store.content_at("same.txt").unwrap(), b"remote");
}

// ============================================================================
// Errors and orchestration
// ============================================================================

#[tokio::test]
async fn test_push_missing_local_root() {
    let fx = Fixture::new();
    let missing = SyncPath::new(fx.path("nope")).unwrap();

    let err = fx
        .engine("")
        .push(&missing, &RemoteId::root())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::LocalPathMissing(_)));
    assert!(fx.store.operations().is_empty());
}

#[tokio::test]
async fn test_push_aborts_on_first_transport_failure() {
    let fx = Fixture::new();
    fx.write("a.txt", b"a", old());
    fx.write("b.txt", b"b", old());
    fx.store.fail_on(StoreOperation::Upload);

    let err = fx
        .engine("")
        .push(&fx.root(), &RemoteId::root())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::RemoteTransport(_)));
    assert!(err.to_string().contains("Failed to upload"));
    // Aborted after the first file was created.
    assert_eq!(fx.store.child_names(&RemoteId::root()), vec!["a.txt"]);
}

#[tokio::test]
async fn test_sync_push_creates_logical_root() {
    let fx = Fixture::new();
    fx.write("a.txt", b"alpha", old());

    let report = fx
        .engine("")
        .sync(SyncDirection::Push, &fx.root(), &LogicalPath::parse("/backup/site"))
        .await
        .unwrap();

    assert_eq!(report.files_uploaded, 1);
    assert_eq!(fx.store.content_at("backup/site/a.txt").unwrap(), b"alpha");
}

#[tokio::test]
async fn test_push_events_follow_tree_order() {
    let fx = Fixture::new();
    fx.write("a.txt", b"a", old());
    fx.write("docs/b.txt", b"b", old());
    fx.write("z.key", b"z", old());
    let observer = Arc::new(RecordingObserver::default());

    fx.engine("*.key")
        .with_observer(observer.clone())
        .push(&fx.root(), &RemoteId::root())
        .await
        .unwrap();

    assert_eq!(
        observer.actions(),
        vec![
            (SyncAction::Transfer, "a.txt".to_string()),
            (SyncAction::CreateFolder, "docs".to_string()),
            (SyncAction::Transfer, "docs/b.txt".to_string()),
            (SyncAction::Ignore, "z.key".to_string()),
        ]
    );

    let entered: Vec<_> = observer
        .events()
        .into_iter()
        .filter(|e| e.action == SyncAction::EnterFolder)
        .map(|e| (e.path.display().to_string(), e.depth))
        .collect();
    assert_eq!(entered, vec![(".".to_string(), 0), ("docs".to_string(), 1)]);
}
