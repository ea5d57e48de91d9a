//! Pull: remote tree is authoritative.

use dsync_core::config::SyncConfig;
use dsync_core::domain::entry::SyncDirection;
use dsync_core::domain::newtypes::{LogicalPath, RemoteId};
use dsync_sync::SyncError;

use crate::common::{at, later, old, Fixture};

#[tokio::test]
async fn test_pull_downloads_nested_tree() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "a.txt", b"alpha", later()).unwrap();
    let docs = fx.store.insert_folder(&RemoteId::root(), "docs").unwrap();
    fx.store.insert_file(&docs, "b.txt", b"beta", later()).unwrap();
    fx.store.insert_folder(&docs, "empty").unwrap();

    let report = fx
        .engine("")
        .pull(&fx.root(), &RemoteId::root())
        .await
        .expect("pull failed");

    assert_eq!(report.files_downloaded, 2);
    assert_eq!(report.folders_created, 2);
    assert_eq!(fx.read("a.txt"), b"alpha");
    assert_eq!(fx.read("docs/b.txt"), b"beta");
    assert!(fx.path("docs/empty").is_dir());
    assert_eq!(fx.store.mutation_count(), 0);
}

#[tokio::test]
async fn test_second_pull_changes_nothing() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "a.txt", b"alpha", later()).unwrap();
    let engine = fx.engine("");

    engine.pull(&fx.root(), &RemoteId::root()).await.unwrap();
    let report = engine.pull(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.changes(), 0);
    assert_eq!(report.unchanged, 1);
}

#[tokio::test]
async fn test_pull_deletes_local_entries_missing_remotely() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "a.txt", b"remote", old()).unwrap();
    fx.write("a.txt", b"local", later());
    fx.write("stale.txt", b"gone", old());
    fx.write("stale_dir/inner.txt", b"gone", old());

    let report = fx.engine("").pull(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.local_deletions, 2);
    assert_eq!(fx.names(""), vec!["a.txt"]);
    assert_eq!(fx.read("a.txt"), b"local");
}

#[tokio::test]
async fn test_pull_keeps_ignored_local_entries() {
    let fx = Fixture::new();
    fx.write(".dsync/remote_root.txt", b"site", old());
    fx.write(".git/config", b"[core]", old());
    fx.write("debug.log", b"trace", old());
    fx.write("notes.txt", b"bye", old());

    fx.engine("/.dsync\n/.git\n*.log\n")
        .pull(&fx.root(), &RemoteId::root())
        .await
        .unwrap();

    assert_eq!(fx.names(""), vec![".dsync", ".git", "debug.log"]);
}

#[tokio::test]
async fn test_pull_skips_ignored_remote_entries() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "cache.tmp", b"x", later()).unwrap();
    let venv = fx.store.insert_folder(&RemoteId::root(), "venv").unwrap();
    fx.store.insert_file(&venv, "lib.py", b"x", later()).unwrap();
    fx.store.insert_file(&RemoteId::root(), "main.py", b"print()", later()).unwrap();

    let report = fx
        .engine("*.tmp\n/venv\n")
        .pull(&fx.root(), &RemoteId::root())
        .await
        .unwrap();

    assert_eq!(report.skipped_ignored, 2);
    assert_eq!(fx.names(""), vec!["main.py"]);
}

#[tokio::test]
async fn test_older_remote_file_leaves_local_alone() {
    let fx = Fixture::new();
    fx.store
        .insert_file(&RemoteId::root(), "notes.txt", b"remote", at(2023, 12, 31, 10, 0, 0))
        .unwrap();
    fx.write("notes.txt", b"local", at(2024, 1, 1, 10, 0, 0));

    let report = fx.engine("").pull(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.changes(), 0);
    assert_eq!(report.unchanged, 1);
    assert_eq!(fx.read("notes.txt"), b"local");
}

#[tokio::test]
async fn test_newer_remote_file_replaces_local() {
    let fx = Fixture::new();
    fx.store
        .insert_file(&RemoteId::root(), "notes.txt", b"remote", at(2024, 3, 1, 0, 0, 0))
        .unwrap();
    fx.write("notes.txt", b"local", at(2024, 1, 1, 0, 0, 0));

    let report = fx.engine("").pull(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.files_downloaded, 1);
    assert_eq!(fx.read("notes.txt"), b"remote");
}

#[tokio::test]
async fn test_pull_first_duplicate_remote_name_wins() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "dup.txt", b"first", later()).unwrap();
    fx.store.insert_file(&RemoteId::root(), "dup.txt", b"second", later()).unwrap();

    let report = fx.engine("").pull(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.files_downloaded, 1);
    assert_eq!(fx.read("dup.txt"), b"first");
}

#[tokio::test]
async fn test_pull_skips_remote_names_with_slash() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "a/b.txt", b"x", later()).unwrap();
    fx.store.insert_file(&RemoteId::root(), "ok.txt", b"y", later()).unwrap();

    let report = fx.engine("").pull(&fx.root(), &RemoteId::root()).await.unwrap();

    assert_eq!(report.files_downloaded, 1);
    assert_eq!(fx.names(""), vec!["ok.txt"]);
}

#[tokio::test]
async fn test_pull_replaces_local_folder_with_remote_file() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "docs", b"now a file", later()).unwrap();
    fx.write("docs/inner.txt", b"x", old());

    fx.engine("").pull(&fx.root(), &RemoteId::root()).await.unwrap();

    assert!(fx.path("docs").is_file());
    assert_eq!(fx.read("docs"), b"now a file");
}

#[tokio::test]
async fn test_pull_leaves_ignored_local_file_shadowing_remote_folder() {
    let fx = Fixture::new();
    let build = fx.store.insert_folder(&RemoteId::root(), "build").unwrap();
    fx.store.insert_file(&build, "out.bin", b"x", later()).unwrap();
    fx.store.insert_file(&RemoteId::root(), "zz.txt", b"last", later()).unwrap();
    fx.write("build", b"local notes", old());

    let report = fx
        .engine("build\n")
        .pull(&fx.root(), &RemoteId::root())
        .await
        .unwrap();

    assert_eq!(report.files_downloaded, 1);
    assert_eq!(report.skipped_ignored, 1);
    assert!(fx.path("build").is_file());
    assert_eq!(fx.read("build"), b"local notes");
    assert_eq!(fx.read("zz.txt"), b"last");
}

#[tokio::test]
async fn test_pull_leaves_ignored_local_folder_shadowing_remote_file() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "cache", b"remote", later()).unwrap();
    fx.store.insert_file(&RemoteId::root(), "main.py", b"print()", later()).unwrap();
    fx.write("cache/entry", b"kept", old());

    fx.engine("/cache\n")
        .pull(&fx.root(), &RemoteId::root())
        .await
        .unwrap();

    assert!(fx.path("cache").is_dir());
    assert_eq!(fx.read("cache/entry"), b"kept");
    assert_eq!(fx.read("main.py"), b"print()");
}

#[tokio::test]
async fn test_strict_pull_fails_on_missing_root() {
    let fx = Fixture::new();
    fx.store.insert_folder(&RemoteId::root(), "backup").unwrap();
    let engine = fx.engine_with(
        "",
        SyncConfig {
            strict_pull: true,
            ..SyncConfig::default()
        },
    );

    let err = engine
        .sync(SyncDirection::Pull, &fx.root(), &LogicalPath::parse("backup/site"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::PathNotFound { ref segment, .. } if segment == "site"));
    assert_eq!(fx.store.mutation_count(), 0);
}

#[tokio::test]
async fn test_pull_creates_missing_root_by_default() {
    let fx = Fixture::new();

    let report = fx
        .engine("")
        .sync(SyncDirection::Pull, &fx.root(), &LogicalPath::parse("backup/site"))
        .await
        .unwrap();

    assert_eq!(report.changes(), 0);
    assert!(fx.store.lookup("backup/site").unwrap().is_folder());
}

#[tokio::test]
async fn test_pull_download_failure_is_transport_error() {
    let fx = Fixture::new();
    fx.store.insert_file(&RemoteId::root(), "a.txt", b"alpha", later()).unwrap();
    fx.store.fail_on(dsync_sync::memory::StoreOperation::Download);

    let err = fx
        .engine("")
        .pull(&fx.root(), &RemoteId::root())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::RemoteTransport(_)));
    assert!(!fx.exists("a.txt"));
}
