//! Push and pull commands - Mirror the project to or from Google Drive
//!
//! Both commands:
//! 1. Load the session directory (remote root, ignore rules)
//! 2. Open a Drive session with the stored credentials
//! 3. Run the SyncEngine from the current directory and print progress
//! 4. Print a summary of what changed

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use dsync_core::domain::entry::SyncDirection;
use dsync_core::domain::newtypes::SyncPath;
use dsync_core::ports::remote_store::ISessionProvider;
use dsync_drive::session::DriveSessionProvider;
use dsync_sync::engine::{NoopObserver, SyncEngine, SyncObserver};
use dsync_sync::filesystem::LocalFileSystemAdapter;
use dsync_sync::session::SessionConfig;
use tracing::info;

use super::CommandContext;
use crate::output::{report_json, summary_lines, sync_header, OutputFormat, ProgressPrinter};

/// Make the remote folder mirror the project directory
#[derive(Debug, Args)]
pub struct PushCommand {
    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,
}

impl PushCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        run(ctx, SyncDirection::Push, self.dry_run, false).await
    }
}

/// Make the project directory mirror the remote folder
#[derive(Debug, Args)]
pub struct PullCommand {
    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Fail if the remote root does not exist instead of creating it
    #[arg(long)]
    pub strict: bool,
}

impl PullCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        run(ctx, SyncDirection::Pull, self.dry_run, self.strict).await
    }
}

async fn run(
    ctx: &CommandContext,
    direction: SyncDirection,
    dry_run: bool,
    strict: bool,
) -> Result<()> {
    let fmt = ctx.formatter();
    let progress = ctx.shows_progress();

    if progress {
        println!("{}", sync_header(direction));
        println!("\nAuthenticate...");
    }

    let paths = ctx.session_paths();
    let session = SessionConfig::load(&paths).await?;
    let provider = DriveSessionProvider::new(paths, ctx.config.drive.clone());
    let remote = provider.open_session().await?;

    let mut sync_config = ctx.config.sync.clone();
    sync_config.dry_run |= dry_run;
    sync_config.strict_pull |= strict;

    let observer: Arc<dyn SyncObserver> = if progress {
        Arc::new(ProgressPrinter)
    } else {
        Arc::new(NoopObserver)
    };

    let engine = SyncEngine::new(
        remote,
        Arc::new(LocalFileSystemAdapter::new()),
        session.ignore_rules,
        &sync_config,
    )
    .with_observer(observer);

    if engine.is_dry_run() {
        fmt.info("Dry run mode - no changes will be made");
    }

    let local_root = SyncPath::new(ctx.project_root.clone())
        .context("Project directory is not a valid sync root")?;

    info!(%direction, remote_root = %session.remote_root, "Running sync");
    let report = engine
        .sync(direction, &local_root, &session.remote_root)
        .await?;

    if ctx.format == OutputFormat::Json {
        fmt.print_json(&report_json(direction, ctx.project_root.as_path(), &report));
        return Ok(());
    }

    if progress {
        println!();
    }
    match (report.changes(), report.dry_run) {
        (0, _) => fmt.success("Already up to date"),
        (n, true) => fmt.success(&format!("Dry run completed, {n} change(s) planned")),
        (n, false) => fmt.success(&format!("Sync completed, {n} change(s) applied")),
    }
    for line in summary_lines(&report) {
        fmt.info(&line);
    }
    Ok(())
}
