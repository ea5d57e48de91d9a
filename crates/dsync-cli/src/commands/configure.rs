//! Configure command - Set up a project directory for synchronization
//!
//! Provides the `dsync configure` CLI command which:
//! 1. On first run, logs in with the `client_secrets.json` found in the
//!    project directory and creates `.dsync/` around it
//! 2. On later runs, checks that the stored credentials still work and
//!    logs in again if they do not
//! 3. Shows the remote root and optionally replaces it

use anyhow::{Context, Result};
use clap::Args;
use dsync_core::config::{SessionPaths, CLIENT_SECRETS_FILE};
use dsync_core::domain::newtypes::LogicalPath;
use dsync_core::ports::remote_store::ISessionProvider;
use dsync_drive::session::DriveSessionProvider;
use dsync_drive::DriveError;
use dsync_sync::ignore::IgnoreRuleSet;
use dsync_sync::session;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::info;

use super::CommandContext;
use crate::output::OutputFormatter;

#[derive(Debug, Default, Args)]
pub struct ConfigureCommand {
    /// Set the remote root path without prompting, e.g. `backup/my-project`
    #[arg(long)]
    pub remote_root: Option<String>,
}

impl ConfigureCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let fmt = ctx.formatter();
        let paths = ctx.session_paths();
        let provider = DriveSessionProvider::new(paths.clone(), ctx.config.drive.clone());

        if ctx.shows_progress() {
            println!("\nGOOGLE DRIVE SYNCHRONIZATION - Configuration");
            println!("--------------------------------------------");
            println!("\nTesting the authentication...");
        }

        if session::is_initialized(&paths).await? {
            self.check_credentials(&provider, &paths, &*fmt).await?;
        } else {
            self.first_configuration(&provider, &paths, &*fmt).await?;
        }

        self.update_remote_root(ctx, &paths, &*fmt).await?;

        IgnoreRuleSet::load(&paths.ignore_file())
            .await
            .context("Failed to read the ignore rules")?;

        fmt.success("Project configured");
        Ok(())
    }

    async fn first_configuration(
        &self,
        provider: &DriveSessionProvider,
        paths: &SessionPaths,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let pending = paths.project_root().join(CLIENT_SECRETS_FILE);
        if !tokio::fs::try_exists(&pending).await? {
            // Produces the error naming the missing file
            session::initialize(paths).await?;
        }

        fmt.info("Opening browser for Google login...");
        let tokens = provider.login(&pending).await.context("OAuth2 login failed")?;

        session::initialize(paths)
            .await
            .context("Failed to create the session directory")?;
        provider
            .save_tokens(&tokens)
            .await
            .context("Failed to store credentials")?;

        info!(project = %paths.project_root().display(), "Project initialized");
        fmt.success("Authenticated with Google Drive");
        Ok(())
    }

    async fn check_credentials(
        &self,
        provider: &DriveSessionProvider,
        paths: &SessionPaths,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        match provider.open_session().await {
            Ok(_) => {
                fmt.success("Stored credentials are valid");
                Ok(())
            }
            Err(e) if needs_login(&e) => {
                info!(reason = %e, "Stored credentials unusable, logging in again");
                fmt.info("Opening browser for Google login...");
                let tokens = provider
                    .login(&paths.client_secrets())
                    .await
                    .context("OAuth2 login failed")?;
                provider
                    .save_tokens(&tokens)
                    .await
                    .context("Failed to store credentials")?;
                fmt.success("Authenticated with Google Drive");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn update_remote_root(
        &self,
        ctx: &CommandContext,
        paths: &SessionPaths,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let current = session::read_remote_root(paths).await?;
        fmt.info(&format!(
            "Current remote root repository in your Google Drive: {current}"
        ));

        let new_root = match &self.remote_root {
            Some(root) => Some(LogicalPath::parse(root)),
            None if ctx.format == crate::output::OutputFormat::Human => prompt_remote_root().await?,
            None => None,
        };

        if let Some(root) = new_root {
            session::save_remote_root(paths, &root).await?;
            fmt.success(&format!("Remote root set to {root}"));
        }
        Ok(())
    }
}

/// Whether `err` means the user has to go through the browser login again
fn needs_login(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::AuthenticationRequired(_))
    )
}

/// Interprets an answer to a yes/no question; `None` asks again
fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

async fn ask(lines: &mut Lines<BufReader<Stdin>>, question: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;
    Ok(lines.next_line().await?)
}

/// Asks whether to change the remote root and for the new value
///
/// End of input counts as "no".
async fn prompt_remote_root() -> Result<Option<LogicalPath>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let Some(answer) = ask(&mut lines, "Update the current remote root path ? (y/n): ").await?
        else {
            return Ok(None);
        };
        match parse_yes_no(&answer) {
            Some(true) => break,
            Some(false) => return Ok(None),
            None => continue,
        }
    }

    let Some(path) = ask(&mut lines, "New remote root path: ").await? else {
        return Ok(None);
    };
    Ok(Some(LogicalPath::parse(path.trim())))
}
