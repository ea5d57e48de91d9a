//! DSync CLI - Command-line interface for DSync
//!
//! Provides commands for:
//! - Configuring a project directory and its Google Drive credentials
//! - Pushing the project to its remote folder
//! - Pulling the remote folder into the project

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dsync_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    configure::ConfigureCommand,
    sync::{PullCommand, PushCommand},
    CommandContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "dsync", version, about = "Mirror a project directory with Google Drive")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Defaults to `configure`
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Configure Drive authentication and the remote root for this directory
    Configure(ConfigureCommand),
    /// Make the remote folder mirror this directory
    Push(PushCommand),
    /// Make this directory mirror the remote folder
    Pull(PullCommand),
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration:\n  {}", details.join("\n  "));
    }
    Ok(config)
}

fn log_filter(verbose: u8, quiet: bool, configured: &str) -> String {
    match (verbose, quiet) {
        (0, true) => "error".to_string(),
        (0, false) => configured.to_string(),
        (1, _) => "info".to_string(),
        (2, _) => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    // Setup tracing
    let filter = log_filter(cli.verbose, cli.quiet, &config.logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let ctx = CommandContext {
        format,
        quiet: cli.quiet,
        config,
        project_root: std::env::current_dir().context("Failed to read the current directory")?,
    };

    match cli.command {
        None => ConfigureCommand::default().execute(&ctx).await,
        Some(Commands::Configure(cmd)) => cmd.execute(&ctx).await,
        Some(Commands::Push(cmd)) => cmd.execute(&ctx).await,
        Some(Commands::Pull(cmd)) => cmd.execute(&ctx).await,
    }
}
