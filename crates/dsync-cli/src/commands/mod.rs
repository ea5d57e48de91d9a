//! CLI command implementations

pub mod configure;
pub mod sync;

use std::path::PathBuf;

use dsync_core::config::{Config, SessionPaths};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Settings shared by every command
pub struct CommandContext {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config: Config,
    /// Directory the command was started in; the project being synced
    pub project_root: PathBuf,
}

impl CommandContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn session_paths(&self) -> SessionPaths {
        SessionPaths::new(self.project_root.clone())
    }

    /// Whether free-form progress text should go to stdout
    pub fn shows_progress(&self) -> bool {
        self.format == OutputFormat::Human && !self.quiet
    }
}
