//! Configuration module for DSync.
//!
//! Two layers of configuration exist:
//! - [`Config`], the optional per-user YAML file with engine and transport
//!   tunables, loaded with defaults, validation and a builder.
//! - [`SessionPaths`], the fixed layout of the per-project `.dsync`
//!   directory holding credentials, the remote root and the ignore rules.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for DSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub drive: DriveConfig,
    pub logging: LoggingConfig,
}

/// How a local modification time is turned into calendar fields before it
/// is compared with a remote timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Both sides are compared in UTC.
    #[default]
    Utc,
    /// The local time is rendered in the machine's wall clock while the
    /// remote stays in UTC. Off by the UTC offset; kept for compatibility.
    LocalWallClock,
}

/// Synchronization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Clock used for local timestamps in newer-wins comparisons.
    pub clock_mode: ClockMode,
    /// When true, `pull` fails on a missing remote root segment instead
    /// of creating it.
    pub strict_pull: bool,
    /// Report what would change without touching either side.
    pub dry_run: bool,
}

/// Google Drive transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Base URL of the Drive REST API.
    pub base_url: String,
    /// OAuth authorization endpoint.
    pub auth_url: String,
    /// OAuth token endpoint.
    pub token_url: String,
    /// Loopback port the interactive login listens on.
    pub callback_port: u16,
    /// Attempts after the first for throttled or 5xx responses.
    pub max_retries: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/dsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dsync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Production Drive API endpoint.
pub const DEFAULT_DRIVE_BASE_URL: &str = "https://www.googleapis.com";

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DRIVE_BASE_URL.to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            callback_port: 8080,
            max_retries: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"drive.base_url"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `drive.max_retries`; backoff doubles per attempt.
const MAX_RETRIES_LIMIT: u32 = 10;

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- drive ---
        for (field, value) in [
            ("drive.base_url", &self.drive.base_url),
            ("drive.auth_url", &self.drive.auth_url),
            ("drive.token_url", &self.drive.token_url),
        ] {
            if !is_http_url(value) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("must be an http(s) URL, got '{value}'"),
                });
            }
        }
        if self.drive.callback_port == 0 {
            errors.push(ValidationError {
                field: "drive.callback_port".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.drive.max_retries > MAX_RETRIES_LIMIT {
            errors.push(ValidationError {
                field: "drive.max_retries".into(),
                message: format!("must be at most {MAX_RETRIES_LIMIT}"),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "must be one of {}, got '{}'",
                    VALID_LOG_LEVELS.join(", "),
                    self.logging.level
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_clock_mode(mut self, mode: ClockMode) -> Self {
        self.config.sync.clock_mode = mode;
        self
    }

    pub fn sync_strict_pull(mut self, strict: bool) -> Self {
        self.config.sync.strict_pull = strict;
        self
    }

    pub fn sync_dry_run(mut self, dry_run: bool) -> Self {
        self.config.sync.dry_run = dry_run;
        self
    }

    // --- drive ---

    pub fn drive_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive.base_url = url.into();
        self
    }

    pub fn drive_auth_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive.auth_url = url.into();
        self
    }

    pub fn drive_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive.token_url = url.into();
        self
    }

    pub fn drive_callback_port(mut self, port: u16) -> Self {
        self.config.drive.callback_port = port;
        self
    }

    pub fn drive_max_retries(mut self, n: u32) -> Self {
        self.config.drive.max_retries = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Per-project session layout
// ---------------------------------------------------------------------------

/// Name of the per-project state directory.
pub const SESSION_DIR: &str = ".dsync";
/// OAuth client registration, as downloaded from the provider console.
pub const CLIENT_SECRETS_FILE: &str = "client_secrets.json";
/// Stored OAuth tokens.
pub const CREDENTIALS_FILE: &str = "credentials.json";
/// One line holding the logical remote root path.
pub const REMOTE_ROOT_FILE: &str = "remote_root.txt";
/// Ignore rules, one per line.
pub const IGNORE_FILE: &str = "ignore.txt";

/// File locations inside a project's `.dsync` directory.
///
/// Pure path arithmetic; nothing here touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    project_root: PathBuf,
}

impl SessionPaths {
    /// Layout for the project rooted at `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// The synchronized local directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Last component of the project root, used as the default remote root.
    pub fn project_name(&self) -> Option<String> {
        self.project_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    pub fn session_dir(&self) -> PathBuf {
        self.project_root.join(SESSION_DIR)
    }

    pub fn client_secrets(&self) -> PathBuf {
        self.session_dir().join(CLIENT_SECRETS_FILE)
    }

    pub fn credentials(&self) -> PathBuf {
        self.session_dir().join(CREDENTIALS_FILE)
    }

    pub fn remote_root(&self) -> PathBuf {
        self.session_dir().join(REMOTE_ROOT_FILE)
    }

    pub fn ignore_file(&self) -> PathBuf {
        self.session_dir().join(IGNORE_FILE)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
