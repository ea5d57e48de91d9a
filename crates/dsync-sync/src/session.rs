//! Per-project `.dsync` directory: loading for push/pull, setup for configure.

use std::io::ErrorKind;
use std::path::Path;

use dsync_core::config::{SessionPaths, CLIENT_SECRETS_FILE};
use dsync_core::domain::newtypes::LogicalPath;
use tracing::{debug, info, instrument};

use crate::ignore::{IgnoreRuleSet, DEFAULT_IGNORE_RULES};
use crate::SyncError;

/// Shown when push or pull runs in a directory that was never configured.
pub const MISSING_SESSION_MESSAGE: &str =
    "Missing authentication information. Please run 'dsync configure'.";

/// Everything push and pull need from the session directory, except tokens.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub paths: SessionPaths,
    pub remote_root: LogicalPath,
    pub ignore_rules: IgnoreRuleSet,
}

impl SessionConfig {
    /// Read the remote root and the ignore rules of a configured project.
    ///
    /// # Errors
    /// `AuthenticationRequired` if the session directory or any of its
    /// client secrets, remote root and ignore files is absent.
    #[instrument(skip(paths), fields(project = %paths.project_root().display()))]
    pub async fn load(paths: &SessionPaths) -> Result<Self, SyncError> {
        for required in [paths.client_secrets(), paths.remote_root(), paths.ignore_file()] {
            if !tokio::fs::try_exists(&required).await? {
                debug!(missing = %required.display(), "Session file absent");
                return Err(SyncError::AuthenticationRequired(
                    MISSING_SESSION_MESSAGE.to_string(),
                ));
            }
        }

        let remote_root = read_remote_root(paths).await?;
        let ignore_rules = IgnoreRuleSet::load(&paths.ignore_file()).await?;

        Ok(Self {
            paths: paths.clone(),
            remote_root,
            ignore_rules,
        })
    }
}

/// Whether `configure` has already created the session directory.
pub async fn is_initialized(paths: &SessionPaths) -> Result<bool, SyncError> {
    Ok(tokio::fs::try_exists(paths.session_dir()).await?)
}

/// Create the session directory for a first-time configuration.
///
/// Moves `client_secrets.json` from the project root into `.dsync/`, writes
/// the project directory name as the remote root and writes the default
/// ignore rules.
///
/// # Errors
/// `AuthenticationRequired` if the client secrets file is not in the
/// project root.
#[instrument(skip(paths), fields(project = %paths.project_root().display()))]
pub async fn initialize(paths: &SessionPaths) -> Result<(), SyncError> {
    let pending = paths.project_root().join(CLIENT_SECRETS_FILE);
    if !tokio::fs::try_exists(&pending).await? {
        return Err(SyncError::AuthenticationRequired(format!(
            "The file {} does not exist. Please provide the OAuth client secrets \
             downloaded from the Google Cloud console.",
            pending.display()
        )));
    }

    tokio::fs::create_dir_all(paths.session_dir()).await?;
    tokio::fs::rename(&pending, paths.client_secrets()).await?;

    let default_root = LogicalPath::parse(&paths.project_name().unwrap_or_default());
    save_remote_root(paths, &default_root).await?;
    tokio::fs::write(paths.ignore_file(), DEFAULT_IGNORE_RULES).await?;

    info!(remote_root = %default_root, "Session directory created");
    Ok(())
}

/// Read `remote_root.txt`. Leading slashes and surrounding whitespace are
/// not significant.
pub async fn read_remote_root(paths: &SessionPaths) -> Result<LogicalPath, SyncError> {
    let text = read_session_file(&paths.remote_root()).await?;
    Ok(LogicalPath::parse(text.trim()))
}

/// Overwrite `remote_root.txt` with `root`, stored without a leading slash.
pub async fn save_remote_root(paths: &SessionPaths, root: &LogicalPath) -> Result<(), SyncError> {
    let text = root.segments().join("/");
    tokio::fs::write(paths.remote_root(), text).await?;
    debug!(remote_root = %root, "Saved remote root");
    Ok(())
}

async fn read_session_file(path: &Path) -> Result<String, SyncError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(SyncError::AuthenticationRequired(
            MISSING_SESSION_MESSAGE.to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}
