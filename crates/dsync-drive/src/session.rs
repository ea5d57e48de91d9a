//! DriveSessionProvider - ISessionProvider implementation for Google Drive
//!
//! Loads the tokens stored in the project's `credentials.json`, refreshes
//! them when they are about to expire and hands out a [`DriveRemoteStore`]
//! bound to the resulting access token.
//!
//! The session keeps refreshing for as long as it is used: the token is
//! renewed before it expires and whenever Drive answers 401, and every
//! renewal is written back to `credentials.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dsync_core::config::{DriveConfig, SessionPaths};
use dsync_core::ports::remote_store::{IRemoteStore, ISessionProvider, Tokens};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::auth::{ClientSecrets, DriveAuthAdapter, FileTokenStorage, OAuth2Config};
use crate::client::{DriveClient, TokenSource};
use crate::provider::DriveRemoteStore;
use crate::retry::RetryPolicy;
use crate::DriveError;

/// Tokens closer than this to expiry are refreshed before use
const REFRESH_MARGIN_SECS: i64 = 60;

/// Base backoff for Drive requests
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Shown when no usable credentials are stored
const LOGIN_REQUIRED: &str =
    "Missing authentication information. Please run 'dsync configure'.";

/// Opens Drive sessions for one project
pub struct DriveSessionProvider {
    paths: SessionPaths,
    drive: DriveConfig,
    tokens: FileTokenStorage,
}

impl DriveSessionProvider {
    pub fn new(paths: SessionPaths, drive: DriveConfig) -> Self {
        let tokens = FileTokenStorage::new(paths.credentials());
        Self {
            paths,
            drive,
            tokens,
        }
    }

    async fn adapter(&self, secrets_path: &Path) -> Result<DriveAuthAdapter> {
        let secrets = ClientSecrets::load(secrets_path).await?;
        Ok(DriveAuthAdapter::new(OAuth2Config::new(&secrets, &self.drive)))
    }

    /// Runs the interactive browser login with the given client secrets
    ///
    /// The tokens are returned, not stored: on first configuration the
    /// session directory does not exist yet.
    pub async fn login(&self, secrets_path: &Path) -> Result<Tokens> {
        self.adapter(secrets_path).await?.login().await
    }

    /// Persists tokens to the project's credentials file
    pub async fn save_tokens(&self, tokens: &Tokens) -> Result<()> {
        self.tokens.store(tokens).await
    }

    /// Stored tokens, refreshed and re-stored if they are about to expire
    ///
    /// # Errors
    /// [`DriveError::AuthenticationRequired`] when nothing is stored, or the
    /// tokens are expired and cannot be refreshed.
    #[instrument(skip(self), fields(project = %self.paths.project_root().display()))]
    pub async fn valid_tokens(&self) -> Result<Tokens> {
        let Some(tokens) = self.tokens.load().await? else {
            return Err(DriveError::AuthenticationRequired(LOGIN_REQUIRED.to_string()).into());
        };

        if !about_to_expire(&tokens) {
            debug!(expires_at = %tokens.expires_at, "Stored access token still valid");
            return Ok(tokens);
        }
        self.session_tokens(tokens).renew().await
    }

    fn session_tokens(&self, tokens: Tokens) -> SessionTokens {
        SessionTokens {
            drive: self.drive.clone(),
            secrets: self.paths.client_secrets(),
            storage: self.tokens.clone(),
            current: Mutex::new(tokens),
        }
    }

    /// Client with the configured endpoint and retries, refreshing `tokens`
    /// as needed
    fn client(&self, tokens: Tokens) -> DriveClient {
        let source: Arc<dyn TokenSource> = Arc::new(self.session_tokens(tokens));
        DriveClient::with_token_source(source, self.drive.base_url.as_str())
            .with_retry_policy(RetryPolicy::new(self.drive.max_retries, RETRY_BASE_DELAY))
    }
}

#[async_trait]
impl ISessionProvider for DriveSessionProvider {
    async fn open_session(&self) -> Result<Arc<dyn IRemoteStore>> {
        let tokens = self.valid_tokens().await?;
        Ok(Arc::new(DriveRemoteStore::new(self.client(tokens))))
    }
}

fn about_to_expire(tokens: &Tokens) -> bool {
    tokens.expires_within(chrono::Duration::seconds(REFRESH_MARGIN_SECS))
}

// ============================================================================
// Session token source
// ============================================================================

/// Tokens of an open session, renewed through the stored refresh token
struct SessionTokens {
    drive: DriveConfig,
    secrets: PathBuf,
    storage: FileTokenStorage,
    current: Mutex<Tokens>,
}

impl SessionTokens {
    /// Exchanges the refresh token for new tokens and stores them
    async fn renew(&self) -> Result<Tokens> {
        let mut current = self.current.lock().await;
        self.renew_locked(&mut current).await?;
        Ok(current.clone())
    }

    async fn renew_locked(&self, current: &mut Tokens) -> Result<()> {
        let Some(refresh_token) = current.refresh_token.as_deref() else {
            return Err(DriveError::AuthenticationRequired(LOGIN_REQUIRED.to_string()).into());
        };

        let secrets = ClientSecrets::load(&self.secrets).await?;
        let adapter = DriveAuthAdapter::new(OAuth2Config::new(&secrets, &self.drive));
        let refreshed = adapter.refresh(refresh_token).await.map_err(|e| {
            DriveError::AuthenticationRequired(format!(
                "Stored credentials could not be refreshed ({e:#}). Please run 'dsync configure'."
            ))
        })?;

        self.storage
            .store(&refreshed)
            .await
            .context("Failed to store refreshed tokens")?;
        info!(expires_at = %refreshed.expires_at, "Access token refreshed");
        *current = refreshed;
        Ok(())
    }
}

#[async_trait]
impl TokenSource for SessionTokens {
    async fn access_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        if about_to_expire(&current) {
            self.renew_locked(&mut current).await?;
        }
        Ok(current.access_token.clone())
    }

    async fn refresh(&self, rejected: &str) -> Result<Option<String>> {
        let mut current = self.current.lock().await;
        if current.access_token != rejected {
            // Renewed by a concurrent request since `rejected` was handed out
            return Ok(Some(current.access_token.clone()));
        }
        if current.refresh_token.is_none() {
            return Ok(None);
        }
        self.renew_locked(&mut current).await?;
        Ok(Some(current.access_token.clone()))
    }
}
