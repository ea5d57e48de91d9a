//! OAuth2 PKCE authentication flow for the Google Drive API
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for an
//! installed application, with the redirect caught by a loopback server.
//!
//! ## Components
//!
//! - [`ClientSecrets`] - The OAuth client registration downloaded from the
//!   Google Cloud console (`client_secrets.json`)
//! - [`OAuth2Config`] - Configuration for the OAuth2 flow
//! - [`FileTokenStorage`] - Token persistence in the project's `credentials.json`
//! - [`PKCEFlow`] - OAuth2 PKCE challenge/exchange logic
//! - [`LocalCallbackServer`] - Minimal HTTP server for the OAuth redirect
//! - [`DriveAuthAdapter`] - Orchestrates the full authentication flow

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use dsync_core::config::DriveConfig;
use dsync_core::ports::remote_store::Tokens;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse,
    TokenUrl,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::DriveError;

/// Full read/write access to the user's Drive files
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

// ============================================================================
// ClientSecrets
// ============================================================================

/// OAuth client registration
///
/// Google wraps the fields in an `installed` or a `web` object depending on
/// the application type chosen in the console; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parses the JSON content of a client secrets file
    pub fn parse(json: &str) -> Result<Self, DriveError> {
        let file: ClientSecretsFile = serde_json::from_str(json)
            .map_err(|e| DriveError::InvalidClientSecrets(e.to_string()))?;
        let secrets = file.installed.or(file.web).ok_or_else(|| {
            DriveError::InvalidClientSecrets(
                "expected an 'installed' or 'web' client".to_string(),
            )
        })?;
        if secrets.client_id.trim().is_empty() {
            return Err(DriveError::InvalidClientSecrets(
                "client_id is empty".to_string(),
            ));
        }
        Ok(secrets)
    }

    /// Reads and parses a client secrets file
    pub async fn load(path: &Path) -> Result<Self, DriveError> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            DriveError::InvalidClientSecrets(format!("{}: {e}", path.display()))
        })?;
        Self::parse(&json)
    }
}

// ============================================================================
// OAuth2Config
// ============================================================================

/// Configuration for the OAuth2 PKCE authentication flow
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    /// Loopback port the callback server binds to
    pub callback_port: u16,
    pub scopes: Vec<String>,
}

impl OAuth2Config {
    /// Combines a client registration with the endpoint settings
    pub fn new(secrets: &ClientSecrets, drive: &DriveConfig) -> Self {
        Self {
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            auth_url: drive.auth_url.clone(),
            token_url: drive.token_url.clone(),
            callback_port: drive.callback_port,
            scopes: vec![DRIVE_SCOPE.to_string()],
        }
    }

    /// Redirect URI registered with the provider for this port
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/", self.callback_port)
    }
}

// ============================================================================
// FileTokenStorage
// ============================================================================

/// Stores OAuth tokens as JSON in a file
///
/// The file lives in the project's `.dsync` directory and is created with
/// owner-only permissions on Unix.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the tokens, replacing any previous ones
    pub async fn store(&self, tokens: &Tokens) -> Result<()> {
        let json = serde_json::to_vec_pretty(tokens).context("Failed to serialize tokens")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .with_context(|| format!("Failed to restrict {}", self.path.display()))?;
        }

        debug!(path = %self.path.display(), "Stored tokens");
        Ok(())
    }

    /// Reads the tokens
    ///
    /// # Returns
    /// `Some(Tokens)` if the file exists, `None` if it does not
    pub async fn load(&self) -> Result<Option<Tokens>> {
        match tokio::fs::read(&self.path).await {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_slice(&json)
                    .with_context(|| format!("Failed to parse {}", self.path.display()))?;
                debug!(path = %self.path.display(), "Loaded tokens");
                Ok(Some(tokens))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored tokens");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to read {}", self.path.display()))),
        }
    }
}

// ============================================================================
// PKCEFlow
// ============================================================================

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth2 PKCE flow implementation using the `oauth2` crate
///
/// Handles generating authorization URLs with PKCE challenges,
/// exchanging authorization codes for tokens, and refreshing tokens.
pub struct PKCEFlow {
    client: ConfiguredClient,
    scopes: Vec<String>,
    http: reqwest::Client,
}

impl PKCEFlow {
    /// Creates a new PKCEFlow with the given configuration
    pub fn new(config: &OAuth2Config) -> Result<Self> {
        let mut client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_auth_uri(
                AuthUrl::new(config.auth_url.clone()).context("Invalid authorization URL")?,
            )
            .set_token_uri(TokenUrl::new(config.token_url.clone()).context("Invalid token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri()).context("Invalid redirect URI")?,
            );
        if let Some(secret) = &config.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build OAuth HTTP client")?;

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
            http,
        })
    }

    /// Generates an authorization URL with a PKCE challenge
    ///
    /// Offline access is requested so the response carries a refresh token.
    ///
    /// # Returns
    /// A tuple of `(authorization_url, csrf_token, pkce_verifier)`.
    /// The `pkce_verifier` must be kept until the code exchange step.
    pub fn generate_auth_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");

        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token) = auth_request.set_pkce_challenge(pkce_challenge).url();

        debug!("Generated authorization URL");
        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchanges an authorization code for OAuth tokens
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<Tokens> {
        info!("Exchanging authorization code for tokens");

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .context("Failed to exchange authorization code")?;

        let tokens = tokens_from_response(&token_result, None);
        info!("Successfully obtained OAuth tokens");
        Ok(tokens)
    }

    /// Refreshes an expired access token using a refresh token
    ///
    /// Google usually omits the refresh token from refresh responses; the
    /// old one is kept in that case.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Tokens> {
        info!("Refreshing access token");

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .context("Failed to refresh token")?;

        let tokens = tokens_from_response(&token_result, Some(refresh_token));
        info!("Successfully refreshed access token");
        Ok(tokens)
    }
}

fn tokens_from_response(response: &BasicTokenResponse, previous_refresh: Option<&str>) -> Tokens {
    let lifetime = response
        .expires_in()
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

    Tokens {
        access_token: response.access_token().secret().to_string(),
        refresh_token: response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .or_else(|| previous_refresh.map(str::to_string)),
        expires_at: Utc::now() + Duration::seconds(lifetime),
    }
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Minimal HTTP server that listens on localhost for the OAuth2 redirect callback.
///
/// Serves connections until one carries an authorization code (browsers may
/// open extra connections, e.g. for a favicon), answers it with a success
/// page and shuts down.
pub struct LocalCallbackServer;

/// Parameters extracted from the OAuth2 callback
#[derive(Debug)]
pub struct CallbackParams {
    /// The authorization code
    pub code: String,
    /// The CSRF state parameter
    pub state: String,
}

impl LocalCallbackServer {
    /// Starts the local callback server and waits for the OAuth redirect
    pub async fn start(port: u16) -> Result<CallbackParams> {
        use std::sync::Arc;

        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::header::{HeaderValue, CONTENT_TYPE};
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{Request, Response, StatusCode};
        use hyper_util::rt::TokioIo;
        use tokio::net::TcpListener;
        use tokio::sync::{oneshot, Mutex};

        let address = format!("127.0.0.1:{port}");
        info!("Starting local OAuth callback server on {address}");

        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind callback server to {address}"))?;

        let (tx, mut rx) = oneshot::channel::<CallbackParams>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        loop {
            let stream = tokio::select! {
                params = &mut rx => {
                    let params = params
                        .context("Callback server channel closed without receiving parameters")?;
                    info!("Received OAuth callback with authorization code");
                    return Ok(params);
                }
                accepted = listener.accept() => {
                    let (stream, _addr) = accepted
                        .context("Failed to accept connection on callback server")?;
                    stream
                }
            };

            let io = TokioIo::new(stream);
            let tx_conn = tx.clone();

            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let tx_inner = tx_conn.clone();
                async move {
                    let uri = req.uri().to_string();
                    debug!("Callback server received request: {}", uri);

                    let (status, html) = match parse_callback_params(&uri) {
                        Some(params) => {
                            if let Some(sender) = tx_inner.lock().await.take() {
                                let _ = sender.send(params);
                            }
                            (StatusCode::OK, success_html())
                        }
                        None => (
                            StatusCode::BAD_REQUEST,
                            error_html("Missing authorization code in callback"),
                        ),
                    };

                    let mut response = Response::new(Full::new(Bytes::from(html)));
                    *response.status_mut() = status;
                    response.headers_mut().insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("text/html; charset=utf-8"),
                    );
                    Ok::<_, hyper::Error>(response)
                }
            });

            tokio::spawn(async move {
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!("Callback server connection error: {}", e);
                }
            });
        }
    }
}

/// Parses the authorization code and state from a callback URI
fn parse_callback_params(uri: &str) -> Option<CallbackParams> {
    let url = url::Url::parse(&format!("http://localhost{uri}")).ok()?;
    let mut code = None;
    let mut state = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            _ => {}
        }
    }

    Some(CallbackParams {
        code: code?,
        state: state.unwrap_or_default(),
    })
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>DSync - Authentication Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Successful</h1>
    <p>DSync can now access your Google Drive.</p>
    <p>You can close this window and return to the terminal.</p>
</body>
</html>"#
        .to_string()
}

fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>DSync - Authentication Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Error</h1>
    <p>{message}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#
    )
}

// ============================================================================
// DriveAuthAdapter
// ============================================================================

/// High-level authentication adapter that orchestrates the full OAuth2 PKCE flow.
///
/// 1. Generates PKCE authorization URL
/// 2. Opens the user's browser to the Google consent page
/// 3. Starts a local callback server to receive the redirect
/// 4. Checks the CSRF state and exchanges the code for tokens
pub struct DriveAuthAdapter {
    config: OAuth2Config,
}

impl DriveAuthAdapter {
    pub fn new(config: OAuth2Config) -> Self {
        Self { config }
    }

    /// Performs the full interactive OAuth2 PKCE login flow
    pub async fn login(&self) -> Result<Tokens> {
        info!("Starting OAuth2 PKCE login flow");

        let flow = PKCEFlow::new(&self.config)?;
        let (auth_url, csrf_token, pkce_verifier) = flow.generate_auth_url();

        info!("Opening browser for authentication");
        if let Err(e) = webbrowser::open(&auth_url) {
            warn!(error = %e, "Could not open a browser");
            eprintln!("Open this URL in your browser to authorize DSync:\n\n    {auth_url}\n");
        }

        let callback = LocalCallbackServer::start(self.config.callback_port).await?;
        if callback.state != *csrf_token.secret() {
            bail!("OAuth state mismatch in callback; the authorization was not started by DSync");
        }

        let tokens = flow.exchange_code(callback.code, pkce_verifier).await?;
        info!("OAuth2 PKCE login completed successfully");
        Ok(tokens)
    }

    /// Refreshes an expired access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        PKCEFlow::new(&self.config)?.refresh_token(refresh_token).await
    }

    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }
}
