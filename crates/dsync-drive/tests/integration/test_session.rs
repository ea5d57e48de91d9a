//! Session opening: stored tokens, refresh against a mock token endpoint.

use chrono::{Duration, Utc};
use dsync_core::config::{DriveConfig, SessionPaths};
use dsync_core::domain::newtypes::RemoteId;
use dsync_core::ports::remote_store::{ISessionProvider, Tokens};
use dsync_drive::session::DriveSessionProvider;
use dsync_drive::DriveError;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Project {
    _dir: TempDir,
    paths: SessionPaths,
}

fn project_with_tokens(tokens: &Tokens) -> Project {
    let dir = TempDir::new().unwrap();
    let paths = SessionPaths::new(dir.path());
    std::fs::create_dir(paths.session_dir()).unwrap();
    std::fs::write(
        paths.client_secrets(),
        r#"{"installed": {"client_id": "cid", "client_secret": "csecret"}}"#,
    )
    .unwrap();
    std::fs::write(paths.credentials(), serde_json::to_vec(tokens).unwrap()).unwrap();
    Project { _dir: dir, paths }
}

fn drive_config(server: &MockServer) -> DriveConfig {
    DriveConfig {
        base_url: server.uri(),
        token_url: format!("{}/token", server.uri()),
        max_retries: 0,
        ..DriveConfig::default()
    }
}

async fn mount_empty_root(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/drive/v2/files"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_open_session_with_valid_tokens() {
    let server = MockServer::start().await;
    let project = project_with_tokens(&Tokens {
        access_token: "still-good".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
    });
    mount_empty_root(&server, "still-good").await;

    let provider = DriveSessionProvider::new(project.paths.clone(), drive_config(&server));
    let store = provider.open_session().await.unwrap();

    assert!(store.list_children(&RemoteId::root()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_open_session_refreshes_expired_tokens() {
    let server = MockServer::start().await;
    let project = project_with_tokens(&Tokens {
        access_token: "expired".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Utc::now() - Duration::minutes(5),
    });

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_empty_root(&server, "renewed").await;

    let provider = DriveSessionProvider::new(project.paths.clone(), drive_config(&server));
    let store = provider.open_session().await.unwrap();
    store.list_children(&RemoteId::root()).await.unwrap();

    // The refreshed tokens are persisted and keep the old refresh token.
    let stored: Tokens =
        serde_json::from_slice(&std::fs::read(project.paths.credentials()).unwrap()).unwrap();
    assert_eq!(stored.access_token, "renewed");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!stored.is_expired());
}

#[tokio::test]
async fn test_rejected_refresh_requires_login() {
    let server = MockServer::start().await;
    let project = project_with_tokens(&Tokens {
        access_token: "expired".to_string(),
        refresh_token: Some("revoked".to_string()),
        expires_at: Utc::now() - Duration::minutes(5),
    });

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let provider = DriveSessionProvider::new(project.paths.clone(), drive_config(&server));
    let err = match provider.open_session().await {
        Ok(_) => panic!("expected authentication failure"),
        Err(err) => err,
    };

    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::AuthenticationRequired(_))
    ));
    assert!(err.to_string().contains("dsync configure"));
}

#[tokio::test]
async fn test_rejected_access_token_is_refreshed_mid_session() {
    let server = MockServer::start().await;
    let project = project_with_tokens(&Tokens {
        access_token: "revoked-early".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
    });

    Mock::given(method("GET"))
        .and(path("/drive/v2/files"))
        .and(header("authorization", "Bearer revoked-early"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_empty_root(&server, "renewed").await;

    let provider = DriveSessionProvider::new(project.paths.clone(), drive_config(&server));
    let store = provider.open_session().await.unwrap();

    assert!(store.list_children(&RemoteId::root()).await.unwrap().is_empty());
    let stored: Tokens =
        serde_json::from_slice(&std::fs::read(project.paths.credentials()).unwrap()).unwrap();
    assert_eq!(stored.access_token, "renewed");
}

#[tokio::test]
async fn test_unauthorized_after_refresh_is_reported() {
    let server = MockServer::start().await;
    let project = project_with_tokens(&Tokens {
        access_token: "first".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
    });

    Mock::given(method("GET"))
        .and(path("/drive/v2/files"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "second",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = DriveSessionProvider::new(project.paths.clone(), drive_config(&server));
    let store = provider.open_session().await.unwrap();
    let err = store.list_children(&RemoteId::root()).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::Unauthorized(_))
    ));
}
