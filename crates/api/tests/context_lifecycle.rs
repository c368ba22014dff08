//! Integration tests for AppContext lifecycle
//!
//! Builds the full context against local storage, exercises the router and
//! shuts everything down again. Nothing here reaches the remote or the chat
//! platform: the scheduled jobs never get to their first tick.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use calsync_domain::{
    CalsyncError, Config, OAuthConfig, PlatformConfig, ServerConfig, StorageBackend, StorageConfig,
};
use calsync_api::AppContext;
use tempfile::TempDir;
use tower::ServiceExt;

const TEST_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            plugin_url: "https://chat.example.com".into(),
            ..ServerConfig::default()
        },
        oauth: OAuthConfig {
            client_id: "app".into(),
            client_secret: "secret".into(),
            tenant: "common".into(),
            ..OAuthConfig::default()
        },
        platform: PlatformConfig {
            base_url: "https://chat.example.com".into(),
            bot_token: "bot-token".into(),
            bot_user_id: "bot".into(),
        },
        ..Config::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_context_starts_serves_and_shuts_down() {
    let ctx = AppContext::new_with_config(test_config()).await.expect("context");
    ctx.start().await.expect("schedulers start");

    let response = ctx
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/plugins/calsync/webhook/event?validationToken=ping")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    ctx.shutdown().await.expect("clean shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_context_with_encrypted_sqlite_storage() {
    let dir = TempDir::new().expect("temp dir");
    let config = Config {
        storage: StorageConfig {
            backend: StorageBackend::Sqlite,
            path: Some(dir.path().join("calsync.db").to_string_lossy().into_owned()),
            encryption_key: Some(TEST_KEY.into()),
        },
        ..test_config()
    };

    let ctx = AppContext::new_with_config(config).await.expect("context");
    let url = ctx.engine.init_oauth2("mm-user").await.expect("authorize url");
    assert!(url.starts_with("https://login.microsoftonline.com/common/oauth2/v2.0/authorize"));

    ctx.shutdown().await.expect("clean shutdown without starting schedulers");
}

#[tokio::test]
async fn test_context_rejects_invalid_config() {
    let config = Config { server: ServerConfig::default(), ..test_config() };

    match AppContext::new_with_config(config).await {
        Err(CalsyncError::Config(msg)) => assert!(msg.contains("plugin_url")),
        Err(other) => panic!("expected config error, got {other}"),
        Ok(_) => panic!("expected config error"),
    }
}
