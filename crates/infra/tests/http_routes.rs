//! Router tests against in-memory storage and mocked remote endpoints

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use calsync_common::{Clock, MockClock};
use calsync_core::{Engine, EngineSettings, Env, NotificationProcessor, Store};
use calsync_domain::{Config, OAuthConfig, PlatformConfig, RemoteConfig, ServerConfig};
use calsync_infra::chat::PlatformClient;
use calsync_infra::http::HttpClient;
use calsync_infra::observability::metrics::WebhookMetrics;
use calsync_infra::oauth::{GraphTokenSource, OAuthEndpoints};
use calsync_infra::remote::GraphProvider;
use calsync_infra::server::{router, AppState, PLATFORM_USER_HEADER};
use calsync_infra::storage::memory::MemoryKv;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::MockServer;

const PLUGIN_PATH: &str = "/plugins/calsync";

struct TestApp {
    router: Router,
    metrics: Arc<WebhookMetrics>,
    authorize_url: String,
    _server: MockServer,
}

async fn test_app() -> TestApp {
    test_app_with_queue(16).await
}

async fn test_app_with_queue(queue_size: usize) -> TestApp {
    let server = MockServer::start().await;
    let clock = MockClock::at("2024-03-05T12:00:00Z").expect("valid timestamp");
    let clock: Arc<dyn Clock> = Arc::new(clock);

    let config = Config {
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
        remote: RemoteConfig { graph_base_url: server.uri(), superuser_enabled: false },
        platform: PlatformConfig {
            base_url: server.uri(),
            bot_token: "bot-token".into(),
            bot_user_id: "bot".into(),
        },
        ..Config::default()
    };

    let http = HttpClient::builder().max_attempts(1).build().expect("http client");
    let authorize_url = format!("{}/authorize", server.uri());
    let endpoints =
        OAuthEndpoints { authorize_url: authorize_url.clone(), token_url: format!("{}/token", server.uri()) };
    let tokens = Arc::new(
        GraphTokenSource::new(&config.oauth, endpoints, &config.redirect_url(), clock.clone())
            .expect("token source"),
    );
    let remote =
        GraphProvider::new(config.remote.clone(), http.clone(), tokens.clone(), clock.clone());
    let platform = PlatformClient::new(http, &config.platform);

    let engine = Engine::new(Env {
        settings: EngineSettings::from_config(&config),
        store: Store::new(Arc::new(MemoryKv::with_clock(clock.clone()))),
        remote: Arc::new(remote),
        tokens,
        platform: Arc::new(platform),
        clock: clock.clone(),
    });

    let processor = Arc::new(NotificationProcessor::start(engine.clone(), queue_size));
    let metrics = Arc::new(WebhookMetrics::new());
    let state = AppState { engine, processor, clock, metrics: metrics.clone() };

    TestApp { router: router(state, PLUGIN_PATH), metrics, authorize_url, _server: server }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.expect("body");
    (status, bytes.to_vec())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app().await;
    let (status, body) = send(&app.router, get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn webhook_echoes_validation_token() {
    let app = test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri(format!("{PLUGIN_PATH}/webhook/event?validationToken=abc%20123"))
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"abc 123");
}

#[tokio::test]
async fn webhook_rejects_markup_validation_token() {
    let app = test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri(format!("{PLUGIN_PATH}/webhook/event?validationToken=%3Cb%3E"))
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_queues_notifications() {
    let app = test_app().await;
    let payload = json!({
        "value": [{
            "changeType": "updated",
            "clientState": "secret",
            "resource": "Users/r1/Events/e1",
            "subscriptionExpirationDateTime": "2024-03-06T12:00:00Z",
            "subscriptionId": "sub-1",
            "resourceData": { "@odata.type": "#Microsoft.Graph.Event" }
        }]
    });

    let (status, _) =
        send(&app.router, post_json(&format!("{PLUGIN_PATH}/webhook/event"), payload)).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(app.metrics.totals(), (1, 1, 0));
}

#[tokio::test]
async fn webhook_counts_queued_and_dropped_separately() {
    let app = test_app_with_queue(1).await;
    let item = |event: &str| {
        json!({
            "changeType": "updated",
            "resource": format!("Users/r1/Events/{event}"),
            "subscriptionExpirationDateTime": "2024-03-06T12:00:00Z",
            "subscriptionId": "sub-1"
        })
    };
    let payload = json!({ "value": [item("e1"), item("e2"), item("e3")] });

    let (status, _) =
        send(&app.router, post_json(&format!("{PLUGIN_PATH}/webhook/event"), payload)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.metrics.totals(), (3, 1, 2));
}

#[tokio::test]
async fn webhook_with_bad_expiration_fails_whole_batch() {
    let app = test_app().await;
    let payload = json!({
        "value": [
            {
                "changeType": "updated",
                "resource": "Users/r1/Events/e1",
                "subscriptionExpirationDateTime": "2024-03-06T12:00:00Z",
                "subscriptionId": "sub-1"
            },
            {
                "changeType": "updated",
                "resource": "Users/r1/Events/e2",
                "subscriptionExpirationDateTime": "next week",
                "subscriptionId": "sub-1"
            }
        ]
    });

    let (status, _) =
        send(&app.router, post_json(&format!("{PLUGIN_PATH}/webhook/event"), payload)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.metrics.totals(), (0, 0, 0));
}

#[tokio::test]
async fn webhook_rejects_undecodable_body() {
    let app = test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri(format!("{PLUGIN_PATH}/webhook/event"))
        .body(Body::from("not json"))
        .unwrap();

    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn connect_redirects_to_authorize_url() {
    let app = test_app().await;
    let request = get(&format!("{PLUGIN_PATH}/oauth2/connect"))
        .header(PLATFORM_USER_HEADER, "mm-user")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&app.authorize_url));
    assert!(location.contains("client_id=app"));
    assert!(location.contains("_mm-user"));
}

#[tokio::test]
async fn connect_accepts_user_id_query() {
    let app = test_app().await;
    let request =
        get(&format!("{PLUGIN_PATH}/oauth2/connect?user_id=mm-user")).body(Body::empty()).unwrap();

    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::FOUND);
}

#[tokio::test]
async fn connect_without_user_is_unauthorized() {
    let app = test_app().await;
    let request = get(&format!("{PLUGIN_PATH}/oauth2/connect")).body(Body::empty()).unwrap();

    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn complete_requires_known_state() {
    let app = test_app().await;

    let anonymous = get(&format!("{PLUGIN_PATH}/oauth2/complete?code=c&state=s_mm-user"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app.router, anonymous).await.0, StatusCode::UNAUTHORIZED);

    let missing_code = get(&format!("{PLUGIN_PATH}/oauth2/complete?state=s_mm-user"))
        .header(PLATFORM_USER_HEADER, "mm-user")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app.router, missing_code).await.0, StatusCode::BAD_REQUEST);

    let unknown_state = get(&format!("{PLUGIN_PATH}/oauth2/complete?code=c&state=s_mm-user"))
        .header(PLATFORM_USER_HEADER, "mm-user")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app.router, unknown_state).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn respond_requires_event_id() {
    let app = test_app().await;
    let body = json!({ "user_id": "mm-user", "context": { "selected_option": "Yes" } });

    let (status, body) =
        send(&app.router, post_json(&format!("{PLUGIN_PATH}/action/respond"), body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("no event ID"));
}

#[tokio::test]
async fn confirm_requires_acting_user_and_value() {
    let app = test_app().await;

    let anonymous = json!({ "context": { "value": true } });
    let (status, _) =
        send(&app.router, post_json(&format!("{PLUGIN_PATH}/action/confirm"), anonymous)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let no_value = json!({ "user_id": "mm-user", "context": {} });
    let (status, _) =
        send(&app.router, post_json(&format!("{PLUGIN_PATH}/action/confirm"), no_value)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn declining_status_change_replaces_post() {
    let app = test_app().await;
    let body = json!({ "user_id": "mm-user", "context": { "value": false, "hasEvent": false } });

    let (status, body) =
        send(&app.router, post_json(&format!("{PLUGIN_PATH}/action/confirm"), body)).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body["update"]["props"]["attachments"][0]["text"],
        "The status has not been changed."
    );
}
