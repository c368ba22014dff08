//! HTTP surface: remote webhook, post actions, OAuth2 connect flow and health
//!
//! Everything except `/health` is mounted under the configured plugin path.

mod actions;
mod error;
mod oauth;
mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use calsync_common::Clock;
use calsync_core::{Engine, NotificationProcessor};
use calsync_domain::{CalsyncError, Result};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use error::ApiError;

use crate::observability::metrics::WebhookMetrics;

/// Header the chat platform sets on requests from an authenticated user
pub const PLATFORM_USER_HEADER: &str = "Mattermost-User-ID";

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub processor: Arc<NotificationProcessor>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<WebhookMetrics>,
}

/// Build the router with the plugin routes nested under `plugin_path`
pub fn router(state: AppState, plugin_path: &str) -> Router {
    let plugin = Router::new()
        .route("/webhook/event", post(webhook::webhook_event))
        .route("/action/confirm", post(actions::confirm))
        .route("/action/respond", post(actions::respond))
        .route("/oauth2/connect", get(oauth::connect))
        .route("/oauth2/complete", get(oauth::complete));

    let prefix = plugin_path.trim_end_matches('/');
    let app = if prefix.is_empty() {
        Router::new().merge(plugin)
    } else {
        Router::new().nest(prefix, plugin)
    };

    app.route("/health", get(health)).with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let (received, enqueued, rejected) = state.metrics.totals();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "webhook": {
            "received": received,
            "enqueued": enqueued,
            "rejected": rejected,
        },
    }))
}

/// Serve `app` on `bind_address` until `shutdown` fires
pub async fn serve(app: Router, bind_address: &str, shutdown: CancellationToken) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| CalsyncError::Config(format!("invalid bind address {bind_address}: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| CalsyncError::Network(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| CalsyncError::Internal(format!("HTTP server error: {e}")))?;
    info!("HTTP server stopped");
    Ok(())
}
