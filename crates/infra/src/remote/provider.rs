//! Hands out Graph clients for users and, when enabled, for the whole tenant

use std::sync::Arc;

use async_trait::async_trait;
use calsync_common::Clock;
use calsync_core::{FetchStrategy, RemoteCalendar, RemoteProvider};
use calsync_domain::constants::TOKEN_REFRESH_LEEWAY;
use calsync_domain::{CalsyncError, OAuth2Token, RemoteConfig, Result};
use tokio::sync::Mutex;
use tracing::info;

use super::GraphClient;
use crate::http::HttpClient;
use crate::oauth::GraphTokenSource;

pub struct GraphProvider {
    config: RemoteConfig,
    http: HttpClient,
    tokens: Arc<GraphTokenSource>,
    clock: Arc<dyn Clock>,
    /// Cached app-only token; refreshed once it is inside the leeway
    app_token: Mutex<Option<OAuth2Token>>,
}

impl GraphProvider {
    pub fn new(
        config: RemoteConfig,
        http: HttpClient,
        tokens: Arc<GraphTokenSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { config, http, tokens, clock, app_token: Mutex::new(None) }
    }

    async fn app_token(&self) -> Result<OAuth2Token> {
        let mut cached = self.app_token.lock().await;
        let now = self.clock.now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now, TOKEN_REFRESH_LEEWAY)) {
            return Ok(token.clone());
        }

        info!("Acquiring app-only Graph token");
        let token = self.tokens.client_credentials().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    fn client_for(&self, access_token: &str) -> GraphClient {
        GraphClient::new(
            self.http.clone(),
            self.config.graph_base_url.clone(),
            access_token,
            Arc::clone(&self.clock),
        )
    }
}

#[async_trait]
impl RemoteProvider for GraphProvider {
    fn fetch_strategy(&self) -> FetchStrategy {
        if self.config.superuser_enabled {
            FetchStrategy::SuperuserBatch
        } else {
            FetchStrategy::PerUserFanout
        }
    }

    async fn superuser_client(&self) -> Result<Arc<dyn RemoteCalendar>> {
        if !self.config.superuser_enabled {
            return Err(CalsyncError::SuperuserNotSupported);
        }
        let token = self.app_token().await?;
        Ok(Arc::new(self.client_for(&token.access_token)))
    }

    fn user_client(&self, token: &OAuth2Token) -> Arc<dyn RemoteCalendar> {
        Arc::new(self.client_for(&token.access_token))
    }
}
