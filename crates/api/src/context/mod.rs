//! Application context - dependency injection container

use std::sync::Arc;

use axum::Router;
use calsync_common::{Clock, SystemClock};
use calsync_core::{Engine, EngineSettings, Env, NotificationProcessor, ProcessorConfig, Store};
use calsync_domain::{CalsyncError, Config, Result};
use calsync_infra::chat::PlatformClient;
use calsync_infra::http::HttpClient;
use calsync_infra::observability::metrics::{JobMetrics, WebhookMetrics};
use calsync_infra::oauth::{GraphTokenSource, OAuthEndpoints};
use calsync_infra::remote::GraphProvider;
use calsync_infra::scheduling::{EngineScheduler, EngineSchedulerConfig};
use calsync_infra::server::{self, AppState};
use calsync_infra::storage;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Application context - holds all services and their lifecycles
pub struct AppContext {
    pub config: Config,
    pub engine: Engine,
    pub job_metrics: Arc<JobMetrics>,
    pub webhook_metrics: Arc<WebhookMetrics>,
    processor: Arc<NotificationProcessor>,
    scheduler: Mutex<EngineScheduler>,
    clock: Arc<dyn Clock>,
}

impl AppContext {
    /// Wire the adapters described by `config` and start the notification
    /// processor. Schedulers stay stopped until [`AppContext::start`].
    pub async fn new_with_config(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let backends = storage::open(&config.storage, Arc::clone(&clock))?;
        let store = Store::with_secure_kv(backends.kv, backends.secure_kv);

        let http = HttpClient::builder()
            .user_agent(concat!("calsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let tokens = Arc::new(GraphTokenSource::new(
            &config.oauth,
            OAuthEndpoints::for_tenant(&config.oauth),
            &config.redirect_url(),
            Arc::clone(&clock),
        )?);
        let remote = GraphProvider::new(
            config.remote.clone(),
            http.clone(),
            Arc::clone(&tokens),
            Arc::clone(&clock),
        );
        let platform = PlatformClient::new(http, &config.platform);

        let settings = EngineSettings::from_config(&config);
        let notification_url = settings.notification_url.clone();
        let engine = Engine::new(Env {
            settings,
            store,
            remote: Arc::new(remote),
            tokens,
            platform: Arc::new(platform),
            clock: Arc::clone(&clock),
        });

        let processor = NotificationProcessor::start(engine.clone(), config.engine.queue_size);
        processor
            .configure(ProcessorConfig { notification_url })
            .await
            .map_err(CalsyncError::from)?;

        let job_metrics = Arc::new(JobMetrics::new());
        let scheduler = EngineScheduler::new(
            EngineSchedulerConfig::from_config(&config.engine),
            Arc::new(engine.clone()),
            Arc::clone(&job_metrics),
        );

        info!(
            plugin_url = %config.server.plugin_url,
            storage = ?config.storage.backend,
            superuser = config.remote.superuser_enabled,
            "Application context initialized"
        );

        Ok(Self {
            config,
            engine,
            job_metrics,
            webhook_metrics: Arc::new(WebhookMetrics::new()),
            processor: Arc::new(processor),
            scheduler: Mutex::new(scheduler),
            clock,
        })
    }

    /// HTTP routes bound to this context
    pub fn router(&self) -> Router {
        let state = AppState {
            engine: self.engine.clone(),
            processor: Arc::clone(&self.processor),
            clock: Arc::clone(&self.clock),
            metrics: Arc::clone(&self.webhook_metrics),
        };
        server::router(state, &self.config.server.plugin_url_path)
    }

    /// Start the periodic jobs
    pub async fn start(&self) -> Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    /// Stop the schedulers, then the processor. Call after the HTTP server
    /// has stopped so no router still holds the processor.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down application context");

        let mut scheduler = self.scheduler.into_inner();
        if scheduler.is_running() {
            scheduler.stop().await?;
        }

        match Arc::try_unwrap(self.processor) {
            Ok(processor) => processor.quit().await,
            Err(_) => warn!("Notification processor still referenced; leaving it to the runtime"),
        }
        Ok(())
    }
}
