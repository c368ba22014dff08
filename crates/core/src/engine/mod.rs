//! Policy layer: sync, reminders, daily summary, subscriptions and tokens
//!
//! [`Engine`] is a cheap cloneable handle over a shared [`Env`]. Operations
//! that act for a single user build an [`OperationContext`] first; operations
//! over the whole user index pick a [`FetchPlan`] and dispatch per user.

pub mod actions;
pub mod availability;
pub mod connect;
pub mod context;
pub mod daily_summary;
pub mod fetch;
pub mod reminders;
pub mod settings;
pub mod status;
pub mod subscriptions;
pub mod tokens;

use std::sync::Arc;
use std::time::Duration;

use calsync_common::Clock;
use calsync_domain::Config;
use chrono::{DateTime, Utc};

pub use context::{FetchPlan, OperationContext, OperationContextBuilder};
pub use status::{decide, LastStatusUpdate, StatusAction, StatusInput, Transition};

use crate::oauth_ports::TokenSource;
use crate::platform_ports::ChatPlatform;
use crate::remote_ports::RemoteProvider;
use crate::store::Store;

/// Static values the engine needs from configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub plugin_version: String,
    /// Where the remote delivers change notifications
    pub notification_url: String,
    pub confirm_action_url: String,
    pub respond_action_url: String,
    /// Worker count for per-user fan-out
    pub concurrency: usize,
    pub fanout_deadline: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
            notification_url: config.server.notification_url(),
            confirm_action_url: config.server.confirm_action_url(),
            respond_action_url: config.server.respond_action_url(),
            concurrency: config.engine.concurrency.max(1),
            fanout_deadline: Duration::from_secs(config.engine.fanout_deadline_secs),
        }
    }
}

/// Shared dependencies of every engine operation
pub struct Env {
    pub settings: EngineSettings,
    pub store: Store,
    pub remote: Arc<dyn RemoteProvider>,
    pub tokens: Arc<dyn TokenSource>,
    pub platform: Arc<dyn ChatPlatform>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct Engine {
    env: Arc<Env>,
}

impl Engine {
    pub fn new(env: Env) -> Self {
        Self { env: Arc::new(env) }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn store(&self) -> &Store {
        &self.env.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.env.clock.now()
    }
}
