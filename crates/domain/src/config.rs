//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CONCURRENCY, FANOUT_DEADLINE, MAX_QUEUE_SIZE};
use crate::errors::{CalsyncError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    pub platform: PlatformConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Public HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Externally reachable base URL, e.g. `https://chat.example.com`.
    pub plugin_url: String,
    /// Path prefix under which the routes are mounted.
    pub plugin_url_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8065".to_string(),
            plugin_url: String::new(),
            plugin_url_path: "/plugins/calsync".to_string(),
        }
    }
}

impl ServerConfig {
    /// URL the remote calendar posts change notifications to.
    pub fn notification_url(&self) -> String {
        format!("{}{}/webhook/event", self.plugin_url.trim_end_matches('/'), self.plugin_url_path)
    }

    /// Action URL placed on interactive confirmation posts.
    pub fn confirm_action_url(&self) -> String {
        format!("{}/action/confirm", self.plugin_url_path)
    }

    pub fn respond_action_url(&self) -> String {
        format!("{}/action/respond", self.plugin_url_path)
    }

    pub fn oauth_redirect_url(&self) -> String {
        format!("{}{}/oauth2/complete", self.plugin_url.trim_end_matches('/'), self.plugin_url_path)
    }
}

/// OAuth2 application registration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    #[serde(default = "default_tenant")]
    pub tenant: String,
    /// Overrides the redirect derived from the server section.
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_tenant() -> String {
    "common".to_string()
}

fn default_scopes() -> Vec<String> {
    ["offline_access", "User.Read", "Calendars.ReadWrite", "Calendars.ReadWrite.Shared", "MailboxSettings.Read"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl OAuthConfig {
    pub fn authority(&self) -> String {
        format!("https://login.microsoftonline.com/{}", self.tenant)
    }
}

/// Remote calendar backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub graph_base_url: String,
    /// When false the remote reports per-user fan-out.
    pub superuser_enabled: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { graph_base_url: "https://graph.microsoft.com/v1.0".to_string(), superuser_enabled: false }
    }
}

/// Chat platform REST access for the bot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub bot_token: String,
    #[serde(default)]
    pub bot_user_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub path: Option<String>,
    /// 32-byte key (64 hex characters or 32 raw characters).
    #[serde(default, skip_serializing)]
    pub encryption_key: Option<String>,
}

/// Engine tunables that deployments may override
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub concurrency: usize,
    pub queue_size: usize,
    pub fanout_deadline_secs: u64,
    pub enable_status_sync: bool,
    pub enable_daily_summary: bool,
    pub enable_renewal: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            queue_size: MAX_QUEUE_SIZE,
            fanout_deadline_secs: FANOUT_DEADLINE.as_secs(),
            enable_status_sync: true,
            enable_daily_summary: true,
            enable_renewal: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

impl Config {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.plugin_url.is_empty() {
            return Err(CalsyncError::Config("server.plugin_url must be set".to_string()));
        }
        if self.oauth.client_id.is_empty() {
            return Err(CalsyncError::Config("oauth.client_id must be set".to_string()));
        }
        if self.platform.base_url.is_empty() {
            return Err(CalsyncError::Config("platform.base_url must be set".to_string()));
        }
        if self.engine.concurrency == 0 {
            return Err(CalsyncError::Config("engine.concurrency must be positive".to_string()));
        }
        if self.engine.queue_size == 0 {
            return Err(CalsyncError::Config("engine.queue_size must be positive".to_string()));
        }
        if self.storage.backend == StorageBackend::Sqlite && self.storage.path.is_none() {
            return Err(CalsyncError::Config(
                "storage.path is required for the sqlite backend".to_string(),
            ));
        }
        Ok(())
    }

    pub fn redirect_url(&self) -> String {
        self.oauth.redirect_url.clone().unwrap_or_else(|| self.server.oauth_redirect_url())
    }
}
