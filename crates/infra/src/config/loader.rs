//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Attempt to load from environment variables
//! 2. If a required variable is missing, fall back to a config file
//! 3. Probe several paths for the file; JSON and TOML are both accepted
//!
//! Whatever the source, the result is checked with [`Config::validate`].
//!
//! ## Environment Variables
//! Required:
//! - `CALSYNC_PLUGIN_URL`: externally reachable base URL
//! - `CALSYNC_OAUTH_CLIENT_ID`, `CALSYNC_OAUTH_CLIENT_SECRET`
//! - `CALSYNC_PLATFORM_URL`, `CALSYNC_PLATFORM_TOKEN`
//!
//! Optional:
//! - `CALSYNC_BIND_ADDRESS`, `CALSYNC_PLUGIN_PATH`
//! - `CALSYNC_OAUTH_TENANT`, `CALSYNC_OAUTH_REDIRECT_URL`
//! - `CALSYNC_PLATFORM_BOT_USER_ID`
//! - `CALSYNC_GRAPH_URL`, `CALSYNC_SUPERUSER_ENABLED`
//! - `CALSYNC_STORAGE_BACKEND` (`memory` or `sqlite`), `CALSYNC_STORAGE_PATH`,
//!   `CALSYNC_ENCRYPTION_KEY`
//! - `CALSYNC_CONCURRENCY`, `CALSYNC_QUEUE_SIZE`, `CALSYNC_FANOUT_DEADLINE_SECS`
//! - `CALSYNC_ENABLE_STATUS_SYNC`, `CALSYNC_ENABLE_DAILY_SUMMARY`,
//!   `CALSYNC_ENABLE_RENEWAL`
//! - `CALSYNC_LOG_LEVEL`, `CALSYNC_LOG_FORMAT` (`pretty` or `json`)
//!
//! ## File Locations
//! `config.{toml,json}` and `calsync.{toml,json}` in the working directory
//! and its two parents, then next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use calsync_domain::{
    CalsyncError, Config, EngineConfig, LogFormat, LoggingConfig, OAuthConfig, PlatformConfig,
    RemoteConfig, Result, ServerConfig, StorageBackend, StorageConfig,
};

/// Load configuration from the environment, falling back to a file
///
/// # Errors
/// Returns `CalsyncError::Config` when neither source yields a valid
/// configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `CALSYNC_*` environment variables
///
/// # Errors
/// Returns `CalsyncError::Config` if a required variable is missing or a
/// value does not parse.
pub fn load_from_env() -> Result<Config> {
    let server_defaults = ServerConfig::default();
    let server = ServerConfig {
        bind_address: env_or("CALSYNC_BIND_ADDRESS", server_defaults.bind_address),
        plugin_url: env_var("CALSYNC_PLUGIN_URL")?,
        plugin_url_path: env_or("CALSYNC_PLUGIN_PATH", server_defaults.plugin_url_path),
    };

    let oauth = OAuthConfig {
        client_id: env_var("CALSYNC_OAUTH_CLIENT_ID")?,
        client_secret: env_var("CALSYNC_OAUTH_CLIENT_SECRET")?,
        tenant: env_or("CALSYNC_OAUTH_TENANT", "common".to_string()),
        redirect_url: std::env::var("CALSYNC_OAUTH_REDIRECT_URL").ok(),
        scopes: default_scopes(),
    };

    let platform = PlatformConfig {
        base_url: env_var("CALSYNC_PLATFORM_URL")?,
        bot_token: env_var("CALSYNC_PLATFORM_TOKEN")?,
        bot_user_id: env_or("CALSYNC_PLATFORM_BOT_USER_ID", String::new()),
    };

    let remote_defaults = RemoteConfig::default();
    let remote = RemoteConfig {
        graph_base_url: env_or("CALSYNC_GRAPH_URL", remote_defaults.graph_base_url),
        superuser_enabled: env_bool("CALSYNC_SUPERUSER_ENABLED", remote_defaults.superuser_enabled),
    };

    let storage = StorageConfig {
        backend: match std::env::var("CALSYNC_STORAGE_BACKEND").ok().as_deref() {
            None | Some("memory") => StorageBackend::Memory,
            Some("sqlite") => StorageBackend::Sqlite,
            Some(other) => {
                return Err(CalsyncError::Config(format!("Unknown storage backend: {other}")))
            }
        },
        path: std::env::var("CALSYNC_STORAGE_PATH").ok(),
        encryption_key: std::env::var("CALSYNC_ENCRYPTION_KEY").ok(),
    };

    let engine_defaults = EngineConfig::default();
    let engine = EngineConfig {
        concurrency: env_parse("CALSYNC_CONCURRENCY", engine_defaults.concurrency)?,
        queue_size: env_parse("CALSYNC_QUEUE_SIZE", engine_defaults.queue_size)?,
        fanout_deadline_secs: env_parse(
            "CALSYNC_FANOUT_DEADLINE_SECS",
            engine_defaults.fanout_deadline_secs,
        )?,
        enable_status_sync: env_bool("CALSYNC_ENABLE_STATUS_SYNC", engine_defaults.enable_status_sync),
        enable_daily_summary: env_bool(
            "CALSYNC_ENABLE_DAILY_SUMMARY",
            engine_defaults.enable_daily_summary,
        ),
        enable_renewal: env_bool("CALSYNC_ENABLE_RENEWAL", engine_defaults.enable_renewal),
    };

    let logging_defaults = LoggingConfig::default();
    let logging = LoggingConfig {
        level: env_or("CALSYNC_LOG_LEVEL", logging_defaults.level),
        format: match std::env::var("CALSYNC_LOG_FORMAT").ok().as_deref() {
            None => logging_defaults.format,
            Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            Some(other) => {
                return Err(CalsyncError::Config(format!("Unknown log format: {other}")))
            }
        },
    };

    let config = Config { server, oauth, remote, platform, storage, engine, logging };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations with
/// [`probe_config_paths`].
///
/// # Errors
/// Returns `CalsyncError::Config` if the file is missing, unreadable or
/// invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CalsyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CalsyncError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CalsyncError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration text; the format follows the file extension
///
/// # Errors
/// Returns `CalsyncError::Config` for unknown extensions or invalid content.
pub fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CalsyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CalsyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CalsyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 8] = [
        "config.toml",
        "config.json",
        "calsync.toml",
        "calsync.json",
        "../config.toml",
        "../config.json",
        "../../config.toml",
        "../../config.json",
    ];

    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(NAMES.iter().map(|name| cwd.join(name)));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn default_scopes() -> Vec<String> {
    // Round-trip through serde so the list stays defined in one place.
    serde_json::from_str::<OAuthConfig>(r#"{"client_id":"","client_secret":""}"#)
        .map(|oauth| oauth.scopes)
        .unwrap_or_default()
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CalsyncError::Config(format!("Missing required environment variable: {key}")))
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| CalsyncError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const REQUIRED: [(&str, &str); 5] = [
        ("CALSYNC_PLUGIN_URL", "https://chat.example.com"),
        ("CALSYNC_OAUTH_CLIENT_ID", "client"),
        ("CALSYNC_OAUTH_CLIENT_SECRET", "secret"),
        ("CALSYNC_PLATFORM_URL", "https://chat.example.com"),
        ("CALSYNC_PLATFORM_TOKEN", "bot-token"),
    ];

    fn set_required() {
        for (key, value) in REQUIRED {
            std::env::set_var(key, value);
        }
    }

    fn clear(keys: &[&str]) {
        for (key, _) in REQUIRED {
            std::env::remove_var(key);
        }
        for key in keys {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("CALSYNC_TEST_BOOL_YES", "YES");
        std::env::set_var("CALSYNC_TEST_BOOL_OFF", "off");
        assert!(env_bool("CALSYNC_TEST_BOOL_YES", false));
        assert!(!env_bool("CALSYNC_TEST_BOOL_OFF", true));

        std::env::remove_var("CALSYNC_TEST_BOOL_MISSING");
        assert!(env_bool("CALSYNC_TEST_BOOL_MISSING", true));

        std::env::remove_var("CALSYNC_TEST_BOOL_YES");
        std::env::remove_var("CALSYNC_TEST_BOOL_OFF");
    }

    #[test]
    fn load_from_env_with_required_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_required();
        std::env::set_var("CALSYNC_CONCURRENCY", "8");
        std::env::set_var("CALSYNC_LOG_FORMAT", "json");
        std::env::set_var("CALSYNC_SUPERUSER_ENABLED", "true");

        let result = load_from_env();
        clear(&["CALSYNC_CONCURRENCY", "CALSYNC_LOG_FORMAT", "CALSYNC_SUPERUSER_ENABLED"]);

        let config = result.expect("config from env");
        assert_eq!(config.engine.concurrency, 8);
        assert_eq!(config.engine.queue_size, 1024);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.remote.superuser_enabled);
        assert_eq!(config.oauth.tenant, "common");
        assert!(config.oauth.scopes.iter().any(|s| s == "offline_access"));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_required();
        std::env::remove_var("CALSYNC_OAUTH_CLIENT_SECRET");

        let result = load_from_env();
        clear(&[]);

        assert!(matches!(result, Err(CalsyncError::Config(msg)) if msg.contains("CLIENT_SECRET")));
    }

    #[test]
    fn load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_required();
        std::env::set_var("CALSYNC_QUEUE_SIZE", "lots");

        let result = load_from_env();
        clear(&["CALSYNC_QUEUE_SIZE"]);

        assert!(matches!(result, Err(CalsyncError::Config(_))));
    }

    #[test]
    fn sqlite_backend_without_path_is_rejected() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_required();
        std::env::set_var("CALSYNC_STORAGE_BACKEND", "sqlite");
        std::env::remove_var("CALSYNC_STORAGE_PATH");

        let result = load_from_env();
        clear(&["CALSYNC_STORAGE_BACKEND"]);

        assert!(matches!(result, Err(CalsyncError::Config(_))));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let result = parse_config("", Path::new("config.yaml"));
        assert!(matches!(result, Err(CalsyncError::Config(msg)) if msg.contains("yaml")));
    }
}
