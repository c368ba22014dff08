//! Tracing subscriber setup

use calsync_domain::{CalsyncError, LogFormat, LoggingConfig, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// # Errors
/// Returns `CalsyncError::Config` for an invalid filter or when a subscriber
/// is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| CalsyncError::Config(format!("invalid log level {}: {e}", config.level)))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|e| CalsyncError::Config(format!("failed to install subscriber: {e}")))
}
