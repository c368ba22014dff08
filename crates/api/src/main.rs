//! Calsync - calendar availability and reminder bridge for chat platforms
//!
//! Main entry point: loads configuration, wires the context and serves HTTP
//! until Ctrl-C.

use anyhow::Context;
use calsync_infra::{config, server};
use calsync_api::utils::logging::init_tracing;
use calsync_api::AppContext;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; its absence is reported once logging is up
    let dotenv = dotenvy::dotenv();

    let config = config::load().context("failed to load configuration")?;
    init_tracing(&config.logging).context("failed to initialize logging")?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => warn!("Could not load .env file: {e}"),
    }

    let bind_address = config.server.bind_address.clone();
    let ctx = AppContext::new_with_config(config).await.context("failed to build context")?;
    ctx.start().await.context("failed to start schedulers")?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {e}"),
        }
        signal.cancel();
    });

    let served = server::serve(ctx.router(), &bind_address, shutdown.clone()).await;
    shutdown.cancel();

    ctx.shutdown().await.context("shutdown failed")?;
    served.context("HTTP server failed")?;
    info!("Calsync stopped");
    Ok(())
}
