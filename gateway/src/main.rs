use std::sync::Arc;

use anyhow::Context;
use opsgate_core::{http_client, Brain, Config};
use opsgate_gateway::{build_router, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging Setup
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    info!("opsgate initializing...");

    // 2. Configuration and the shared HTTP client
    let config = Arc::new(Config::from_env().context("invalid configuration")?);
    let http = http_client(&config).context("failed to build HTTP client")?;

    // 3. Initialize the Brain, with a quick connectivity check
    let brain = Brain::new(&config, http.clone());
    match brain.ping().await {
        Ok(msg) => info!("Brain status: {msg}"),
        Err(e) => warn!("Brain is configured but unresponsive: {e}"),
    }

    // 4. Load the tool registry once; the model sees it on every request
    let registry = opsgate_tools::builtin_registry().context("invalid tool registry")?;
    info!("Loaded {} tools available to the model", registry.len());

    // 5. Bundle state and define routes
    let state = AppState::new(config.clone(), Arc::new(brain), Arc::new(registry), http);
    let app = build_router(state);

    // 6. Start server
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Gateway listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
