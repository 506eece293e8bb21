//! Bio Lab API Server
//!
//! REST API server for the mobile bio lab.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use biolab_api::{create_router, init_tracing, load_config, state::AppState};
use biolab_store::Stores;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = load_config().context("Failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Open the store and create application state
    let stores = Stores::connect(&config.database)
        .await
        .context("Failed to open the store")?;
    let state = Arc::new(AppState::new(config, stores).context("Invalid password settings")?);

    match state.auth.sessions.purge_expired().await {
        Ok(0) => {}
        Ok(purged) => tracing::info!(purged, "Purged expired sessions"),
        Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
    }

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Bio Lab API Server starting on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
