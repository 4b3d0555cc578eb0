//! # Userbase API Server
//!
//! Serves the session boundary (`/users/...`) and the health check on top of
//! the in-process actor directory.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p userbase-api
//! ```

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use userbase_api::{
    actors::Directory,
    app::{build_router, AppState},
    config::Config,
};
use userbase_shared::billing::MockPaymentEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "userbase_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Userbase API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let plans = config.plan_registry()?;
    tracing::info!(
        plans = ?plans.all().map(|p| p.slug.as_str()).collect::<Vec<_>>(),
        storage = ?config.storage.dir,
        "Configuration loaded"
    );

    let directory = Directory::new(
        config.storage_config(),
        plans,
        Arc::new(MockPaymentEngine::new()),
    );

    let bind_address = config.bind_address();
    let state = AppState::new(directory.clone(), config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    directory.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, exiting...");
}
