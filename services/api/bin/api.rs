//! Main Entrypoint for the Cadence API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the knowledge pillars and the base instructions.
//! 3. Initializing the generation backend.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use cadence_api::{
    config::Config,
    router::create_router,
    startup::{build_adapter, init_tracing, load_registry, load_system_prompt},
    state::AppState,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    init_tracing(&config, false);
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Pillars and Instructions ---
    let registry = Arc::new(load_registry(&config));
    let system_prompt = load_system_prompt(&config.prompts_path)?;

    // --- 4. Initialize the Generation Backend ---
    let adapter = build_adapter(&config);
    if let Err(e) = adapter.check_connection().await {
        warn!(error = %e, "Generation backend not reachable yet; requests will fail until it is");
    }

    let app_state = Arc::new(AppState::new(
        config.clone(),
        registry,
        Arc::new(adapter),
        system_prompt,
    ));

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = config.provider.name(),
        model = %config.chat_model,
        mode = %config.session_mode,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
