//! Herald notification API server binary entrypoint.

use std::net::SocketAddr;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use herald_common::config::AppConfig;
use herald_notifier::NotificationService;

use herald_api::routes::create_router;
use herald_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("herald_api=info,herald_notifier=info,tower_http=info")
        }))
        .json()
        .init();

    tracing::info!("Starting Herald notification server...");

    // Load configuration
    let config = AppConfig::from_env()?;
    if config.internal_auth_secret.is_none() {
        tracing::warn!("INTERNAL_AUTH_SECRET not set, every notification request will be rejected");
    }

    // Build the notification pipeline
    let notifier = NotificationService::from_config(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HOST/PORT: {}", e))?;

    // Build application state
    let state = AppState::new(config, notifier);

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http());

    // Start server
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    tracing::info!("Herald notification server stopped.");
    Ok(())
}
