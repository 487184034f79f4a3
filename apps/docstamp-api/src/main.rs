//! DocStamp API Server

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use docstamp_api::{build_router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docstamp_api=info".parse()?)
                .add_directive("docstamp_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = Config::from_env()?;

    // Initialize application state
    info!("Initializing DocStamp API...");
    let state = Arc::new(AppState::new(&config).await?);

    let app = build_router(Arc::clone(&state), &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting DocStamp API on http://{}", addr);
    info!(
        "Documents from {}, signed outputs to {}",
        config.documents_dir.display(),
        config.signed_dir.display()
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
