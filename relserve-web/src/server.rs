//! HTTP server for the release catalog
//!
//! Serves the JSON catalog endpoints and installer downloads. The catalog is
//! rebuilt from disk on every request.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use relserve_core::{ReleaseCatalog, ServerConfig};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers::{all_releases, download_release, latest_release};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Catalog builder over the releases directory
    pub catalog: Arc<ReleaseCatalog>,
    /// Configuration the server was started with
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Builds handler state from server configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            catalog: Arc::new(ReleaseCatalog::from_config(&config)),
            config: Arc::new(config),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/releases/all.json", get(all_releases))
        .route("/releases/latest.json", get(latest_release))
        .route("/releases/download/{filename}", get(download_release))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the release server until interrupted.
///
/// Creates the releases directory if it does not exist yet.
///
/// # Errors
/// - `RelserveError::Configuration` - Base URL is invalid
/// - `RelserveError::Catalog` - Releases directory cannot be created
/// - `RelserveError::Io` - Listener could not bind or the server failed
pub async fn run_server(config: ServerConfig) -> relserve_core::Result<()> {
    config.validate()?;

    let state = AppState::new(config);
    state.catalog.ensure_releases_dir().await?;

    let addr = state.config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Release server listening on {}", listener.local_addr()?);
    info!("Base URL: {}", state.config.base_url);
    info!(
        "Serving releases from: {}",
        state.catalog.releases_dir().display()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Release server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
