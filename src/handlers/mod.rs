//! HTTP API handlers

pub mod auth;
pub mod error;
pub mod health;
pub mod import;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::services::import_processor::ImportProcessor;
use crate::services::import_store::ImportStore;

/// Room for multipart boundaries and text fields on top of the file itself
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ImportStore>,
    pub processor: Arc<ImportProcessor>,
    pub jwt_secret: Arc<str>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health::health))
        .route("/api/contacts/import", post(import::submit_import))
        .route("/api/contacts/import/:id", get(import::get_import))
        .route("/api/contacts/import/:id/cancel", post(import::cancel_import))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until Ctrl+C
pub async fn start_server(config: &Config, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(&config.http_bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_bind_addr))?;
    info!("HTTP API listening on {}", config.http_bind_addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// =============================================================================
// Test support
// =============================================================================
