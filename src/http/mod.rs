//! HTTP API.
//!
//! Routes:
//!   POST /api/upload/          multipart `file` field, 201 with the stored dataset
//!   GET  /api/history/         most recent datasets, newest first
//!   GET  /api/datasets/{id}/   one dataset with its type breakdown
//!   GET  /api/report/{id}/     rendered report download

pub mod auth;
pub mod handlers;

use crate::config::ServerConfig;
use crate::report::ReportRenderer;
use crate::service::DatasetService;
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: DatasetService,
    pub renderer: Arc<dyn ReportRenderer>,
    /// Accepted API tokens; empty disables the check.
    pub tokens: Arc<BTreeSet<String>>,
}

impl AppState {
    pub fn new(
        service: DatasetService,
        renderer: Arc<dyn ReportRenderer>,
        tokens: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            service,
            renderer,
            tokens: Arc::new(tokens.into_iter().collect()),
        }
    }
}

/// Build the API router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/upload/", post(handlers::upload))
        .route("/api/history/", get(handlers::history))
        .route("/api/datasets/{id}/", get(handlers::dataset))
        .route("/api/report/{id}/", get(handlers::report))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until Ctrl-C.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
