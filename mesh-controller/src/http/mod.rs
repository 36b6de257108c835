//! HTTP endpoints for syncmesh.
//!
//! Provides a health check and Prometheus metrics for the convergence loop.

pub mod health;
mod metrics;

use crate::convergence::shutdown_requested;
use crate::metrics::ControllerMetrics;
use axum::{routing::get, Extension, Router};
use std::sync::Arc;
use tokio::sync::watch;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(metrics: Arc<ControllerMetrics>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(Extension(metrics))
}

/// Bind the endpoint listener.
///
/// Separate from [`serve_on`] so callers can fail startup on a bad address.
pub async fn bind(bind_address: &str) -> std::io::Result<tokio::net::TcpListener> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "http endpoints listening");
    Ok(listener)
}

/// Serve the endpoints on an already bound listener until `shutdown` reads `true`.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    metrics: Arc<ControllerMetrics>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, build_router(metrics))
        .with_graceful_shutdown(async move { shutdown_requested(&mut shutdown).await })
        .await
}

/// Bind `bind_address` and serve until `shutdown` reads `true`.
pub async fn serve(
    bind_address: &str,
    metrics: Arc<ControllerMetrics>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    serve_on(bind(bind_address).await?, metrics, shutdown).await
}
