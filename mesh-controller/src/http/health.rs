//! Health check endpoint.

use crate::metrics::ControllerMetrics;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// "ok", or "degraded" while the latest passes are failing.
    pub status: String,
    /// Controller version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Passes finished since startup.
    pub passes_total: u64,
    /// Failed passes in a row.
    pub consecutive_failures: u64,
    /// Error of the last pass, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl HealthStatus {
    /// Snapshot the counters.
    pub fn from_metrics(metrics: &ControllerMetrics) -> Self {
        let uptime = START_TIME
            .get()
            .map(|start| start.elapsed().as_secs())
            .unwrap_or(0);
        let consecutive_failures = metrics.consecutive_failures();

        Self {
            status: if consecutive_failures == 0 { "ok" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            passes_total: metrics.passes_total(),
            consecutive_failures,
            last_error: metrics.last_error(),
        }
    }
}

/// Health check handler. Always 200: a failing pass is retried, not fatal.
pub async fn health_handler(
    Extension(metrics): Extension<Arc<ControllerMetrics>>,
) -> Json<HealthStatus> {
    Json(HealthStatus::from_metrics(&metrics))
}
