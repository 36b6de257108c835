//! Prometheus metrics endpoint.

use crate::metrics::ControllerMetrics;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Counters are monotonic since startup; gauges describe the latest pass.
pub async fn metrics_handler(
    Extension(metrics): Extension<Arc<ControllerMetrics>>,
) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(&metrics),
    )
}

fn render(m: &ControllerMetrics) -> String {
    format!(
        r#"# HELP syncmesh_info Controller information
# TYPE syncmesh_info gauge
syncmesh_info{{version="{version}"}} 1

# HELP syncmesh_passes_total Convergence passes finished
# TYPE syncmesh_passes_total counter
syncmesh_passes_total {passes}

# HELP syncmesh_passes_failed_total Convergence passes that ended in an error
# TYPE syncmesh_passes_failed_total counter
syncmesh_passes_failed_total {failed}

# HELP syncmesh_devices_added_total Trusted devices added to peers
# TYPE syncmesh_devices_added_total counter
syncmesh_devices_added_total {devices}

# HELP syncmesh_folders_created_total Folders created on peers
# TYPE syncmesh_folders_created_total counter
syncmesh_folders_created_total {created}

# HELP syncmesh_folders_patched_total Folder sharing lists replaced
# TYPE syncmesh_folders_patched_total counter
syncmesh_folders_patched_total {patched}

# HELP syncmesh_peers Peers discovered by the last successful pass
# TYPE syncmesh_peers gauge
syncmesh_peers {peers}

# HELP syncmesh_consecutive_failures Failed passes in a row
# TYPE syncmesh_consecutive_failures gauge
syncmesh_consecutive_failures {streak}
"#,
        version = env!("CARGO_PKG_VERSION"),
        passes = m.passes_total(),
        failed = m.passes_failed(),
        devices = m.devices_added(),
        created = m.folders_created(),
        patched = m.folders_patched(),
        peers = m.peers_last_pass(),
        streak = m.consecutive_failures(),
    )
}
