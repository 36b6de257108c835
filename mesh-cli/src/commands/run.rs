//! Run the convergence loop.

use anyhow::{Context, Result};
use mesh_controller::http::{self, health};
use mesh_controller::{Config, ControllerMetrics, ConvergenceLoop, Reconciler};
use std::sync::Arc;

use super::shutdown_on_signal;

/// Run the loop until a termination signal (or `max_passes` passes).
pub async fn run(config: Config, max_passes: Option<u64>) -> Result<()> {
    health::init_start_time();

    let reconciler = Reconciler::from_config(&config).context("Failed to set up clients")?;
    let metrics = Arc::new(ControllerMetrics::new());
    let shutdown = shutdown_on_signal();

    let server = if config.http.enabled {
        let bind = &config.http.bind_address;
        let listener = http::bind(bind)
            .await
            .with_context(|| format!("HTTP endpoint failed to bind {}", bind))?;
        let metrics = Arc::clone(&metrics);
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            let result = http::serve_on(listener, metrics, shutdown).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "http endpoints stopped");
            }
            result
        }))
    } else {
        None
    };

    let mut runner =
        ConvergenceLoop::new(reconciler, config.reconcile.interval()).with_metrics(metrics);
    if let Some(passes) = max_passes {
        runner = runner.with_max_passes(passes);
    }
    runner.run(shutdown).await;

    if let Some(server) = server {
        // The loop may have stopped on its pass limit rather than a signal
        server.abort();
        match server.await {
            Ok(result) => result.context("HTTP endpoint failed")?,
            Err(e) if e.is_cancelled() => {}
            Err(e) => return Err(e).context("HTTP endpoint task panicked"),
        }
    }
    Ok(())
}
