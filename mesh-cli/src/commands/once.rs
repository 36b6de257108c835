//! Run a single convergence pass.

use anyhow::{Context, Result};
use mesh_controller::{Config, PassReport, Reconciler};

use super::shutdown_on_signal;

/// Run one pass. Errors propagate, so the process exits non-zero.
pub async fn run(config: Config) -> Result<()> {
    let reconciler = Reconciler::from_config(&config).context("Failed to set up clients")?;
    let mut shutdown = shutdown_on_signal();

    let report = tokio::select! {
        result = reconciler.run_pass() => result.context("Pass failed")?,
        _ = mesh_controller::shutdown_requested(&mut shutdown) => {
            anyhow::bail!("Interrupted before the pass finished");
        }
    };

    println!("{}", summary(&report));
    Ok(())
}

fn summary(report: &PassReport) -> String {
    if report.is_noop() {
        return format!(
            "{} peers, {} identities: already converged",
            report.peers, report.identities
        );
    }
    format!(
        "{} peers, {} identities: {} devices added, {} folders created, {} folders patched",
        report.peers,
        report.identities,
        report.devices_added,
        report.folders_created,
        report.folders_patched
    )
}
