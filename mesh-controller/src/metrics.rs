//! Pass counters shared by the convergence loop and the HTTP endpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::reconcile::PassReport;

/// Counters and last-pass status.
#[derive(Debug, Default)]
pub struct ControllerMetrics {
    passes_total: AtomicU64,
    passes_failed: AtomicU64,
    devices_added: AtomicU64,
    folders_created: AtomicU64,
    folders_patched: AtomicU64,
    peers_last_pass: AtomicU64,
    consecutive_failures: AtomicU64,
    last_error: RwLock<Option<String>>,
}

impl ControllerMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful pass.
    pub fn record_success(&self, report: &PassReport) {
        self.passes_total.fetch_add(1, Ordering::Relaxed);
        self.devices_added
            .fetch_add(report.devices_added as u64, Ordering::Relaxed);
        self.folders_created
            .fetch_add(report.folders_created as u64, Ordering::Relaxed);
        self.folders_patched
            .fetch_add(report.folders_patched as u64, Ordering::Relaxed);
        self.peers_last_pass
            .store(report.peers as u64, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.write() {
            *last = None;
        }
    }

    /// Record a failed pass.
    pub fn record_failure(&self, error: &str, consecutive_failures: u32) {
        self.passes_total.fetch_add(1, Ordering::Relaxed);
        self.passes_failed.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures
            .store(u64::from(consecutive_failures), Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.write() {
            *last = Some(error.to_string());
        }
    }

    /// Passes finished, successful or not.
    pub fn passes_total(&self) -> u64 {
        self.passes_total.load(Ordering::Relaxed)
    }

    /// Passes that ended in an error.
    pub fn passes_failed(&self) -> u64 {
        self.passes_failed.load(Ordering::Relaxed)
    }

    /// Devices added across all passes.
    pub fn devices_added(&self) -> u64 {
        self.devices_added.load(Ordering::Relaxed)
    }

    /// Folders created across all passes.
    pub fn folders_created(&self) -> u64 {
        self.folders_created.load(Ordering::Relaxed)
    }

    /// Folder sharing lists replaced across all passes.
    pub fn folders_patched(&self) -> u64 {
        self.folders_patched.load(Ordering::Relaxed)
    }

    /// Peers seen by the last successful pass.
    pub fn peers_last_pass(&self) -> u64 {
        self.peers_last_pass.load(Ordering::Relaxed)
    }

    /// Failed passes in a row.
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Error of the last pass, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().ok().and_then(|e| e.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> PassReport {
        PassReport {
            peers: 3,
            devices_added: 4,
            folders_created: 1,
            folders_patched: 2,
            ..PassReport::default()
        }
    }

    #[test]
    fn success_accumulates_counters() {
        let metrics = ControllerMetrics::new();
        metrics.record_success(&report());
        metrics.record_success(&report());

        assert_eq!(metrics.passes_total(), 2);
        assert_eq!(metrics.passes_failed(), 0);
        assert_eq!(metrics.devices_added(), 8);
        assert_eq!(metrics.folders_created(), 2);
        assert_eq!(metrics.folders_patched(), 4);
        assert_eq!(metrics.peers_last_pass(), 3);
    }

    #[test]
    fn success_clears_failure_state() {
        let metrics = ControllerMetrics::new();
        metrics.record_failure("discovery failed", 2);
        assert_eq!(metrics.last_error().as_deref(), Some("discovery failed"));
        assert_eq!(metrics.consecutive_failures(), 2);

        metrics.record_success(&report());
        assert_eq!(metrics.last_error(), None);
        assert_eq!(metrics.consecutive_failures(), 0);
        assert_eq!(metrics.passes_failed(), 1);
    }
}
