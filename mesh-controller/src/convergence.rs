//! The convergence loop: run a pass, sleep, repeat until shutdown.
//!
//! Transitions come from [`mesh_core::LoopState`]; this module only executes
//! the actions it returns. The loop is the single place where pass errors are
//! caught. They are logged, counted, and followed by the normal sleep.

use mesh_core::{Action, Event, LoopEvent, LoopState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, Instrument};

use crate::metrics::ControllerMetrics;
use crate::reconcile::{PassReport, Reconciler};

/// Resolve once `shutdown` reads `true`.
///
/// A dropped sender never resolves, so a loop without a signal source runs on.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Drives passes at a fixed interval.
#[derive(Debug)]
pub struct ConvergenceLoop {
    reconciler: Reconciler,
    interval: Duration,
    metrics: Arc<ControllerMetrics>,
    max_passes: Option<u64>,
}

impl ConvergenceLoop {
    /// Create a loop sleeping `interval` between passes.
    pub fn new(reconciler: Reconciler, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
            metrics: Arc::new(ControllerMetrics::new()),
            max_passes: None,
        }
    }

    /// Record into shared counters (e.g. the ones served over HTTP).
    pub fn with_metrics(mut self, metrics: Arc<ControllerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Stop after `passes` passes instead of running until shutdown.
    pub fn with_max_passes(mut self, passes: u64) -> Self {
        self.max_passes = Some(passes);
        self
    }

    /// Counters updated by this loop.
    pub fn metrics(&self) -> Arc<ControllerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until shutdown (or the pass limit). Returns the number of finished passes.
    ///
    /// Shutdown interrupts both an in-flight pass and the sleep.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let (mut state, mut actions) = LoopState::start();
        let mut finished = 0u64;
        let mut last_report = None;

        info!(
            group = %self.reconciler.settings().group,
            folder = %self.reconciler.settings().folder,
            interval_secs = self.interval.as_secs(),
            "convergence loop started"
        );

        loop {
            let mut next = None;
            for action in actions {
                match action {
                    Action::RunPass { pass } => {
                        let (event, report) = self.run_pass(pass, &mut shutdown).await;
                        last_report = report;
                        next = Some(event);
                    }
                    Action::Report(event) => {
                        finished += 1;
                        self.report(event, last_report.take());
                    }
                    Action::Sleep => next = Some(self.sleep(finished, &mut shutdown).await),
                    Action::Exit => {
                        info!(passes = finished, "convergence loop stopped");
                        return finished;
                    }
                }
            }

            let Some(event) = next else {
                return finished;
            };
            (state, actions) = state.on_event(event);
            debug!(state = ?state, "loop transition");
        }
    }

    async fn run_pass(
        &self,
        pass: u64,
        shutdown: &mut watch::Receiver<bool>,
    ) -> (Event, Option<PassReport>) {
        if *shutdown.borrow() {
            return (Event::ShutdownRequested, None);
        }

        let span = tracing::info_span!("pass", pass);
        tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => {
                info!(pass, "shutdown during pass; abandoning it");
                (Event::ShutdownRequested, None)
            }
            result = self.reconciler.run_pass().instrument(span) => match result {
                Ok(report) => (Event::PassSucceeded, Some(report)),
                Err(e) => (Event::PassFailed { error: e.to_string() }, None),
            },
        }
    }

    async fn sleep(&self, finished: u64, shutdown: &mut watch::Receiver<bool>) -> Event {
        if self.max_passes.is_some_and(|max| finished >= max) {
            return Event::ShutdownRequested;
        }

        debug!(secs = self.interval.as_secs(), "sleeping until next pass");
        tokio::select! {
            _ = shutdown_requested(shutdown) => Event::ShutdownRequested,
            _ = tokio::time::sleep(self.interval) => Event::TimerElapsed,
        }
    }

    fn report(&self, event: LoopEvent, report: Option<PassReport>) {
        match event {
            LoopEvent::PassSucceeded { pass } => {
                let report = report.unwrap_or_default();
                self.metrics.record_success(&report);
                info!(
                    pass,
                    peers = report.peers,
                    identities = report.identities,
                    devices_added = report.devices_added,
                    folders_created = report.folders_created,
                    folders_patched = report.folders_patched,
                    elapsed_ms = report.duration.as_millis() as u64,
                    "pass complete"
                );
            }
            LoopEvent::PassFailed {
                pass,
                error,
                consecutive_failures,
            } => {
                self.metrics.record_failure(&error, consecutive_failures);
                error!(
                    pass,
                    consecutive_failures,
                    error = %error,
                    "pass failed; retrying after the interval"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::reconcile::PassSettings;
    use mesh_client::{MockDiscovery, MockPeerApi};
    use mesh_types::{DeviceId, PeerAddr};
    use std::net::IpAddr;
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_secs(60);

    fn ip(n: u8) -> IpAddr {
        format!("10.0.0.{}", n).parse().unwrap()
    }

    fn peer(n: u8) -> PeerAddr {
        PeerAddr::new(ip(n), 8384)
    }

    fn fleet() -> (MockPeerApi, MockDiscovery, Reconciler) {
        let api = MockPeerApi::new();
        api.add_peer(peer(1), DeviceId::new("ID1").unwrap());
        api.add_peer(peer(2), DeviceId::new("ID2").unwrap());
        let discovery = MockDiscovery::new();
        discovery.set_peers(vec![ip(1), ip(2)]);
        let reconciler = Reconciler::new(
            Arc::new(api.clone()),
            Arc::new(discovery.clone()),
            PassSettings::from(&Config::default()),
        );
        (api, discovery, reconciler)
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_loop_runs_exact_pass_count() {
        let (api, _discovery, reconciler) = fleet();
        let (_tx, rx) = watch::channel(false);
        let runner = ConvergenceLoop::new(reconciler, INTERVAL).with_max_passes(3);

        let started = Instant::now();
        assert_eq!(runner.run(rx).await, 3);

        assert_eq!(api.status_calls(), 6);
        assert_eq!(runner.metrics().passes_total(), 3);
        assert_eq!(runner.metrics().devices_added(), 2);
        // Two sleeps between three passes
        assert!(started.elapsed() >= INTERVAL * 2);
        assert!(started.elapsed() < INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pass_is_followed_by_a_normal_one() {
        let (api, discovery, reconciler) = fleet();
        discovery.fail_next("docker socket gone");
        let (_tx, rx) = watch::channel(false);
        let runner = ConvergenceLoop::new(reconciler, INTERVAL).with_max_passes(2);

        assert_eq!(runner.run(rx).await, 2);

        let metrics = runner.metrics();
        assert_eq!(metrics.passes_total(), 2);
        assert_eq!(metrics.passes_failed(), 1);
        assert_eq!(metrics.consecutive_failures(), 0);
        assert!(api.folder_on(&peer(1), "default").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_failures_are_counted() {
        let (api, _discovery, reconciler) = fleet();
        api.set_unreachable(&peer(2), true);
        let (_tx, rx) = watch::channel(false);
        let runner = ConvergenceLoop::new(reconciler, INTERVAL).with_max_passes(3);

        assert_eq!(runner.run(rx).await, 3);

        let metrics = runner.metrics();
        assert_eq!(metrics.passes_failed(), 3);
        assert_eq!(metrics.consecutive_failures(), 3);
        assert!(metrics.last_error().unwrap().contains("10.0.0.2:8384"));
        assert!(api.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_sleep() {
        let (_api, _discovery, reconciler) = fleet();
        let (tx, rx) = watch::channel(false);
        let runner = Arc::new(ConvergenceLoop::new(reconciler, Duration::from_secs(3600)));
        let metrics = runner.metrics();

        let started = Instant::now();
        let handle = tokio::spawn({
            let runner = Arc::clone(&runner);
            async move { runner.run(rx).await }
        });

        while metrics.passes_total() < 1 {
            tokio::task::yield_now().await;
        }
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), 1);
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_in_flight_pass() {
        let (api, discovery, reconciler) = fleet();
        discovery.set_latency(Duration::from_secs(3600));
        let (tx, rx) = watch::channel(false);
        let runner = Arc::new(ConvergenceLoop::new(reconciler, INTERVAL));

        let started = Instant::now();
        let handle = tokio::spawn({
            let runner = Arc::clone(&runner);
            async move { runner.run(rx).await }
        });

        while discovery.queried_groups().is_empty() {
            tokio::task::yield_now().await;
        }
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), 0);
        assert!(started.elapsed() < Duration::from_secs(3600));
        assert_eq!(runner.metrics().passes_total(), 0);
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test]
    async fn shutdown_before_start_runs_nothing() {
        let (api, _discovery, reconciler) = fleet();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let runner = ConvergenceLoop::new(reconciler, INTERVAL);
        assert_eq!(runner.run(rx).await, 0);
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test]
    async fn shutdown_requested_sees_current_value() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown_requested(&mut rx))
            .await
            .unwrap();
    }
}
