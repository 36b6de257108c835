//! One convergence pass: discover, resolve, reconcile devices, reconcile the
//! folder.
//!
//! Stages run strictly in that order. Within a stage, peers are worked on
//! concurrently up to a limit, and every peer is attempted before the stage
//! reports its failures. A failed stage ends the pass: nothing after it runs.

mod devices;
mod folders;
mod identity;

pub use devices::{reconcile_devices, reconcile_peer_devices};
pub use folders::{reconcile_folder, reconcile_peer_folder, FolderChange, FolderTotals};
pub use identity::{distinct_peers, resolve_identities, resolve_identity, PeerIdentity};

use futures_util::stream::{self, StreamExt};
use mesh_client::{
    Discovery, DnsDiscovery, DockerDiscovery, DockerDiscoveryConfig, HttpPeerApi, PeerApi,
    PeerApiConfig, PeerError, StaticDiscovery,
};
use mesh_core::DesiredSet;
use mesh_types::PeerAddr;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use crate::config::{Config, DiscoveryBackend};
use crate::error::{ControllerError, ReconcileResult};

/// Run `work` for every peer, at most `limit` at a time.
///
/// Results keep the order of `peers`; failures are collected, not short-circuited.
pub(crate) async fn fan_out<T, F, Fut>(
    peers: &[PeerAddr],
    limit: usize,
    work: F,
) -> (Vec<T>, Vec<PeerError>)
where
    F: Fn(PeerAddr) -> Fut,
    Fut: Future<Output = Result<T, PeerError>>,
{
    let results: Vec<Result<T, PeerError>> = stream::iter(peers.iter().copied())
        .map(work)
        .buffered(limit.max(1))
        .collect()
        .await;

    let mut done = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(value) => done.push(value),
            Err(e) => failures.push(e),
        }
    }
    (done, failures)
}

/// What one pass found and changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Addresses returned by discovery.
    pub peers: usize,
    /// Distinct identities resolved.
    pub identities: usize,
    /// Trust entries added.
    pub devices_added: usize,
    /// Folders created.
    pub folders_created: usize,
    /// Sharing lists replaced.
    pub folders_patched: usize,
    /// Peers whose sharing list already matched.
    pub folders_already_shared: usize,
    /// Wall time of the pass.
    pub duration: Duration,
}

impl PassReport {
    /// True when the pass issued no write at all.
    pub fn is_noop(&self) -> bool {
        self.devices_added == 0 && self.folders_created == 0 && self.folders_patched == 0
    }
}

/// Fixed inputs of every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSettings {
    /// Discovery group.
    pub group: String,
    /// Folder kept shared.
    pub folder: String,
    /// Peer API port.
    pub port: u16,
    /// Concurrent peers per stage.
    pub max_concurrent: usize,
}

impl From<&Config> for PassSettings {
    fn from(config: &Config) -> Self {
        Self {
            group: config.discovery.group.clone(),
            folder: config.reconcile.folder.clone(),
            port: config.peers.port,
            max_concurrent: config.peers.max_concurrent,
        }
    }
}

/// Runs passes against a peer API and a discovery backend.
#[derive(Clone)]
pub struct Reconciler {
    api: Arc<dyn PeerApi>,
    discovery: Arc<dyn Discovery>,
    settings: PassSettings,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler from its collaborators.
    pub fn new(
        api: Arc<dyn PeerApi>,
        discovery: Arc<dyn Discovery>,
        settings: PassSettings,
    ) -> Self {
        Self {
            api,
            discovery,
            settings,
        }
    }

    /// Build the HTTP peer client and the configured discovery backend.
    pub fn from_config(config: &Config) -> Result<Self, ControllerError> {
        let api = HttpPeerApi::new(PeerApiConfig {
            api_key: config.peers.api_key.clone(),
            timeout: config.peers.request_timeout(),
        })
        .map_err(|e| ControllerError::ClientSetup(e.to_string()))?;

        Ok(Self::new(
            Arc::new(api),
            build_discovery(config)?,
            PassSettings::from(config),
        ))
    }

    /// Settings every pass runs with.
    pub fn settings(&self) -> &PassSettings {
        &self.settings
    }

    /// Current peer addresses.
    pub async fn discover(&self) -> ReconcileResult<Vec<PeerAddr>> {
        let ips = self.discovery.list_peers(&self.settings.group).await?;
        let peers: Vec<PeerAddr> = ips
            .into_iter()
            .map(|ip| PeerAddr::new(ip, self.settings.port))
            .collect();
        info!(group = %self.settings.group, peers = ?peers, "discovered peers");
        Ok(peers)
    }

    /// Discover and resolve without writing anything.
    pub async fn survey(&self) -> ReconcileResult<Vec<PeerIdentity>> {
        let peers = self.discover().await?;
        resolve_identities(self.api.as_ref(), &peers, self.settings.max_concurrent).await
    }

    /// Run one full pass.
    ///
    /// Identity resolution completes for every peer before any write, so a
    /// peer that cannot be resolved leaves the whole fleet untouched.
    pub async fn run_pass(&self) -> ReconcileResult<PassReport> {
        let started = Instant::now();
        let api = self.api.as_ref();
        let limit = self.settings.max_concurrent;

        let peers = self.discover().await?;
        if peers.is_empty() {
            info!(group = %self.settings.group, "no peers discovered; nothing to reconcile");
        }

        let identities = resolve_identities(api, &peers, limit).await?;
        let desired: DesiredSet = identities.iter().map(|p| p.device.clone()).collect();
        let targets = distinct_peers(&identities);

        let devices_added = reconcile_devices(api, &targets, &desired, limit).await?;
        let folders =
            reconcile_folder(api, &targets, &desired, &self.settings.folder, limit).await?;

        Ok(PassReport {
            peers: peers.len(),
            identities: desired.len(),
            devices_added,
            folders_created: folders.created,
            folders_patched: folders.patched,
            folders_already_shared: folders.already_shared,
            duration: started.elapsed(),
        })
    }
}

/// The discovery backend selected in `config`.
pub fn build_discovery(config: &Config) -> Result<Arc<dyn Discovery>, ControllerError> {
    let discovery = &config.discovery;
    let backend: Arc<dyn Discovery> = match discovery.backend {
        DiscoveryBackend::Docker => Arc::new(DockerDiscovery::new(DockerDiscoveryConfig {
            socket: discovery.docker_socket.clone(),
            host: discovery.docker_host.clone(),
            network: discovery.network.clone(),
            timeout: config.peers.request_timeout(),
        })?),
        DiscoveryBackend::Dns => Arc::new(DnsDiscovery::new(discovery.dns_prefix.clone())),
        DiscoveryBackend::Static => {
            Arc::new(StaticDiscovery::new(discovery.static_peers.iter().copied()))
        }
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use mesh_client::{MockDiscovery, MockPeerApi, PeerWrite};
    use mesh_types::{DeviceId, FolderConfig};
    use std::net::IpAddr;

    fn ip(n: u8) -> IpAddr {
        format!("10.0.0.{}", n).parse().unwrap()
    }

    fn peer(n: u8) -> PeerAddr {
        PeerAddr::new(ip(n), 8384)
    }

    fn id(s: &str) -> DeviceId {
        DeviceId::new(s).unwrap()
    }

    fn settings() -> PassSettings {
        PassSettings::from(&Config::default())
    }

    fn fleet(n: u8) -> (MockPeerApi, MockDiscovery, Reconciler) {
        let api = MockPeerApi::new();
        let discovery = MockDiscovery::new();
        for i in 1..=n {
            api.add_peer(peer(i), id(&format!("ID{}", i)));
        }
        discovery.set_peers((1..=n).map(ip).collect());
        let reconciler = Reconciler::new(
            Arc::new(api.clone()),
            Arc::new(discovery.clone()),
            settings(),
        );
        (api, discovery, reconciler)
    }

    #[tokio::test]
    async fn fresh_fleet_converges_in_one_pass() {
        let (api, discovery, reconciler) = fleet(2);

        let report = reconciler.run_pass().await.unwrap();

        assert_eq!(discovery.queried_groups(), vec!["syncthing_syncthing"]);
        for n in 1..=2 {
            let mut trusted = api.trusted(&peer(n));
            trusted.sort();
            assert_eq!(trusted, vec![id("ID1"), id("ID2")]);

            let mut shared = api.folder_on(&peer(n), "default").unwrap().shared_with();
            shared.sort();
            assert_eq!(shared, vec![id("ID1"), id("ID2")]);
        }
        assert_eq!(report.peers, 2);
        assert_eq!(report.identities, 2);
        assert_eq!(report.devices_added, 2);
        assert_eq!(report.folders_created, 2);
        assert_eq!(report.folders_patched, 0);
    }

    #[tokio::test]
    async fn converged_fleet_is_left_alone() {
        let (api, _discovery, reconciler) = fleet(3);
        reconciler.run_pass().await.unwrap();
        api.clear_writes();

        let report = reconciler.run_pass().await.unwrap();

        assert!(report.is_noop());
        assert_eq!(report.folders_already_shared, 3);
        assert!(api.writes().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_peer_aborts_before_any_write() {
        let (api, discovery, reconciler) = fleet(2);
        discovery.set_peers(vec![ip(1), ip(2), ip(3)]);

        let err = reconciler.run_pass().await.unwrap_err();

        assert_eq!(err.peers(), vec![peer(3)]);
        assert!(api.writes().is_empty());

        // Next pass proceeds normally once the peer is gone
        discovery.set_peers(vec![ip(1), ip(2)]);
        reconciler.run_pass().await.unwrap();
        assert!(!api.writes().is_empty());
    }

    #[tokio::test]
    async fn discovery_failure_contacts_no_peer() {
        let (api, discovery, reconciler) = fleet(2);
        discovery.fail_next("socket gone");

        let err = reconciler.run_pass().await.unwrap_err();

        assert!(matches!(err, ReconcileError::Discovery(_)));
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test]
    async fn empty_fleet_is_a_successful_noop() {
        let (api, discovery, reconciler) = fleet(0);
        discovery.set_peers(Vec::new());

        let report = reconciler.run_pass().await.unwrap();

        assert_eq!(report.peers, 0);
        assert!(report.is_noop());
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test]
    async fn device_failure_skips_folder_stage() {
        let (api, _discovery, reconciler) = fleet(2);
        api.fail_next_write(&peer(1), "config locked");

        reconciler.run_pass().await.unwrap_err();

        assert!(api
            .writes()
            .iter()
            .all(|w| matches!(w, PeerWrite::AddDevice { .. })));
        assert!(api.folder_on(&peer(2), "default").is_none());
    }

    #[tokio::test]
    async fn multi_homed_peer_is_reconciled_once() {
        let api = MockPeerApi::new();
        api.add_peer(peer(1), id("ID1"));
        api.add_peer(peer(2), id("ID2"));
        // Second address of the daemon behind 10.0.0.1
        let alias = PeerAddr::new("10.0.9.1".parse().unwrap(), 8384);
        api.add_peer(alias, id("ID1"));
        let discovery = MockDiscovery::new();
        discovery.set_peers(vec![ip(1), ip(2), alias.ip()]);
        let reconciler = Reconciler::new(Arc::new(api.clone()), Arc::new(discovery), settings());

        let report = reconciler.run_pass().await.unwrap();

        assert_eq!(report.peers, 3);
        assert_eq!(report.identities, 2);
        assert!(api.writes().iter().all(|w| w.peer() != alias));
    }

    #[tokio::test]
    async fn existing_partial_share_is_completed() {
        let (api, _discovery, reconciler) = fleet(2);
        api.seed_trust(&peer(1), id("ID2"));
        api.seed_folder(&peer(1), FolderConfig::send_receive("default", [id("ID1")]));

        let report = reconciler.run_pass().await.unwrap();

        assert_eq!(report.folders_patched, 1);
        assert!(api.writes().contains(&PeerWrite::PatchFolderDevices {
            peer: peer(1),
            folder: "default".into(),
            devices: vec![id("ID1"), id("ID2")],
        }));
    }

    #[tokio::test]
    async fn survey_writes_nothing() {
        let (api, _discovery, reconciler) = fleet(2);

        let identities = reconciler.survey().await.unwrap();

        assert_eq!(
            identities,
            vec![
                PeerIdentity { peer: peer(1), device: id("ID1") },
                PeerIdentity { peer: peer(2), device: id("ID2") },
            ]
        );
        assert!(api.writes().is_empty());
    }

    #[test]
    fn static_backend_is_built_from_config() {
        let mut config = Config::default();
        config.discovery.backend = DiscoveryBackend::Static;
        config.discovery.static_peers = vec![ip(1)];
        assert!(build_discovery(&config).is_ok());
    }

    #[tokio::test]
    async fn fan_out_keeps_order_and_collects_failures() {
        let peers = [peer(1), peer(2), peer(3)];
        let (done, failures) = fan_out(&peers, 2, |p| async move {
            if p == peer(2) {
                Err(PeerError::Unreachable {
                    peer: p,
                    reason: "down".into(),
                })
            } else {
                Ok(p.ip())
            }
        })
        .await;

        assert_eq!(done, vec![ip(1), ip(3)]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].peer(), peer(2));
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_failures_follow_peer_order_not_completion() {
        let peers = [peer(1), peer(2), peer(3)];
        let (done, failures) = fan_out(&peers, 3, |p| async move {
            // Earlier peers answer later
            let secs = match p {
                p if p == peer(1) => 10,
                p if p == peer(2) => 5,
                _ => 1,
            };
            tokio::time::sleep(Duration::from_secs(secs)).await;
            Err::<(), _>(PeerError::Unreachable {
                peer: p,
                reason: "down".into(),
            })
        })
        .await;

        assert!(done.is_empty());
        let order: Vec<PeerAddr> = failures.iter().map(PeerError::peer).collect();
        assert_eq!(order, vec![peer(1), peer(2), peer(3)]);
    }
}
