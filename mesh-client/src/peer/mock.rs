//! In-memory peer fleet for testing.
//!
//! Behaves like a set of Syncthing daemons: each peer trusts itself from the
//! start, rejects folder sharing with devices it does not trust, and records
//! every write so tests can assert on exactly what a pass changed.

use async_trait::async_trait;
use mesh_types::{DeviceConfig, DeviceId, FolderConfig, FolderDevice, PeerAddr, SystemStatus};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::{PeerApi, PeerError};

/// A write request observed by [`MockPeerApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerWrite {
    /// `add_device`
    AddDevice {
        /// Target peer.
        peer: PeerAddr,
        /// Device added.
        device: DeviceId,
    },
    /// `create_folder`
    CreateFolder {
        /// Target peer.
        peer: PeerAddr,
        /// Folder as sent.
        folder: FolderConfig,
    },
    /// `patch_folder_devices`
    PatchFolderDevices {
        /// Target peer.
        peer: PeerAddr,
        /// Folder ID.
        folder: String,
        /// Replacement device list as sent.
        devices: Vec<DeviceId>,
    },
}

impl PeerWrite {
    /// The peer this write targeted.
    pub fn peer(&self) -> PeerAddr {
        match self {
            Self::AddDevice { peer, .. }
            | Self::CreateFolder { peer, .. }
            | Self::PatchFolderDevices { peer, .. } => *peer,
        }
    }
}

/// Mock peer control API.
///
/// Clones share state, so a test can keep one handle while the reconciler
/// owns another.
#[derive(Debug, Default, Clone)]
pub struct MockPeerApi {
    inner: Arc<Mutex<MockPeerApiInner>>,
}

#[derive(Debug, Default)]
struct MockPeerApiInner {
    peers: HashMap<PeerAddr, MockPeer>,
    writes: Vec<PeerWrite>,
    unreachable: HashSet<PeerAddr>,
    fail_next_write: HashMap<PeerAddr, String>,
    status_calls: usize,
}

#[derive(Debug)]
struct MockPeer {
    id: DeviceId,
    devices: Vec<DeviceConfig>,
    folders: Vec<FolderConfig>,
}

impl MockPeerApi {
    /// Create an empty fleet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a running peer. It trusts its own ID, like a fresh daemon.
    pub fn add_peer(&self, peer: PeerAddr, id: DeviceId) {
        let mut inner = self.inner.lock().unwrap();
        let devices = vec![DeviceConfig {
            device_id: id.clone(),
            name: None,
            auto_accept_folders: false,
        }];
        inner.peers.insert(
            peer,
            MockPeer {
                id,
                devices,
                folders: Vec::new(),
            },
        );
    }

    /// Pre-seed a trusted device without recording a write.
    pub fn seed_trust(&self, peer: &PeerAddr, device: DeviceId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.peers.get_mut(peer) {
            p.devices.push(DeviceConfig {
                device_id: device,
                name: None,
                auto_accept_folders: true,
            });
        }
    }

    /// Pre-seed a folder without recording a write.
    pub fn seed_folder(&self, peer: &PeerAddr, folder: FolderConfig) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.peers.get_mut(peer) {
            p.folders.push(folder);
        }
    }

    /// Devices a peer currently trusts, in insertion order.
    pub fn trusted(&self, peer: &PeerAddr) -> Vec<DeviceId> {
        let inner = self.inner.lock().unwrap();
        inner
            .peers
            .get(peer)
            .map(|p| p.devices.iter().map(|d| d.device_id.clone()).collect())
            .unwrap_or_default()
    }

    /// A peer's folder by ID.
    pub fn folder_on(&self, peer: &PeerAddr, folder_id: &str) -> Option<FolderConfig> {
        let inner = self.inner.lock().unwrap();
        inner
            .peers
            .get(peer)
            .and_then(|p| p.folders.iter().find(|f| f.id == folder_id).cloned())
    }

    /// Every write so far, in order.
    pub fn writes(&self) -> Vec<PeerWrite> {
        self.inner.lock().unwrap().writes.clone()
    }

    /// Forget recorded writes (peer state is kept).
    pub fn clear_writes(&self) {
        self.inner.lock().unwrap().writes.clear();
    }

    /// Number of status queries served or refused.
    pub fn status_calls(&self) -> usize {
        self.inner.lock().unwrap().status_calls
    }

    /// Make every call to `peer` fail as unreachable until restored.
    pub fn set_unreachable(&self, peer: &PeerAddr, unreachable: bool) {
        let mut inner = self.inner.lock().unwrap();
        if unreachable {
            inner.unreachable.insert(*peer);
        } else {
            inner.unreachable.remove(peer);
        }
    }

    /// Cause the next write to `peer` to fail with a 500.
    pub fn fail_next_write(&self, peer: &PeerAddr, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_write.insert(*peer, error.to_string());
    }

    /// Clear all state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockPeerApiInner::default();
    }
}

impl MockPeerApiInner {
    fn peer(&self, peer: &PeerAddr) -> Result<&MockPeer, PeerError> {
        if self.unreachable.contains(peer) {
            return Err(unreachable(peer));
        }
        self.peers.get(peer).ok_or_else(|| unreachable(peer))
    }

    /// Reachability and injected failure checks shared by every write.
    fn peer_for_write(
        &mut self,
        peer: &PeerAddr,
        method: &'static str,
        path: &str,
    ) -> Result<&mut MockPeer, PeerError> {
        if self.unreachable.contains(peer) {
            return Err(unreachable(peer));
        }
        if let Some(error) = self.fail_next_write.remove(peer) {
            return Err(api_error(peer, method, path, 500, &error));
        }
        self.peers.get_mut(peer).ok_or_else(|| unreachable(peer))
    }
}

impl MockPeer {
    fn untrusted<'a>(&self, devices: impl IntoIterator<Item = &'a DeviceId>) -> Option<DeviceId> {
        devices
            .into_iter()
            .find(|id| !self.devices.iter().any(|d| &d.device_id == *id))
            .cloned()
    }
}

fn unreachable(peer: &PeerAddr) -> PeerError {
    PeerError::Unreachable {
        peer: *peer,
        reason: "connection refused".into(),
    }
}

fn api_error(
    peer: &PeerAddr,
    method: &'static str,
    path: &str,
    status: u16,
    body: &str,
) -> PeerError {
    PeerError::Api {
        peer: *peer,
        method,
        path: path.to_string(),
        status,
        body: body.to_string(),
    }
}

#[async_trait]
impl PeerApi for MockPeerApi {
    async fn status(&self, peer: &PeerAddr) -> Result<SystemStatus, PeerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.status_calls += 1;
        let p = inner.peer(peer)?;
        Ok(SystemStatus { my_id: p.id.clone() })
    }

    async fn devices(&self, peer: &PeerAddr) -> Result<Vec<DeviceConfig>, PeerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.peer(peer)?.devices.clone())
    }

    async fn add_device(&self, peer: &PeerAddr, device: &DeviceConfig) -> Result<(), PeerError> {
        let mut inner = self.inner.lock().unwrap();
        let p = inner.peer_for_write(peer, "POST", "/rest/config/devices")?;
        // Re-adding a known device replaces it, as Syncthing does
        p.devices.retain(|d| d.device_id != device.device_id);
        p.devices.push(device.clone());
        inner.writes.push(PeerWrite::AddDevice {
            peer: *peer,
            device: device.device_id.clone(),
        });
        Ok(())
    }

    async fn folders(&self, peer: &PeerAddr) -> Result<Vec<FolderConfig>, PeerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.peer(peer)?.folders.clone())
    }

    async fn create_folder(
        &self,
        peer: &PeerAddr,
        folder: &FolderConfig,
    ) -> Result<(), PeerError> {
        let path = "/rest/config/folders";
        let mut inner = self.inner.lock().unwrap();
        let p = inner.peer_for_write(peer, "POST", path)?;
        if let Some(id) = p.untrusted(folder.devices.iter().map(|d| &d.device_id)) {
            return Err(api_error(peer, "POST", path, 400, &format!("unknown device {}", id)));
        }
        if p.folders.iter().any(|f| f.id == folder.id) {
            return Err(api_error(peer, "POST", path, 400, "folder id already exists"));
        }
        p.folders.push(folder.clone());
        inner.writes.push(PeerWrite::CreateFolder {
            peer: *peer,
            folder: folder.clone(),
        });
        Ok(())
    }

    async fn folder(&self, peer: &PeerAddr, folder_id: &str) -> Result<FolderConfig, PeerError> {
        let inner = self.inner.lock().unwrap();
        inner
            .peer(peer)?
            .folders
            .iter()
            .find(|f| f.id == folder_id)
            .cloned()
            .ok_or_else(|| {
                api_error(
                    peer,
                    "GET",
                    &format!("/rest/config/folders/{}", folder_id),
                    404,
                    "no such folder",
                )
            })
    }

    async fn patch_folder_devices(
        &self,
        peer: &PeerAddr,
        folder_id: &str,
        devices: &[DeviceId],
    ) -> Result<(), PeerError> {
        let path = format!("/rest/config/folders/{}", folder_id);
        let mut inner = self.inner.lock().unwrap();
        let p = inner.peer_for_write(peer, "PATCH", &path)?;
        if let Some(id) = p.untrusted(devices) {
            return Err(api_error(peer, "PATCH", &path, 400, &format!("unknown device {}", id)));
        }
        let folder = p
            .folders
            .iter_mut()
            .find(|f| f.id == folder_id)
            .ok_or_else(|| api_error(peer, "PATCH", &path, 404, "no such folder"))?;
        folder.devices = devices.iter().cloned().map(FolderDevice::from).collect();
        inner.writes.push(PeerWrite::PatchFolderDevices {
            peer: *peer,
            folder: folder_id.to_string(),
            devices: devices.to_vec(),
        });
        Ok(())
    }
}
