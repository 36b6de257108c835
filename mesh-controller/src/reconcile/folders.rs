//! Folder reconciliation: one named folder on every peer, shared with exactly
//! the desired identities.

use mesh_client::{PeerApi, PeerError};
use mesh_core::{find_folder, plan_folder_sharing, DesiredSet, FolderPlan};
use mesh_types::{FolderConfig, PeerAddr};
use tracing::info;

use super::fan_out;
use crate::error::{ReconcileError, ReconcileResult};

/// What reconciling one peer's folder changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderChange {
    /// The folder did not exist and was created.
    pub created: bool,
    /// The sharing list was replaced.
    pub patched: bool,
}

/// Totals over all peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderTotals {
    /// Folders created.
    pub created: usize,
    /// Sharing lists replaced.
    pub patched: usize,
    /// Peers whose sharing list already matched.
    pub already_shared: usize,
}

/// Ensure `name` exists on `peer` and is shared with exactly `desired`.
///
/// A missing folder is created with the devices the peer trusts right now,
/// then compared like any other.
pub async fn reconcile_peer_folder(
    api: &dyn PeerApi,
    peer: &PeerAddr,
    desired: &DesiredSet,
    name: &str,
) -> Result<FolderChange, PeerError> {
    let mut change = FolderChange::default();

    let folders = api.folders(peer).await?;
    let folder_id = match find_folder(&folders, name) {
        Some(existing) => existing.id.clone(),
        None => {
            let trusted = api.devices(peer).await?.into_iter().map(|d| d.device_id);
            let folder = FolderConfig::send_receive(name, trusted);
            info!(
                peer = %peer,
                folder = %folder.id,
                devices = ?folder.shared_with(),
                "creating folder"
            );
            api.create_folder(peer, &folder).await?;
            change.created = true;
            folder.id
        }
    };

    let folder = api.folder(peer, &folder_id).await?;
    match plan_folder_sharing(&folder.shared_with(), desired) {
        FolderPlan::AlreadyShared => {
            info!(
                peer = %peer,
                folder = %folder_id,
                devices = desired.len(),
                "folder already shared"
            );
        }
        FolderPlan::Replace { devices } => {
            info!(peer = %peer, folder = %folder_id, devices = ?devices, "patching folder devices");
            api.patch_folder_devices(peer, &folder_id, &devices).await?;
            change.patched = true;
        }
    }
    Ok(change)
}

/// Reconcile the folder on every peer.
///
/// Must run after device reconciliation: a peer refuses to share a folder
/// with a device it does not trust.
pub async fn reconcile_folder(
    api: &dyn PeerApi,
    peers: &[PeerAddr],
    desired: &DesiredSet,
    name: &str,
    max_concurrent: usize,
) -> ReconcileResult<FolderTotals> {
    let (changes, failures) = fan_out(peers, max_concurrent, |peer| async move {
        reconcile_peer_folder(api, &peer, desired, name).await
    })
    .await;

    if let Some(err) = ReconcileError::from_failures("folder reconciliation", failures) {
        return Err(err);
    }

    Ok(changes.into_iter().fold(FolderTotals::default(), |mut totals, change| {
        totals.created += usize::from(change.created);
        if change.patched {
            totals.patched += 1;
        } else {
            totals.already_shared += 1;
        }
        totals
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_client::{MockPeerApi, PeerWrite};
    use mesh_types::{DeviceId, FolderType};

    fn peer(n: u8) -> PeerAddr {
        format!("10.0.0.{}:8384", n).parse().unwrap()
    }

    fn id(s: &str) -> DeviceId {
        DeviceId::new(s).unwrap()
    }

    fn desired(names: &[&str]) -> DesiredSet {
        names.iter().map(|n| id(n)).collect()
    }

    fn patches(api: &MockPeerApi) -> usize {
        api.writes()
            .iter()
            .filter(|w| matches!(w, PeerWrite::PatchFolderDevices { .. }))
            .count()
    }

    /// A peer that already trusts every id in `trusts`.
    fn fleet_peer(api: &MockPeerApi, n: u8, own: &str, trusts: &[&str]) {
        api.add_peer(peer(n), id(own));
        for t in trusts.iter().filter(|t| **t != own) {
            api.seed_trust(&peer(n), id(t));
        }
    }

    #[tokio::test]
    async fn missing_folder_is_created_from_current_trust() {
        let api = MockPeerApi::new();
        fleet_peer(&api, 1, "A", &["A", "B"]);

        let change = reconcile_peer_folder(&api, &peer(1), &desired(&["A", "B"]), "default")
            .await
            .unwrap();

        assert_eq!(change, FolderChange { created: true, patched: false });
        let folder = api.folder_on(&peer(1), "default").unwrap();
        assert_eq!(folder.folder_type, FolderType::SendReceive);
        assert_eq!(folder.path, "default");
        assert_eq!(folder.label, "default");
        assert_eq!(folder.shared_with(), vec![id("A"), id("B")]);
    }

    #[tokio::test]
    async fn created_folder_carries_stale_trust_until_patched() {
        let api = MockPeerApi::new();
        fleet_peer(&api, 1, "A", &["A", "B", "OLD"]);

        let change = reconcile_peer_folder(&api, &peer(1), &desired(&["A", "B"]), "default")
            .await
            .unwrap();

        assert_eq!(change, FolderChange { created: true, patched: true });
        let writes = api.writes();
        match &writes[0] {
            PeerWrite::CreateFolder { folder, .. } => {
                assert_eq!(folder.shared_with(), vec![id("A"), id("B"), id("OLD")]);
            }
            other => panic!("expected create, got {:?}", other),
        }
        assert_eq!(
            writes[1],
            PeerWrite::PatchFolderDevices {
                peer: peer(1),
                folder: "default".into(),
                devices: vec![id("A"), id("B")],
            }
        );
    }

    #[tokio::test]
    async fn partial_sharing_is_patched_to_exact_set() {
        let api = MockPeerApi::new();
        fleet_peer(&api, 1, "A", &["A", "B"]);
        api.seed_folder(&peer(1), FolderConfig::send_receive("default", [id("A")]));

        reconcile_peer_folder(&api, &peer(1), &desired(&["A", "B"]), "default")
            .await
            .unwrap();

        assert_eq!(
            api.writes(),
            vec![PeerWrite::PatchFolderDevices {
                peer: peer(1),
                folder: "default".into(),
                devices: vec![id("A"), id("B")],
            }]
        );
    }

    #[tokio::test]
    async fn order_of_shared_devices_does_not_matter() {
        let api = MockPeerApi::new();
        fleet_peer(&api, 1, "A", &["A", "B"]);
        api.seed_folder(&peer(1), FolderConfig::send_receive("default", [id("B"), id("A")]));

        let change = reconcile_peer_folder(&api, &peer(1), &desired(&["A", "B"]), "default")
            .await
            .unwrap();

        assert_eq!(change, FolderChange::default());
        assert!(api.writes().is_empty());
    }

    #[tokio::test]
    async fn folder_matched_by_path_keeps_its_id() {
        let api = MockPeerApi::new();
        fleet_peer(&api, 1, "A", &["A", "B"]);
        let mut folder = FolderConfig::send_receive("default", [id("A")]);
        folder.id = "abcd-1234".into();
        api.seed_folder(&peer(1), folder);

        reconcile_peer_folder(&api, &peer(1), &desired(&["A", "B"]), "default")
            .await
            .unwrap();

        assert_eq!(
            api.writes(),
            vec![PeerWrite::PatchFolderDevices {
                peer: peer(1),
                folder: "abcd-1234".into(),
                devices: vec![id("A"), id("B")],
            }]
        );
    }

    #[tokio::test]
    async fn second_run_patches_nothing() {
        let api = MockPeerApi::new();
        fleet_peer(&api, 1, "A", &["A", "B"]);
        fleet_peer(&api, 2, "B", &["A", "B"]);
        api.seed_folder(&peer(2), FolderConfig::send_receive("default", [id("B")]));
        let peers = [peer(1), peer(2)];
        let want = desired(&["A", "B"]);

        let first = reconcile_folder(&api, &peers, &want, "default", 4).await.unwrap();
        assert_eq!(first, FolderTotals { created: 1, patched: 1, already_shared: 1 });
        api.clear_writes();

        let second = reconcile_folder(&api, &peers, &want, "default", 4).await.unwrap();
        assert_eq!(second, FolderTotals { created: 0, patched: 0, already_shared: 2 });
        assert_eq!(patches(&api), 0);
        assert!(api.writes().is_empty());
    }

    #[tokio::test]
    async fn untrusted_device_surfaces_as_api_error() {
        let api = MockPeerApi::new();
        fleet_peer(&api, 1, "A", &["A"]);
        api.seed_folder(&peer(1), FolderConfig::send_receive("default", [id("A")]));

        let err = reconcile_folder(&api, &[peer(1)], &desired(&["A", "B"]), "default", 4)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Peer(PeerError::Api { status: 400, .. })
        ));
    }
}
