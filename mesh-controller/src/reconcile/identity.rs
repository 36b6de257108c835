//! Identity resolution: peer address to self-reported device ID.

use mesh_client::{PeerApi, PeerError};
use mesh_types::{DeviceId, PeerAddr};
use tracing::{debug, info};

use super::fan_out;
use crate::error::{ReconcileError, ReconcileResult};

/// A reachable peer and the identity it reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    /// Address the identity was resolved from.
    pub peer: PeerAddr,
    /// Device ID from the peer's status.
    pub device: DeviceId,
}

/// Ask one peer for its device ID.
pub async fn resolve_identity(api: &dyn PeerApi, peer: &PeerAddr) -> Result<DeviceId, PeerError> {
    let status = api.status(peer).await?;
    debug!(peer = %peer, device = %status.my_id, "resolved identity");
    Ok(status.my_id)
}

/// Resolve every peer, in discovery order.
///
/// Any failure fails the whole stage, so callers can abort before writing.
pub async fn resolve_identities(
    api: &dyn PeerApi,
    peers: &[PeerAddr],
    max_concurrent: usize,
) -> ReconcileResult<Vec<PeerIdentity>> {
    let (resolved, failures) = fan_out(peers, max_concurrent, |peer| async move {
        let device = resolve_identity(api, &peer).await?;
        Ok(PeerIdentity { peer, device })
    })
    .await;

    if let Some(err) = ReconcileError::from_failures("identity resolution", failures) {
        return Err(err);
    }

    info!(
        peers = peers.len(),
        identities = ?resolved.iter().map(|p| &p.device).collect::<Vec<_>>(),
        "resolved peer identities"
    );
    Ok(resolved)
}

/// Keep the first address of every identity.
///
/// A daemon attached to several networks shows up under several addresses;
/// it must be reconciled once per pass, not once per address.
pub fn distinct_peers(identities: &[PeerIdentity]) -> Vec<PeerAddr> {
    let mut seen = std::collections::HashSet::new();
    identities
        .iter()
        .filter(|p| {
            let first = seen.insert(&p.device);
            if !first {
                debug!(peer = %p.peer, device = %p.device, "address of an already resolved device");
            }
            first
        })
        .map(|p| p.peer)
        .collect()
}
