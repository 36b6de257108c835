//! Device reconciliation: every peer trusts every desired identity.
//!
//! Additive only. Trust entries outside the desired set are left alone, and
//! a peer's own ID goes through the same presence check as everyone else's.

use mesh_client::{PeerApi, PeerError};
use mesh_core::{plan_devices, DesiredSet};
use mesh_types::{DeviceConfig, DeviceId, PeerAddr};
use tracing::info;

use super::fan_out;
use crate::error::{ReconcileError, ReconcileResult};

/// Add the desired devices `peer` does not trust yet. Returns how many were added.
///
/// Adds are issued one by one; a failure leaves the earlier adds in place.
pub async fn reconcile_peer_devices(
    api: &dyn PeerApi,
    peer: &PeerAddr,
    desired: &DesiredSet,
) -> Result<usize, PeerError> {
    let trusted: Vec<DeviceId> = api
        .devices(peer)
        .await?
        .into_iter()
        .map(|d| d.device_id)
        .collect();

    let plan = plan_devices(&trusted, desired);
    if plan.is_noop() {
        info!(peer = %peer, devices = desired.len(), "all devices already trusted");
        return Ok(0);
    }

    for device in &plan.to_add {
        info!(peer = %peer, device = %device, "adding device");
        api.add_device(peer, &DeviceConfig::fleet_member(device.clone()))
            .await?;
    }
    Ok(plan.to_add.len())
}

/// Reconcile the trust list of every peer. Returns the total number of adds.
///
/// All peers are attempted even when some fail; the failures are returned
/// together afterwards.
pub async fn reconcile_devices(
    api: &dyn PeerApi,
    peers: &[PeerAddr],
    desired: &DesiredSet,
    max_concurrent: usize,
) -> ReconcileResult<usize> {
    let (added, failures) = fan_out(peers, max_concurrent, |peer| async move {
        reconcile_peer_devices(api, &peer, desired).await
    })
    .await;

    match ReconcileError::from_failures("device reconciliation", failures) {
        Some(err) => Err(err),
        None => Ok(added.into_iter().sum()),
    }
}
