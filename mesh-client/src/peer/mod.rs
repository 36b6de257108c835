//! Peer control API abstraction.
//!
//! Every syncmesh write goes through this trait. The operations map onto the
//! Syncthing REST API:
//!
//! | Operation              | Request                                 |
//! |------------------------|-----------------------------------------|
//! | `status`               | `GET /rest/system/status`               |
//! | `devices`              | `GET /rest/config/devices`              |
//! | `add_device`           | `POST /rest/config/devices`             |
//! | `folders`              | `GET /rest/config/folders`              |
//! | `create_folder`        | `POST /rest/config/folders`             |
//! | `folder`               | `GET /rest/config/folders/{id}`         |
//! | `patch_folder_devices` | `PATCH /rest/config/folders/{id}`       |

mod http;
mod mock;

pub use http::{HttpPeerApi, PeerApiConfig};
pub use mock::{MockPeerApi, PeerWrite};

use async_trait::async_trait;
use mesh_types::{DeviceConfig, DeviceId, FolderConfig, PeerAddr, SystemStatus};
use thiserror::Error;

/// Peer control API errors.
#[derive(Debug, Error)]
pub enum PeerError {
    /// No usable response: connect failure, timeout, broken body.
    #[error("peer {peer} unreachable: {reason}")]
    Unreachable {
        /// The peer that failed.
        peer: PeerAddr,
        /// What went wrong.
        reason: String,
    },

    /// The peer answered with a non-success status.
    #[error("peer {peer} rejected {method} {path}: {status} {body}")]
    Api {
        /// The peer that rejected the request.
        peer: PeerAddr,
        /// HTTP method.
        method: &'static str,
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as sent by the peer.
        body: String,
    },

    /// The peer answered 2xx with a body that does not decode.
    #[error("peer {peer} returned malformed {path}: {reason}")]
    Decode {
        /// The peer that answered.
        peer: PeerAddr,
        /// Request path.
        path: String,
        /// Decoder message.
        reason: String,
    },
}

impl PeerError {
    /// The peer this error is about.
    pub fn peer(&self) -> PeerAddr {
        match self {
            Self::Unreachable { peer, .. } | Self::Api { peer, .. } | Self::Decode { peer, .. } => {
                *peer
            }
        }
    }

    /// True for transport-level failures (as opposed to an application error).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Read/write access to one peer's identity, trusted devices and folders.
///
/// Implementations are stateless with respect to syncmesh: each call is an
/// independent request against the peer at `peer`.
#[async_trait]
pub trait PeerApi: Send + Sync {
    /// Query the peer's status, which carries its own device ID.
    async fn status(&self, peer: &PeerAddr) -> Result<SystemStatus, PeerError>;

    /// List the devices the peer trusts (including itself).
    async fn devices(&self, peer: &PeerAddr) -> Result<Vec<DeviceConfig>, PeerError>;

    /// Add one trusted device.
    async fn add_device(&self, peer: &PeerAddr, device: &DeviceConfig) -> Result<(), PeerError>;

    /// List the peer's folders.
    async fn folders(&self, peer: &PeerAddr) -> Result<Vec<FolderConfig>, PeerError>;

    /// Create a folder.
    async fn create_folder(&self, peer: &PeerAddr, folder: &FolderConfig)
        -> Result<(), PeerError>;

    /// Fetch one folder by ID.
    async fn folder(&self, peer: &PeerAddr, folder_id: &str) -> Result<FolderConfig, PeerError>;

    /// Overwrite a folder's device-sharing list.
    async fn patch_folder_devices(
        &self,
        peer: &PeerAddr,
        folder_id: &str,
        devices: &[DeviceId],
    ) -> Result<(), PeerError>;
}
