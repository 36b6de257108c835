//! Error types for syncmesh-controller.

use mesh_client::{DiscoveryError, PeerError};

/// Startup errors: anything that prevents the controller from running at all.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Discovery backend could not be set up.
    #[error("discovery setup failed: {0}")]
    DiscoverySetup(#[from] DiscoveryError),

    /// Peer API client could not be set up.
    #[error("peer client setup failed: {0}")]
    ClientSetup(String),
}

/// Errors that abort one convergence pass. The next pass retries from scratch.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Peer discovery failed; nothing was contacted.
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// A single peer call failed.
    #[error(transparent)]
    Peer(#[from] PeerError),

    /// Several peers failed within one stage.
    #[error("{stage} failed on {} peers: {}", .failures.len(), summarize(.failures))]
    PeerBatch {
        /// Stage that failed: identity, devices or folder.
        stage: &'static str,
        /// Every per-peer failure, in discovery order.
        failures: Vec<PeerError>,
    },
}

impl ReconcileError {
    /// Turn the failures collected from a fan-out stage into an error.
    ///
    /// Returns `None` when nothing failed. A single failure is reported as
    /// itself.
    pub fn from_failures(stage: &'static str, mut failures: Vec<PeerError>) -> Option<Self> {
        match failures.len() {
            0 => None,
            1 => failures.pop().map(Self::Peer),
            _ => Some(Self::PeerBatch { stage, failures }),
        }
    }

    /// Peers named by this error.
    pub fn peers(&self) -> Vec<mesh_types::PeerAddr> {
        match self {
            Self::Discovery(_) => Vec::new(),
            Self::Peer(e) => vec![e.peer()],
            Self::PeerBatch { failures, .. } => failures.iter().map(PeerError::peer).collect(),
        }
    }
}

fn summarize(failures: &[PeerError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for a convergence pass.
pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;
