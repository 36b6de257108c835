//! Peer discovery abstraction.
//!
//! A discovery backend answers one question: which IP addresses currently
//! host a running member of a named group. It knows nothing about the peer
//! API port; the controller combines both into [`mesh_types::PeerAddr`]s.

mod dns;
mod docker;
mod mock;
mod static_list;

pub use dns::DnsDiscovery;
pub use docker::{
    task_addresses, AttachedNetwork, AttachedNetworkSpec, DockerDiscovery, DockerDiscoveryConfig,
    NetworkAttachment, SwarmTask,
};
pub use mock::MockDiscovery;
pub use static_list::StaticDiscovery;

use async_trait::async_trait;
use std::net::IpAddr;
use thiserror::Error;

/// Discovery errors.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The discovery service could not be reached.
    #[error("discovery service unavailable: {0}")]
    Unavailable(String),

    /// The discovery service answered with an error status.
    #[error("discovery service rejected request: {status} {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The response could not be interpreted.
    #[error("malformed discovery response: {0}")]
    Malformed(String),
}

/// Source of live peer addresses.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Addresses of running members of `group`, de-duplicated, first-seen order.
    ///
    /// An empty list is a valid answer.
    async fn list_peers(&self, group: &str) -> Result<Vec<IpAddr>, DiscoveryError>;
}

/// Drop repeated addresses, keeping first-seen order.
pub(crate) fn dedup_preserving_order(addrs: impl IntoIterator<Item = IpAddr>) -> Vec<IpAddr> {
    let mut seen = std::collections::HashSet::new();
    addrs.into_iter().filter(|ip| seen.insert(*ip)).collect()
}
