//! # mesh-client
//!
//! Clients for the two external collaborators of syncmesh.
//!
//! - **Peer control API**: [`PeerApi`], implemented over HTTP by
//!   [`HttpPeerApi`] (Syncthing REST) and in memory by [`MockPeerApi`]
//! - **Peer discovery**: [`Discovery`], implemented by [`DockerDiscovery`]
//!   (swarm tasks), [`DnsDiscovery`], [`StaticDiscovery`] and
//!   [`MockDiscovery`]
//!
//! Both traits are stateless request/response seams: the reconciler in
//! `mesh-controller` is written against them and tested with the mocks.
//!
//! ## Example
//!
//! ```ignore
//! use mesh_client::{HttpPeerApi, PeerApi, PeerApiConfig};
//!
//! let api = HttpPeerApi::new(PeerApiConfig::default())?;
//! let status = api.status(&"10.0.0.1:8384".parse()?).await?;
//! println!("peer id: {}", status.my_id);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod discovery;
pub mod peer;

pub use discovery::{
    Discovery, DiscoveryError, DnsDiscovery, DockerDiscovery, DockerDiscoveryConfig,
    MockDiscovery, StaticDiscovery,
};
pub use peer::{HttpPeerApi, MockPeerApi, PeerApi, PeerApiConfig, PeerError, PeerWrite};
