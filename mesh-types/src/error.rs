//! Error types for syncmesh shared types.

use thiserror::Error;

/// Errors raised while constructing shared types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    /// Device IDs must not be empty
    #[error("device id is empty")]
    EmptyDeviceId,

    /// Peer address is not `ip:port`
    #[error("invalid peer address: {0}")]
    InvalidPeerAddr(String),
}
