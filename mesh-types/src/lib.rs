//! # mesh-types
//!
//! Shared types for syncmesh, the Syncthing fleet reconciler.
//!
//! This crate provides the foundational types used across all syncmesh crates:
//! - [`DeviceId`], [`PeerAddr`] - Identity and addressing types
//! - [`SystemStatus`], [`DeviceConfig`], [`FolderConfig`] - Peer control API records
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod records;

pub use error::TypesError;
pub use ids::{DeviceId, PeerAddr};
pub use records::{DeviceConfig, FolderConfig, FolderDevice, FolderType, SystemStatus};
