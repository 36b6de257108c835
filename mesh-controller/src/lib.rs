//! # syncmesh-controller
//!
//! Control loop keeping a fleet of Syncthing daemons mutually configured.
//!
//! Every pass:
//! - Discovers the running members of a group
//! - Resolves each member's device ID (the desired set)
//! - Makes every member trust every desired device (additive only)
//! - Makes one folder exist everywhere, shared with exactly the desired set
//!
//! ## Architecture
//!
//! ```text
//!   ConvergenceLoop ── LoopState (mesh-core)
//!         │
//!     Reconciler ──── Discovery (docker / dns / static)
//!         │
//!      PeerApi ────── Syncthing REST, one daemon per address
//! ```
//!
//! Passes are independent: nothing but counters survives from one to the next.
//! Any error aborts the current pass and is retried by the next one.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod convergence;
pub mod error;
pub mod http;
pub mod metrics;
pub mod reconcile;

pub use config::{Config, ConfigError, DiscoveryBackend};
pub use convergence::{shutdown_requested, ConvergenceLoop};
pub use error::{ControllerError, ReconcileError};
pub use metrics::ControllerMetrics;
pub use reconcile::{PassReport, PassSettings, PeerIdentity, Reconciler};
