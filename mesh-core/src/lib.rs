//! # mesh-core
//!
//! Pure logic for syncmesh (no I/O, instant tests).
//!
//! This crate computes what a convergence pass has to change, without
//! talking to any peer:
//! - [`DesiredSet`] - the identity set every peer must trust and share with
//! - [`plan_devices`] / [`plan_folder_sharing`] - per-peer deltas
//! - [`LoopState`] - the Polling/Sleeping convergence state machine
//!
//! The actual I/O (discovery, peer API calls, timers) is performed by
//! `mesh-controller`, which interprets the plans and actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod desired;
pub mod plan;
pub mod state;

pub use desired::DesiredSet;
pub use plan::{find_folder, plan_devices, plan_folder_sharing, DevicePlan, FolderPlan};
pub use state::{Action, Event, LoopEvent, LoopState};
