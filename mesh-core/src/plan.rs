//! Per-peer reconciliation plans.
//!
//! Each function compares what one peer reports against the [`DesiredSet`]
//! and returns the writes needed to close the gap. An empty plan means the
//! peer is already converged and no request must be issued.

use mesh_types::{DeviceId, FolderConfig};

use crate::DesiredSet;

/// Devices to add to one peer's trusted list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePlan {
    /// Desired identities the peer does not trust yet, one add request each.
    pub to_add: Vec<DeviceId>,
}

impl DevicePlan {
    /// True when the peer already trusts every desired identity.
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty()
    }
}

/// Additive device plan: never removes trust entries outside the desired set.
pub fn plan_devices(trusted: &[DeviceId], desired: &DesiredSet) -> DevicePlan {
    DevicePlan {
        to_add: desired.missing_from(trusted),
    }
}

/// What to do with a folder's device-sharing list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderPlan {
    /// Shared-device set already equals the desired set.
    AlreadyShared,
    /// Overwrite the sharing list with exactly these devices.
    Replace {
        /// The full replacement list, in lexical order.
        devices: Vec<DeviceId>,
    },
}

/// Compare a folder's shared devices to the desired set as unordered sets.
pub fn plan_folder_sharing(shared_with: &[DeviceId], desired: &DesiredSet) -> FolderPlan {
    if desired.matches(shared_with) {
        FolderPlan::AlreadyShared
    } else {
        FolderPlan::Replace {
            devices: desired.to_vec(),
        }
    }
}

/// Locate the folder called `name` (matched by ID or path) in a peer's list.
pub fn find_folder<'a>(folders: &'a [FolderConfig], name: &str) -> Option<&'a FolderConfig> {
    folders.iter().find(|f| f.is_named(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<DeviceId> {
        names.iter().map(|n| DeviceId::new(*n).unwrap()).collect()
    }

    fn desired(names: &[&str]) -> DesiredSet {
        ids(names).into_iter().collect()
    }

    #[test]
    fn devices_plan_adds_only_missing() {
        let plan = plan_devices(&ids(&["A"]), &desired(&["A", "B", "C"]));
        assert_eq!(plan.to_add, ids(&["B", "C"]));
    }

    #[test]
    fn devices_plan_is_noop_when_converged() {
        let plan = plan_devices(&ids(&["B", "A"]), &desired(&["A", "B"]));
        assert!(plan.is_noop());
    }

    #[test]
    fn devices_plan_never_removes_extra_trust() {
        // Z left the fleet; it stays trusted
        let plan = plan_devices(&ids(&["A", "Z"]), &desired(&["A"]));
        assert!(plan.is_noop());
    }

    #[test]
    fn devices_plan_includes_self_when_absent() {
        // The peer's own ID is just another desired identity
        let plan = plan_devices(&ids(&[]), &desired(&["SELF"]));
        assert_eq!(plan.to_add, ids(&["SELF"]));
    }

    #[test]
    fn folder_plan_unordered_match_is_noop() {
        let plan = plan_folder_sharing(&ids(&["B", "A"]), &desired(&["A", "B"]));
        assert_eq!(plan, FolderPlan::AlreadyShared);
    }

    #[test]
    fn folder_plan_replaces_with_exact_set() {
        let plan = plan_folder_sharing(&ids(&["A"]), &desired(&["B", "A"]));
        assert_eq!(
            plan,
            FolderPlan::Replace {
                devices: ids(&["A", "B"])
            }
        );
    }

    #[test]
    fn folder_plan_drops_devices_outside_desired() {
        let plan = plan_folder_sharing(&ids(&["A", "OLD"]), &desired(&["A"]));
        assert_eq!(
            plan,
            FolderPlan::Replace {
                devices: ids(&["A"])
            }
        );
    }

    #[test]
    fn find_folder_by_id_or_path() {
        let mut other = FolderConfig::send_receive("photos", []);
        other.id = "xyz".into();
        let folders = vec![other, FolderConfig::send_receive("default", [])];

        assert_eq!(find_folder(&folders, "default").unwrap().id, "default");
        assert_eq!(find_folder(&folders, "photos").unwrap().id, "xyz");
        assert!(find_folder(&folders, "music").is_none());
    }
}
