//! The desired identity set of a convergence pass.
//!
//! Built fresh every pass from the identities of the peers that are live right
//! now. Order and duplicates in the inputs are irrelevant.

use mesh_types::DeviceId;
use std::collections::BTreeSet;

/// Set of identities every peer must trust and share the folder with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredSet {
    ids: BTreeSet<DeviceId>,
}

impl DesiredSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct identities.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when no peer was resolved.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `id` is part of the desired set.
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.ids.contains(id)
    }

    /// Identities in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceId> {
        self.ids.iter()
    }

    /// Owned copy of the identities in lexical order.
    pub fn to_vec(&self) -> Vec<DeviceId> {
        self.ids.iter().cloned().collect()
    }

    /// Unordered set equality against a device list reported by a peer.
    pub fn matches(&self, devices: &[DeviceId]) -> bool {
        let observed: BTreeSet<&DeviceId> = devices.iter().collect();
        observed.len() == self.ids.len() && self.ids.iter().all(|id| observed.contains(id))
    }

    /// Desired identities absent from `present`, in lexical order.
    pub fn missing_from(&self, present: &[DeviceId]) -> Vec<DeviceId> {
        let present: BTreeSet<&DeviceId> = present.iter().collect();
        self.ids
            .iter()
            .filter(|id| !present.contains(id))
            .cloned()
            .collect()
    }
}

impl FromIterator<DeviceId> for DesiredSet {
    fn from_iter<I: IntoIterator<Item = DeviceId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<DeviceId> {
        names.iter().map(|n| DeviceId::new(*n).unwrap()).collect()
    }

    #[test]
    fn duplicates_collapse() {
        let set: DesiredSet = ids(&["A", "B", "A"]).into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn matches_ignores_order() {
        let set: DesiredSet = ids(&["A", "B"]).into_iter().collect();
        assert!(set.matches(&ids(&["B", "A"])));
    }

    #[test]
    fn matches_ignores_duplicates_in_observed() {
        let set: DesiredSet = ids(&["A", "B"]).into_iter().collect();
        assert!(set.matches(&ids(&["A", "B", "B"])));
    }

    #[test]
    fn matches_detects_subset_and_superset() {
        let set: DesiredSet = ids(&["A", "B"]).into_iter().collect();
        assert!(!set.matches(&ids(&["A"])));
        assert!(!set.matches(&ids(&["A", "B", "C"])));
        assert!(!set.matches(&ids(&["A", "C"])));
    }

    #[test]
    fn empty_set_matches_empty_list_only() {
        let set = DesiredSet::new();
        assert!(set.is_empty());
        assert!(set.matches(&[]));
        assert!(!set.matches(&ids(&["A"])));
    }

    #[test]
    fn missing_from_lists_absent_ids() {
        let set: DesiredSet = ids(&["C", "A", "B"]).into_iter().collect();
        assert_eq!(set.missing_from(&ids(&["A"])), ids(&["B", "C"]));
        assert!(set.missing_from(&ids(&["A", "B", "C", "D"])).is_empty());
    }
}
