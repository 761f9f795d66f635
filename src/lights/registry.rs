use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::{BridgeInventory, LightId};

/// Addressable names mapped to the light ids actuated together under that
/// name. Built once from a [`BridgeInventory`] snapshot.
///
/// An individual light whose name appears inside a group's name is only
/// reachable through the group: "Lamp" disappears once "Lamp Group" exists.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DeviceRegistry {
    index: IndexMap<String, Vec<LightId>>,
}

impl DeviceRegistry {
    pub fn from_inventory(inventory: &BridgeInventory) -> Self {
        let mut index: IndexMap<String, Vec<LightId>> = IndexMap::new();

        for (id, light) in &inventory.lights {
            index.insert(light.name.clone(), vec![id.clone()]);
        }

        let mut remove_later: HashSet<String> = HashSet::new();
        let mut group_names: HashSet<String> = HashSet::new();

        for group in inventory.groups.values() {
            // Nothing to actuate: not addressable and hides no light
            if group.lights.is_empty() {
                continue;
            }
            for candidate in index.keys() {
                if group.name.contains(candidate.as_str()) {
                    remove_later.insert(candidate.clone());
                }
            }
            // Same-named groups: last one wins
            index.insert(group.name.clone(), group.lights.clone());
            group_names.insert(group.name.clone());
        }

        for name in remove_later.difference(&group_names) {
            index.shift_remove(name);
        }

        Self { index }
    }

    /// Light ids behind `name`, if it is addressable.
    pub fn resolve(&self, name: &str) -> Option<&[LightId]> {
        self.index.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Addressable names in index order (lights first, then groups).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[LightId])> {
        self.index
            .iter()
            .map(|(name, ids)| (name.as_str(), ids.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Name listing for the mission prompt.
    pub fn describe(&self) -> String {
        let mut description = String::from("I have lights with the following names,");
        for name in self.index.keys() {
            description.push_str("\n\t");
            description.push_str(name);
        }
        description
    }
}
