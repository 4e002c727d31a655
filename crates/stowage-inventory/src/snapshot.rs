//! Capture and rebuild a whole containment tree.
//!
//! A [`TreeSnapshot`] holds only ledgers and links: capacities, stored
//! amounts, part counts, containment, and supply/demand counters. Caches are
//! never captured; a restored tree starts with every slot dirty. The format
//! is plain serde, so any serializer can persist it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stowage_types::{PhaseClass, ResourceId, ResourceKind, UnitId};

use crate::config::InventoryConfig;
use crate::error::InventoryError;
use crate::inventory::Inventory;
use crate::registry::ResourceRegistry;
use crate::store::ResourceStore;
use crate::supply_demand::SupplyDemandTracker;
use crate::tree::{ContainmentTree, Entry};
use crate::unit::Unit;

/// One unit and its inventory ledgers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// The unit record, including its container reference.
    pub unit: Unit,
    /// General mass budget (kg).
    pub general_capacity: f64,
    /// Per-resource capacity grants.
    #[serde(default)]
    pub type_capacity: BTreeMap<ResourceId, f64>,
    /// Phase-class capacity pools.
    #[serde(default)]
    pub phase_capacity: BTreeMap<PhaseClass, f64>,
    /// Bulk amounts.
    #[serde(default)]
    pub stored: BTreeMap<ResourceId, f64>,
    /// Part counts.
    #[serde(default)]
    pub item_counts: BTreeMap<ResourceId, u32>,
    /// Directly contained units, in storage order.
    #[serde(default)]
    pub contained: Vec<UnitId>,
    /// Supply/demand counters.
    #[serde(default)]
    pub supply_demand: SupplyDemandTracker,
}

/// Every unit in a tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Units in id order.
    pub units: Vec<UnitSnapshot>,
}

fn invalid(reason: impl Into<String>) -> InventoryError {
    InventoryError::InvalidSnapshot {
        reason: reason.into(),
    }
}

fn check_quantity(what: &str, unit: UnitId, value: f64) -> Result<(), InventoryError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{what} of unit {unit} is {value}")))
    }
}

impl ContainmentTree {
    /// Capture every unit's ledgers and links.
    pub fn snapshot(&self) -> TreeSnapshot {
        let units = self
            .entries()
            .values()
            .map(|entry| {
                let store = &entry.inventory.store;
                UnitSnapshot {
                    unit: entry.unit.clone(),
                    general_capacity: entry.inventory.general_capacity,
                    type_capacity: store.type_capacities().clone(),
                    phase_capacity: store.phase_capacities().clone(),
                    stored: store.stored_amounts().clone(),
                    item_counts: store.item_counts().clone(),
                    contained: entry.inventory.contained.clone(),
                    supply_demand: entry.inventory.supply_demand.clone(),
                }
            })
            .collect();
        TreeSnapshot { units }
    }

    /// Rebuild a tree from a snapshot.
    ///
    /// Resource ids must exist in `registry` with the right kind, amounts
    /// must be finite and non-negative, and containment must form a forest
    /// in which parent lists and container references agree.
    ///
    /// # Errors
    ///
    /// [`InventoryError::InvalidSnapshot`] describing the first problem, or
    /// [`InventoryError::InvalidConfig`].
    pub fn restore(
        registry: Arc<ResourceRegistry>,
        config: InventoryConfig,
        snapshot: TreeSnapshot,
    ) -> Result<Self, InventoryError> {
        config.validate()?;
        let mut entries = BTreeMap::new();
        for unit in snapshot.units {
            let id = unit.unit.id;
            validate_unit(&registry, &unit)?;
            let mut inventory = Inventory::new(id, registry.len());
            inventory.general_capacity = unit.general_capacity;
            inventory.contained = unit.contained;
            inventory.supply_demand = unit.supply_demand;
            inventory.store = ResourceStore::from_parts(
                unit.type_capacity,
                unit.phase_capacity,
                unit.stored,
                unit.item_counts,
            );
            let entry = Entry {
                unit: unit.unit,
                inventory,
            };
            if entries.insert(id, entry).is_some() {
                return Err(invalid(format!("unit {id} appears twice")));
            }
        }
        validate_links(&entries)?;
        tracing::info!(units = entries.len(), "containment tree restored");
        Ok(Self::from_entries(registry, config, entries))
    }
}

fn validate_unit(registry: &ResourceRegistry, snapshot: &UnitSnapshot) -> Result<(), InventoryError> {
    let id = snapshot.unit.id;
    check_quantity("base mass", id, snapshot.unit.base_mass)?;
    check_quantity("general capacity", id, snapshot.general_capacity)?;
    let kind_of = |resource: ResourceId, expected: ResourceKind| {
        registry
            .expect_kind(resource, expected)
            .map_err(|err| invalid(format!("unit {id}: {err}")))
    };
    for (resource, capacity) in &snapshot.type_capacity {
        kind_of(*resource, ResourceKind::Bulk)?;
        check_quantity("type capacity", id, *capacity)?;
    }
    for capacity in snapshot.phase_capacity.values() {
        check_quantity("phase capacity", id, *capacity)?;
    }
    for (resource, amount) in &snapshot.stored {
        kind_of(*resource, ResourceKind::Bulk)?;
        check_quantity("stored amount", id, *amount)?;
    }
    for resource in snapshot.item_counts.keys() {
        kind_of(*resource, ResourceKind::Discrete)?;
    }
    Ok(())
}

fn validate_links(entries: &BTreeMap<UnitId, Entry>) -> Result<(), InventoryError> {
    let mut seen_children = BTreeSet::new();
    for (parent, entry) in entries {
        for child in &entry.inventory.contained {
            let Some(child_entry) = entries.get(child) else {
                return Err(invalid(format!("unit {parent} contains unknown unit {child}")));
            };
            if child_entry.unit.container() != Some(*parent) {
                return Err(invalid(format!("unit {child} is listed in {parent} but not linked to it")));
            }
            if !seen_children.insert(*child) {
                return Err(invalid(format!("unit {child} is contained twice")));
            }
        }
    }
    for (id, entry) in entries {
        if let Some(parent) = entry.unit.container().filter(|_| !seen_children.contains(id)) {
            return Err(invalid(format!("unit {id} claims container {parent} which does not list it")));
        }
        // Walk up; more steps than units means a cycle.
        let mut current = entry.unit.container();
        let mut steps = 0_usize;
        while let Some(parent) = current {
            if parent == *id || steps >= entries.len() {
                return Err(invalid(format!("unit {id} is part of a containment cycle")));
            }
            steps = steps.saturating_add(1);
            current = entries.get(&parent).and_then(|e| e.unit.container());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use stowage_types::{Freshness, Scope, UnitKind};

    use super::*;
    use crate::tree::fixtures::{close, world};
    use crate::cache::CacheFamily;

    #[test]
    fn snapshot_round_trip_preserves_queries() {
        let mut w = world();
        let base = w.unit("base", UnitKind::Settlement, 0.0, 10_000.0);
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 1_000.0);
        let bag = w.unit("bag", UnitKind::Container, 1.0, 0.0);
        assert!(w.tree.store_unit(base, rover).is_ok());
        assert!(w.tree.store_unit(rover, bag).is_ok());
        assert!(w.tree.add_type_capacity(bag, w.dust, 10.0).is_ok());
        assert!(w.tree.store(bag, w.dust, 5.0, Scope::Local).is_ok());
        assert!(w.tree.store_items(rover, w.wrench, 3).is_ok());
        if let Ok(tracker) = w.tree.supply_demand_mut(base) {
            tracker.record_supply(w.dust, 5.0);
        }

        let snapshot = w.tree.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap_or_default();
        let parsed: Option<TreeSnapshot> = serde_json::from_str(&json).ok();
        assert_eq!(parsed.as_ref(), Some(&snapshot));

        let registry = Arc::clone(w.tree.registry());
        let restored = ContainmentTree::restore(registry, w.tree.config(), snapshot);
        assert!(restored.is_ok());
        let Ok(restored) = restored else { return };

        for id in [base, rover, bag] {
            let before = w.tree.stored_of(id, w.dust, Scope::Nested, Freshness::Fresh).unwrap_or(-1.0);
            let after = restored.stored_of(id, w.dust, Scope::Nested, Freshness::Fresh).unwrap_or(-2.0);
            assert!(close(before, after));
            let before = w.tree.capacity_of(id, w.dust, Scope::Nested, Freshness::Fresh).unwrap_or(-1.0);
            let after = restored.capacity_of(id, w.dust, Scope::Nested, Freshness::Fresh).unwrap_or(-2.0);
            assert!(close(before, after));
        }
        assert_eq!(restored.container_of(bag).ok(), Some(Some(rover)));
        let supplied = restored.supply_demand(base).map(|t| t.counters(w.dust).cumulative_supplied);
        assert!(supplied.is_ok_and(|s| close(s, 5.0)));
    }

    #[test]
    fn restore_rejects_cycles() {
        let mut w = world();
        let a = w.unit("a", UnitKind::Container, 1.0, 100.0);
        let b = w.unit("b", UnitKind::Container, 1.0, 100.0);
        assert!(w.tree.store_unit(a, b).is_ok());
        let mut snapshot = w.tree.snapshot();
        // Forge b -> a on top of a -> b.
        for unit in &mut snapshot.units {
            if unit.unit.id == b {
                unit.contained.push(a);
            }
            if unit.unit.id == a {
                unit.unit.set_container(Some(b));
            }
        }
        let registry = Arc::clone(w.tree.registry());
        let result = ContainmentTree::restore(registry, w.tree.config(), snapshot);
        assert!(matches!(result, Err(InventoryError::InvalidSnapshot { .. })));
    }

    #[test]
    fn restore_rejects_unlinked_children() {
        let mut w = world();
        let a = w.unit("a", UnitKind::Container, 1.0, 100.0);
        let b = w.unit("b", UnitKind::Container, 1.0, 100.0);
        let mut snapshot = w.tree.snapshot();
        for unit in &mut snapshot.units {
            if unit.unit.id == a {
                unit.contained.push(b);
            }
        }
        let registry = Arc::clone(w.tree.registry());
        let result = ContainmentTree::restore(registry, w.tree.config(), snapshot);
        assert!(matches!(result, Err(InventoryError::InvalidSnapshot { .. })));
    }

    #[test]
    fn restore_rejects_wrong_resource_kind() {
        let mut w = world();
        let a = w.unit("a", UnitKind::Container, 1.0, 100.0);
        let mut snapshot = w.tree.snapshot();
        for unit in &mut snapshot.units {
            if unit.unit.id == a {
                unit.stored.insert(w.wrench, 1.0);
            }
        }
        let registry = Arc::clone(w.tree.registry());
        let result = ContainmentTree::restore(registry, w.tree.config(), snapshot);
        assert!(matches!(result, Err(InventoryError::InvalidSnapshot { .. })));
    }

    #[test]
    fn restored_caches_start_dirty() {
        let mut w = world();
        let a = w.unit("a", UnitKind::Container, 1.0, 100.0);
        let registry = Arc::clone(w.tree.registry());
        let restored = ContainmentTree::restore(registry, w.tree.config(), w.tree.snapshot());
        let dirty = restored
            .as_ref()
            .ok()
            .and_then(|tree| tree.inventory(a).ok())
            .map(|inv| inv.cache().is_dirty(CacheFamily::Capacity, w.water));
        assert_eq!(dirty, Some(true));
    }
}
