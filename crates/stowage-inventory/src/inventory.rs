//! The per-unit inventory aggregate.
//!
//! An [`Inventory`] bundles a unit's local [`ResourceStore`], its general
//! mass budget, the ids of the units it directly contains, its
//! [`CapacityCache`] and its [`SupplyDemandTracker`]. Queries that need the
//! rest of the tree (nested capacity, mass, ancestor clamps) live on
//! [`ContainmentTree`](crate::ContainmentTree), which owns every inventory.

use stowage_types::UnitId;

use crate::cache::CapacityCache;
use crate::store::ResourceStore;
use crate::supply_demand::SupplyDemandTracker;

/// Everything one unit holds.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub(crate) owner: UnitId,
    pub(crate) general_capacity: f64,
    pub(crate) contained: Vec<UnitId>,
    pub(crate) store: ResourceStore,
    pub(crate) cache: CapacityCache,
    pub(crate) supply_demand: SupplyDemandTracker,
}

impl Inventory {
    /// Create an empty inventory for `owner`, sized for `resources` ids.
    pub fn new(owner: UnitId, resources: usize) -> Self {
        Self {
            owner,
            general_capacity: 0.0,
            contained: Vec::new(),
            store: ResourceStore::new(),
            cache: CapacityCache::new(resources),
            supply_demand: SupplyDemandTracker::new(),
        }
    }

    /// The unit this inventory belongs to.
    pub const fn owner(&self) -> UnitId {
        self.owner
    }

    /// Mass budget for contained units and discrete parts (kg).
    pub const fn general_capacity(&self) -> f64 {
        self.general_capacity
    }

    /// Directly contained units, in the order they were stored.
    pub fn contained(&self) -> &[UnitId] {
        &self.contained
    }

    /// The local resource ledger.
    pub const fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// The memoized subtree aggregates.
    pub const fn cache(&self) -> &CapacityCache {
        &self.cache
    }

    /// Supply and demand counters.
    pub const fn supply_demand(&self) -> &SupplyDemandTracker {
        &self.supply_demand
    }

    /// Whether nothing is held: no bulk, no parts, no units.
    pub fn is_empty(&self) -> bool {
        self.contained.is_empty()
            && self.store.stored_amounts().is_empty()
            && self.store.item_counts().is_empty()
    }
}
