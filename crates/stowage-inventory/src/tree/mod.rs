//! The arena that owns every unit and inventory.
//!
//! A [`ContainmentTree`] is a forest of units keyed by [`UnitId`]. Each unit
//! owns exactly one [`Inventory`]; containment is recorded twice, as the
//! parent's ordered child list and as the child's container reference, and
//! the two always agree. Reads take `&self` and memoize through the
//! inventories' caches; every mutation takes `&mut self`, invalidates the
//! affected cache slots up to the root, and notifies listeners.
//!
//! The tree is single-threaded. Callers serialize access (for example a
//! simulation tick loop); there is no internal locking.
//!
//! # Submodules
//!
//! - [`query`] -- read-only capacity, stored, and mass queries.
//! - [`resources`] -- bulk and discrete store/retrieve, transfer, capacity
//!   grants.
//! - [`units`] -- store/retrieve/destroy units, containment queries.
//! - `invalidate` -- ancestor cache invalidation.

mod invalidate;
pub mod query;
pub mod resources;
pub mod units;

use std::collections::BTreeMap;
use std::sync::Arc;

use stowage_types::{UnitEvent, UnitEventKind, UnitId};

use crate::config::InventoryConfig;
use crate::error::InventoryError;
use crate::inventory::Inventory;
use crate::registry::ResourceRegistry;
use crate::supply_demand::SupplyDemandTracker;
use crate::unit::{Unit, UnitListener};

pub use units::{Absorption, DestroyedUnit};

/// A unit and the inventory it owns.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) unit: Unit,
    pub(crate) inventory: Inventory,
}

/// Every unit in a simulation, with its inventory and containment links.
pub struct ContainmentTree {
    registry: Arc<ResourceRegistry>,
    config: InventoryConfig,
    entries: BTreeMap<UnitId, Entry>,
    listeners: Vec<Box<dyn UnitListener>>,
}

impl core::fmt::Debug for ContainmentTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContainmentTree")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("entries", &self.entries)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ContainmentTree {
    /// Create an empty tree with the default configuration.
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self {
            registry,
            config: InventoryConfig::default(),
            entries: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Create an empty tree with an explicit configuration.
    pub fn with_config(
        registry: Arc<ResourceRegistry>,
        config: InventoryConfig,
    ) -> Result<Self, InventoryError> {
        config.validate()?;
        Ok(Self {
            registry,
            config,
            entries: BTreeMap::new(),
            listeners: Vec::new(),
        })
    }

    pub(crate) const fn from_entries(
        registry: Arc<ResourceRegistry>,
        config: InventoryConfig,
        entries: BTreeMap<UnitId, Entry>,
    ) -> Self {
        Self {
            registry,
            config,
            entries,
            listeners: Vec::new(),
        }
    }

    /// The shared resource catalog.
    pub const fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Engine tunables.
    pub const fn config(&self) -> InventoryConfig {
        self.config
    }

    pub(crate) const fn epsilon(&self) -> f64 {
        self.config.epsilon
    }

    /// Register a unit as a free-standing root with an empty inventory.
    ///
    /// Any container reference the unit carries is cleared; use
    /// [`store_unit`](Self::store_unit) to nest it.
    pub fn add_unit(&mut self, mut unit: Unit) -> Result<UnitId, InventoryError> {
        if !unit.base_mass.is_finite() || unit.base_mass < 0.0 {
            return Err(InventoryError::InvalidAmount {
                amount: unit.base_mass,
            });
        }
        let id = unit.id;
        if self.entries.contains_key(&id) {
            return Err(InventoryError::DuplicateUnit(id));
        }
        unit.set_container(None);
        let inventory = Inventory::new(id, self.registry.len());
        tracing::debug!(unit = %id, name = %unit.name, kind = %unit.kind, "unit added");
        self.entries.insert(id, Entry { unit, inventory });
        self.emit(id, UnitEventKind::UnitAdded);
        Ok(id)
    }

    /// Number of units in the tree.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree holds no units.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a unit.
    pub fn unit(&self, id: UnitId) -> Result<&Unit, InventoryError> {
        self.entry(id).map(|entry| &entry.unit)
    }

    /// Look up a unit's inventory.
    pub fn inventory(&self, id: UnitId) -> Result<&Inventory, InventoryError> {
        self.entry(id).map(|entry| &entry.inventory)
    }

    /// Every unit, in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.entries.values().map(|entry| &entry.unit)
    }

    /// Units that are not held by any container.
    pub fn roots(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.entries
            .values()
            .filter(|entry| entry.unit.container().is_none())
            .map(|entry| entry.unit.id)
    }

    /// Register a listener for every future [`UnitEvent`].
    pub fn subscribe(&mut self, listener: impl UnitListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Supply/demand counters of one unit.
    pub fn supply_demand(&self, id: UnitId) -> Result<&SupplyDemandTracker, InventoryError> {
        self.entry(id).map(|entry| &entry.inventory.supply_demand)
    }

    /// Mutable supply/demand counters of one unit.
    pub fn supply_demand_mut(
        &mut self,
        id: UnitId,
    ) -> Result<&mut SupplyDemandTracker, InventoryError> {
        self.entry_mut(id).map(|entry| &mut entry.inventory.supply_demand)
    }

    /// Compact every unit's supply/demand counters by `divisor`.
    pub fn compact_all_trackers(&mut self, divisor: u32) {
        for entry in self.entries.values_mut() {
            entry.inventory.supply_demand.compact(divisor);
        }
        tracing::debug!(divisor, units = self.entries.len(), "supply/demand counters compacted");
    }

    /// Mark every cache slot in the tree dirty.
    ///
    /// The next fresh query recomputes from the raw ledgers.
    pub fn discard_caches(&self) {
        for entry in self.entries.values() {
            entry.inventory.cache.mark_all_dirty();
        }
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    pub(crate) fn entry(&self, id: UnitId) -> Result<&Entry, InventoryError> {
        self.entries.get(&id).ok_or(InventoryError::UnknownUnit(id))
    }

    pub(crate) fn entry_mut(&mut self, id: UnitId) -> Result<&mut Entry, InventoryError> {
        self.entries.get_mut(&id).ok_or(InventoryError::UnknownUnit(id))
    }

    pub(crate) const fn entries(&self) -> &BTreeMap<UnitId, Entry> {
        &self.entries
    }

    /// Children that hold resources (everything but people and robots).
    pub(crate) fn container_children(&self, id: UnitId) -> Result<Vec<UnitId>, InventoryError> {
        let entry = self.entry(id)?;
        Ok(entry
            .inventory
            .contained
            .iter()
            .copied()
            .filter(|child| {
                self.entries
                    .get(child)
                    .is_some_and(|child| child.unit.kind.is_container())
            })
            .collect())
    }

    fn emit(&mut self, unit: UnitId, kind: UnitEventKind) {
        if self.listeners.is_empty() {
            return;
        }
        let event = UnitEvent { unit, kind };
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared builders for the tree's unit tests.

    use std::sync::Arc;

    use stowage_types::{PhaseClass, ResourceId, UnitId, UnitKind};

    use super::ContainmentTree;
    use crate::registry::ResourceRegistry;
    use crate::unit::Unit;

    pub(crate) struct World {
        pub(crate) tree: ContainmentTree,
        pub(crate) oxygen: ResourceId,
        pub(crate) water: ResourceId,
        pub(crate) dust: ResourceId,
        pub(crate) wrench: ResourceId,
        pub(crate) nitrogen: ResourceId,
    }

    pub(crate) fn world() -> World {
        let mut builder = ResourceRegistry::builder();
        let oxygen = builder.bulk("oxygen", PhaseClass::Gas).unwrap_or(ResourceId(90));
        let water = builder.bulk("water", PhaseClass::Liquid).unwrap_or(ResourceId(91));
        let dust = builder.bulk("regolith dust", PhaseClass::Solid).unwrap_or(ResourceId(92));
        let wrench = builder.discrete("wrench", 2.0).unwrap_or(ResourceId(93));
        let nitrogen = builder.bulk("nitrogen", PhaseClass::Gas).unwrap_or(ResourceId(94));
        World {
            tree: ContainmentTree::new(Arc::new(builder.build())),
            oxygen,
            water,
            dust,
            wrench,
            nitrogen,
        }
    }

    impl World {
        pub(crate) fn unit(&mut self, name: &str, kind: UnitKind, mass: f64, general: f64) -> UnitId {
            let id = self
                .tree
                .add_unit(Unit::new(name, kind, mass))
                .unwrap_or_else(|_| UnitId::new());
            let _ = self.tree.add_general_capacity(id, general);
            id
        }
    }

    pub(crate) fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }
}
