//! Dirty-bit memoization of subtree aggregates.
//!
//! Each [`Inventory`](crate::Inventory) owns one [`CapacityCache`]. Per
//! resource it keeps four independently dirtied families, indexed densely by
//! [`ResourceId`], plus one scalar for the mass of contained units:
//!
//! | Family | Value |
//! |--------|-------|
//! | `Stored` | local + nested stored amount |
//! | `ContainersStored` | nested stored amount of container children only |
//! | `Capacity` | unclamped nested capacity of this subtree |
//! | `ContainersCapacity` | sum of the container children's nested capacity |
//!
//! Slots are `Cell`s so that read queries (`&self`) can memoize. The engine is
//! single-threaded; the cache is deliberately `!Sync`.

use std::cell::Cell;

use stowage_types::{Freshness, ResourceId};

/// One memoized value and its validity flag.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    value: f64,
    dirty: bool,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            value: 0.0,
            dirty: true,
        }
    }
}

/// The per-resource cache families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheFamily {
    /// Total stored amount of the subtree.
    Stored,
    /// Stored amount held by container children.
    ContainersStored,
    /// Total unclamped capacity of the subtree.
    Capacity,
    /// Capacity offered by container children.
    ContainersCapacity,
}

impl CacheFamily {
    /// Every family, in invalidation order.
    pub const ALL: [Self; 4] = [
        Self::Stored,
        Self::ContainersStored,
        Self::Capacity,
        Self::ContainersCapacity,
    ];
}

/// Memoized subtree aggregates for one inventory.
#[derive(Debug, Clone, Default)]
pub struct CapacityCache {
    stored: Vec<Cell<Slot>>,
    containers_stored: Vec<Cell<Slot>>,
    capacity: Vec<Cell<Slot>>,
    containers_capacity: Vec<Cell<Slot>>,
    contained_mass: Cell<Slot>,
}

fn dirty_slots(len: usize) -> Vec<Cell<Slot>> {
    vec![Cell::new(Slot::default()); len]
}

impl CapacityCache {
    /// Create a fully dirty cache for `resources` resource ids.
    pub fn new(resources: usize) -> Self {
        Self {
            stored: dirty_slots(resources),
            containers_stored: dirty_slots(resources),
            capacity: dirty_slots(resources),
            containers_capacity: dirty_slots(resources),
            contained_mass: Cell::new(Slot::default()),
        }
    }

    const fn family(&self, family: CacheFamily) -> &Vec<Cell<Slot>> {
        match family {
            CacheFamily::Stored => &self.stored,
            CacheFamily::ContainersStored => &self.containers_stored,
            CacheFamily::Capacity => &self.capacity,
            CacheFamily::ContainersCapacity => &self.containers_capacity,
        }
    }

    fn slot(&self, family: CacheFamily, resource: ResourceId) -> Option<&Cell<Slot>> {
        resource.index().and_then(|idx| self.family(family).get(idx))
    }

    /// Return the memoized value, recomputing it with `compute` when the
    /// slot is dirty and the caller asked for a fresh value.
    ///
    /// With [`Freshness::AllowStale`] a dirty slot is returned as-is. A
    /// failed computation leaves the slot dirty.
    pub fn get_or_compute<E>(
        &self,
        family: CacheFamily,
        resource: ResourceId,
        freshness: Freshness,
        compute: impl FnOnce() -> Result<f64, E>,
    ) -> Result<f64, E> {
        let Some(cell) = self.slot(family, resource) else {
            return compute();
        };
        resolve(cell, freshness, compute)
    }

    /// Memoized mass of every directly contained unit.
    pub fn contained_mass<E>(
        &self,
        freshness: Freshness,
        compute: impl FnOnce() -> Result<f64, E>,
    ) -> Result<f64, E> {
        resolve(&self.contained_mass, freshness, compute)
    }

    /// Mark one resource of one family dirty.
    pub fn mark_dirty(&self, family: CacheFamily, resource: ResourceId) {
        if let Some(cell) = self.slot(family, resource) {
            cell.set(Slot {
                dirty: true,
                ..cell.get()
            });
        }
    }

    /// Mark every resource of one family dirty.
    pub fn mark_family_dirty(&self, family: CacheFamily) {
        for cell in self.family(family) {
            cell.set(Slot {
                dirty: true,
                ..cell.get()
            });
        }
    }

    /// Mark the contained-mass scalar dirty.
    pub fn mark_mass_dirty(&self) {
        self.contained_mass.set(Slot {
            dirty: true,
            ..self.contained_mass.get()
        });
    }

    /// Mark everything dirty.
    pub fn mark_all_dirty(&self) {
        for family in CacheFamily::ALL {
            self.mark_family_dirty(family);
        }
        self.mark_mass_dirty();
    }

    /// Whether a slot currently needs recomputation.
    pub fn is_dirty(&self, family: CacheFamily, resource: ResourceId) -> bool {
        self.slot(family, resource).is_none_or(|cell| cell.get().dirty)
    }
}

fn resolve<E>(
    cell: &Cell<Slot>,
    freshness: Freshness,
    compute: impl FnOnce() -> Result<f64, E>,
) -> Result<f64, E> {
    let slot = cell.get();
    if !slot.dirty || freshness == Freshness::AllowStale {
        return Ok(slot.value);
    }
    let value = compute()?;
    tracing::trace!(value, "cache slot recomputed");
    cell.set(Slot {
        value,
        dirty: false,
    });
    Ok(value)
}
