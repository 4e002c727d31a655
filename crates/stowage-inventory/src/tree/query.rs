//! Read-only capacity, stored, and mass queries.
//!
//! Nested capacity of an inventory `I` for resource `r` is built from three
//! pieces:
//!
//! - `C(I, r) = local(r) + min(Σ C(child, r), headroom(I) + Σ stored(child, r))`,
//!   where `headroom(I)` is `I`'s own unused general capacity floored at
//!   zero. Children can only grow inside the room `I` has for them.
//! - `ancestor_limit(I)`, the smallest headroom of any ancestor (`∞` for a
//!   root). Anything added to `I`'s subtree also weighs on every ancestor.
//! - `capacity_of(I, r, Nested) = min(C(I, r), stored(I, r) + ancestor_limit(I))`.
//!
//! `C` and nested stored amounts are memoized per inventory; the ancestor
//! limit is recomputed on each read because it depends on the path above.

use std::collections::BTreeSet;

use stowage_types::{Freshness, ResourceId, ResourceKind, Scope, UnitId, UnitKind};

use super::ContainmentTree;
use crate::cache::CacheFamily;
use crate::error::InventoryError;

impl ContainmentTree {
    // -----------------------------------------------------------------------
    // Capacity and stored
    // -----------------------------------------------------------------------

    /// Capacity for a bulk resource.
    ///
    /// `Scope::Local` is the local store's capacity. `Scope::Nested` adds
    /// what container children offer, limited by this unit's and every
    /// ancestor's general headroom.
    pub fn capacity_of(
        &self,
        id: UnitId,
        resource: ResourceId,
        scope: Scope,
        freshness: Freshness,
    ) -> Result<f64, InventoryError> {
        self.registry.descriptor(resource)?;
        let entry = self.entry(id)?;
        match scope {
            Scope::Local => Ok(entry.inventory.store.capacity(&self.registry, resource)),
            Scope::Nested => {
                let capacity = self.nested_capacity(id, resource, freshness)?;
                let stored = self.nested_stored(id, resource, freshness)?;
                let limit = self.ancestor_limit(id, freshness)?;
                Ok(capacity.min(stored + limit))
            }
        }
    }

    /// Amount of a bulk resource held locally, or in the whole container
    /// subtree for `Scope::Nested`.
    pub fn stored_of(
        &self,
        id: UnitId,
        resource: ResourceId,
        scope: Scope,
        freshness: Freshness,
    ) -> Result<f64, InventoryError> {
        self.registry.descriptor(resource)?;
        match scope {
            Scope::Local => Ok(self.entry(id)?.inventory.store.stored(resource)),
            Scope::Nested => self.nested_stored(id, resource, freshness),
        }
    }

    /// How much more of a bulk resource fits, never negative.
    ///
    /// Both scopes are limited by the general headroom of every ancestor.
    pub fn remaining_capacity(
        &self,
        id: UnitId,
        resource: ResourceId,
        scope: Scope,
        freshness: Freshness,
    ) -> Result<f64, InventoryError> {
        self.registry.descriptor(resource)?;
        match scope {
            Scope::Local => {
                let local = self.entry(id)?.inventory.store.remaining(&self.registry, resource);
                Ok(local.min(self.ancestor_limit(id, freshness)?))
            }
            Scope::Nested => {
                let capacity = self.capacity_of(id, resource, Scope::Nested, freshness)?;
                let stored = self.nested_stored(id, resource, freshness)?;
                Ok((capacity - stored).max(0.0))
            }
        }
    }

    /// Unused general capacity for units and parts, limited by every
    /// ancestor's headroom. Never negative.
    pub fn remaining_general_capacity(
        &self,
        id: UnitId,
        freshness: Freshness,
    ) -> Result<f64, InventoryError> {
        let own = self.own_headroom(id, freshness)?;
        let limit = self.ancestor_limit(id, freshness)?;
        Ok(own.min(limit).max(0.0))
    }

    // -----------------------------------------------------------------------
    // Mass
    // -----------------------------------------------------------------------

    /// Mass charged against general capacity: parts plus contained units (kg).
    pub fn general_stored_mass(&self, id: UnitId, freshness: Freshness) -> Result<f64, InventoryError> {
        let entry = self.entry(id)?;
        Ok(entry.inventory.store.item_mass(&self.registry) + self.contained_mass(id, freshness)?)
    }

    /// Everything the inventory holds: bulk, parts, and contained units (kg).
    pub fn total_inventory_mass(&self, id: UnitId, freshness: Freshness) -> Result<f64, InventoryError> {
        let entry = self.entry(id)?;
        Ok(entry.inventory.store.bulk_mass() + self.general_stored_mass(id, freshness)?)
    }

    /// The unit's own mass plus everything it holds (kg).
    pub fn unit_mass(&self, id: UnitId, freshness: Freshness) -> Result<f64, InventoryError> {
        let base = self.entry(id)?.unit.base_mass;
        Ok(base + self.total_inventory_mass(id, freshness)?)
    }

    /// Whether the unit holds nothing at all.
    pub fn is_empty_unit(&self, id: UnitId) -> Result<bool, InventoryError> {
        Ok(self.entry(id)?.inventory.is_empty())
    }

    // -----------------------------------------------------------------------
    // Enumeration
    // -----------------------------------------------------------------------

    /// Bulk resources present locally, or anywhere in the container subtree.
    pub fn all_stored_resources(
        &self,
        id: UnitId,
        scope: Scope,
    ) -> Result<BTreeSet<ResourceId>, InventoryError> {
        let mut found: BTreeSet<ResourceId> =
            self.entry(id)?.inventory.store.stored_resources().collect();
        if scope == Scope::Nested {
            for child in self.container_children(id)? {
                found.extend(self.all_stored_resources(child, Scope::Nested)?);
            }
        }
        Ok(found)
    }

    /// Discrete parts present locally.
    pub fn all_item_resources(&self, id: UnitId) -> Result<BTreeSet<ResourceId>, InventoryError> {
        Ok(self.entry(id)?.inventory.store.item_resources().collect())
    }

    /// Number of parts held locally, or by every unit in the subtree.
    pub fn item_count(
        &self,
        id: UnitId,
        resource: ResourceId,
        scope: Scope,
    ) -> Result<u64, InventoryError> {
        self.registry.expect_kind(resource, ResourceKind::Discrete)?;
        let entry = self.entry(id)?;
        let mut count = u64::from(entry.inventory.store.item_count(resource));
        if scope == Scope::Nested {
            for child in &entry.inventory.contained {
                count = count.saturating_add(self.item_count(*child, resource, Scope::Nested)?);
            }
        }
        Ok(count)
    }

    /// Whether at least one part is held locally.
    pub fn has_item(&self, id: UnitId, resource: ResourceId) -> Result<bool, InventoryError> {
        Ok(self.item_count(id, resource, Scope::Local)? > 0)
    }

    // -----------------------------------------------------------------------
    // Containment
    // -----------------------------------------------------------------------

    /// Directly contained units, in storage order.
    pub fn contained_units(&self, id: UnitId) -> Result<&[UnitId], InventoryError> {
        Ok(self.entry(id)?.inventory.contained())
    }

    /// Whether `unit` is directly contained in `container`.
    pub fn contains_unit(&self, container: UnitId, unit: UnitId) -> Result<bool, InventoryError> {
        Ok(self.entry(container)?.inventory.contained.contains(&unit))
    }

    /// The unit directly holding `id`, if any.
    pub fn container_of(&self, id: UnitId) -> Result<Option<UnitId>, InventoryError> {
        Ok(self.entry(id)?.unit.container())
    }

    /// Every container above `id`, nearest first.
    pub fn ancestors(&self, id: UnitId) -> Result<Vec<UnitId>, InventoryError> {
        self.entry(id)?;
        Ok(self.ancestor_chain(id))
    }

    /// The outermost container above `id`, or `id` itself.
    pub fn root_of(&self, id: UnitId) -> Result<UnitId, InventoryError> {
        Ok(self.ancestors(id)?.last().copied().unwrap_or(id))
    }

    /// Directly contained units of one kind.
    pub fn find_units_of_kind(&self, id: UnitId, kind: UnitKind) -> Result<Vec<UnitId>, InventoryError> {
        let entry = self.entry(id)?;
        Ok(entry
            .inventory
            .contained
            .iter()
            .copied()
            .filter(|child| self.entries.get(child).is_some_and(|e| e.unit.kind == kind))
            .collect())
    }

    /// Number of directly contained units of one kind.
    pub fn count_units_of_kind(&self, id: UnitId, kind: UnitKind) -> Result<usize, InventoryError> {
        Ok(self.find_units_of_kind(id, kind)?.len())
    }

    /// Number of directly contained, completely empty units of one kind.
    pub fn count_empty_units_of_kind(&self, id: UnitId, kind: UnitKind) -> Result<usize, InventoryError> {
        Ok(self
            .find_units_of_kind(id, kind)?
            .into_iter()
            .filter(|child| self.entries.get(child).is_some_and(|e| e.inventory.is_empty()))
            .count())
    }

    // -----------------------------------------------------------------------
    // Memoized building blocks
    // -----------------------------------------------------------------------

    /// `C(I, r)`: subtree capacity clamped by this unit's own headroom.
    pub(crate) fn nested_capacity(
        &self,
        id: UnitId,
        resource: ResourceId,
        freshness: Freshness,
    ) -> Result<f64, InventoryError> {
        let entry = self.entry(id)?;
        entry
            .inventory
            .cache
            .get_or_compute(CacheFamily::Capacity, resource, freshness, || -> Result<f64, InventoryError> {
                let local = entry.inventory.store.capacity(&self.registry, resource);
                let children = self.containers_capacity(id, resource, freshness)?;
                let room = self.own_headroom(id, freshness)?.max(0.0)
                    + self.containers_stored(id, resource, freshness)?;
                Ok(local + children.min(room))
            })
    }

    fn containers_capacity(
        &self,
        id: UnitId,
        resource: ResourceId,
        freshness: Freshness,
    ) -> Result<f64, InventoryError> {
        let entry = self.entry(id)?;
        entry
            .inventory
            .cache
            .get_or_compute(CacheFamily::ContainersCapacity, resource, freshness, || -> Result<f64, InventoryError> {
                let mut sum = 0.0;
                for child in self.container_children(id)? {
                    sum += self.nested_capacity(child, resource, freshness)?;
                }
                Ok(sum)
            })
    }

    /// Local plus container-subtree stored amount.
    pub(crate) fn nested_stored(
        &self,
        id: UnitId,
        resource: ResourceId,
        freshness: Freshness,
    ) -> Result<f64, InventoryError> {
        let entry = self.entry(id)?;
        entry
            .inventory
            .cache
            .get_or_compute(CacheFamily::Stored, resource, freshness, || -> Result<f64, InventoryError> {
                Ok(entry.inventory.store.stored(resource)
                    + self.containers_stored(id, resource, freshness)?)
            })
    }

    fn containers_stored(
        &self,
        id: UnitId,
        resource: ResourceId,
        freshness: Freshness,
    ) -> Result<f64, InventoryError> {
        let entry = self.entry(id)?;
        entry
            .inventory
            .cache
            .get_or_compute(CacheFamily::ContainersStored, resource, freshness, || -> Result<f64, InventoryError> {
                let mut sum = 0.0;
                for child in self.container_children(id)? {
                    sum += self.nested_stored(child, resource, freshness)?;
                }
                Ok(sum)
            })
    }

    /// Mass of every directly contained unit, people and robots included.
    fn contained_mass(&self, id: UnitId, freshness: Freshness) -> Result<f64, InventoryError> {
        let entry = self.entry(id)?;
        entry.inventory.cache.contained_mass(freshness, || -> Result<f64, InventoryError> {
            let mut sum = 0.0;
            for child in &entry.inventory.contained {
                sum += self.unit_mass(*child, freshness)?;
            }
            Ok(sum)
        })
    }

    /// General capacity minus parts and contained units. May be negative
    /// after capacity is withdrawn.
    pub(crate) fn own_headroom(&self, id: UnitId, freshness: Freshness) -> Result<f64, InventoryError> {
        let entry = self.entry(id)?;
        Ok(entry.inventory.general_capacity - self.general_stored_mass(id, freshness)?)
    }

    /// Smallest non-negative headroom of any ancestor, `∞` for a root.
    pub(crate) fn ancestor_limit(&self, id: UnitId, freshness: Freshness) -> Result<f64, InventoryError> {
        let mut limit = f64::INFINITY;
        for ancestor in self.ancestor_chain(id) {
            limit = limit.min(self.own_headroom(ancestor, freshness)?.max(0.0));
        }
        Ok(limit)
    }
}
