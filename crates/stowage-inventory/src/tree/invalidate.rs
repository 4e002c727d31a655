//! Upward cache invalidation.
//!
//! A change in one inventory can stale cached aggregates in every ancestor,
//! so each helper walks the container chain to the root. Invalidation is
//! scoped to one resource wherever possible; only containment changes
//! dirty every slot.

use stowage_types::{ResourceDescriptor, ResourceId, UnitId};

use super::ContainmentTree;
use crate::cache::CacheFamily;

impl ContainmentTree {
    /// The container chain above `id`, nearest first.
    ///
    /// Bounded by the number of units so a corrupted link cannot loop.
    pub(crate) fn ancestor_chain(&self, id: UnitId) -> Vec<UnitId> {
        let mut chain = Vec::new();
        let mut current = self.entries.get(&id).and_then(|entry| entry.unit.container());
        while let Some(parent) = current {
            if chain.len() >= self.entries.len() {
                tracing::warn!(unit = %id, "container chain longer than the tree, stopping");
                break;
            }
            chain.push(parent);
            current = self.entries.get(&parent).and_then(|entry| entry.unit.container());
        }
        chain
    }

    fn for_each_ancestor(&self, id: UnitId, mut visit: impl FnMut(usize, &crate::Inventory)) {
        for (depth, ancestor) in self.ancestor_chain(id).into_iter().enumerate() {
            if let Some(entry) = self.entries.get(&ancestor) {
                visit(depth, &entry.inventory);
            }
        }
    }

    /// A bulk amount changed in `id`'s local store.
    pub(crate) fn invalidate_stored(&self, id: UnitId, resource: ResourceId) {
        if let Some(entry) = self.entries.get(&id) {
            entry.inventory.cache.mark_dirty(CacheFamily::Stored, resource);
        }
        self.for_each_ancestor(id, |_, inventory| {
            for family in CacheFamily::ALL {
                inventory.cache.mark_dirty(family, resource);
            }
        });
        self.invalidate_phase_peers(id, resource);
        self.invalidate_mass(id);
    }

    /// Every other member of `resource`'s phase draws on the same pool, so
    /// their capacity moves whenever this one's excess over its grant does.
    pub(crate) fn invalidate_phase_peers(&self, id: UnitId, resource: ResourceId) {
        let Some(phase) = self.registry.get(resource).and_then(ResourceDescriptor::phase) else {
            return;
        };
        for peer in self.registry.phase_members(phase).filter(|peer| *peer != resource) {
            self.invalidate_capacity(id, peer);
        }
    }

    /// `id`'s own mass changed.
    ///
    /// Every ancestor's contained mass and general headroom move with it,
    /// which touches the capacity clamp of every resource.
    pub(crate) fn invalidate_mass(&self, id: UnitId) {
        self.for_each_ancestor(id, |depth, inventory| {
            inventory.cache.mark_mass_dirty();
            inventory.cache.mark_family_dirty(CacheFamily::Capacity);
            if depth > 0 {
                inventory.cache.mark_family_dirty(CacheFamily::ContainersCapacity);
            }
        });
    }

    /// A bulk capacity grant for `resource` changed in `id`.
    pub(crate) fn invalidate_capacity(&self, id: UnitId, resource: ResourceId) {
        if let Some(entry) = self.entries.get(&id) {
            entry.inventory.cache.mark_dirty(CacheFamily::Capacity, resource);
        }
        self.for_each_ancestor(id, |_, inventory| {
            inventory.cache.mark_dirty(CacheFamily::Capacity, resource);
            inventory.cache.mark_dirty(CacheFamily::ContainersCapacity, resource);
        });
    }

    /// `id`'s general headroom changed without its mass changing.
    pub(crate) fn invalidate_general(&self, id: UnitId) {
        if let Some(entry) = self.entries.get(&id) {
            entry.inventory.cache.mark_family_dirty(CacheFamily::Capacity);
        }
        self.for_each_ancestor(id, |_, inventory| {
            inventory.cache.mark_family_dirty(CacheFamily::Capacity);
            inventory.cache.mark_family_dirty(CacheFamily::ContainersCapacity);
        });
    }

    /// `id`'s set of contained units changed.
    pub(crate) fn invalidate_everything(&self, id: UnitId) {
        if let Some(entry) = self.entries.get(&id) {
            entry.inventory.cache.mark_all_dirty();
        }
        self.for_each_ancestor(id, |_, inventory| inventory.cache.mark_all_dirty());
    }
}

#[cfg(test)]
mod tests {
    use stowage_types::{Freshness, Scope, UnitKind};

    use super::super::fixtures::world;
    use crate::cache::CacheFamily;

    #[test]
    fn nested_store_dirties_every_ancestor() {
        let mut w = world();
        let base = w.unit("base", UnitKind::Settlement, 0.0, 10_000.0);
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 1_000.0);
        let bag = w.unit("bag", UnitKind::Container, 1.0, 0.0);
        assert!(w.tree.store_unit(base, rover).is_ok());
        assert!(w.tree.store_unit(rover, bag).is_ok());
        assert!(w.tree.add_type_capacity(bag, w.dust, 10.0).is_ok());

        // Warm every cache on the path.
        assert!(w.tree.capacity_of(base, w.dust, Scope::Nested, Freshness::Fresh).is_ok());
        assert!(w.tree.stored_of(base, w.dust, Scope::Nested, Freshness::Fresh).is_ok());
        for id in [base, rover] {
            let cache = w.tree.inventory(id).map(|inv| inv.cache().is_dirty(CacheFamily::Stored, w.dust));
            assert_eq!(cache.ok(), Some(false));
        }

        assert!(w.tree.store(bag, w.dust, 5.0, Scope::Local).is_ok());
        for id in [base, rover, bag] {
            let cache = w.tree.inventory(id).map(|inv| inv.cache().is_dirty(CacheFamily::Stored, w.dust));
            assert_eq!(cache.ok(), Some(true));
        }
    }

    #[test]
    fn ancestor_chain_is_nearest_first() {
        let mut w = world();
        let base = w.unit("base", UnitKind::Settlement, 0.0, 10_000.0);
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 1_000.0);
        let bag = w.unit("bag", UnitKind::Container, 1.0, 0.0);
        assert!(w.tree.store_unit(base, rover).is_ok());
        assert!(w.tree.store_unit(rover, bag).is_ok());
        assert_eq!(w.tree.ancestor_chain(bag), vec![rover, base]);
        assert!(w.tree.ancestor_chain(base).is_empty());
    }
}
