//! Bulk and discrete mutations, transfers, and capacity grants.
//!
//! Multi-container store and retrieve are not atomic. Both check the whole
//! amount up front and fail without mutation when it cannot possibly fit or
//! be found. If the amount still cannot be fully placed while walking the
//! subtree, the part already moved stays moved and the error carries the
//! leftover as `remainder`. Callers needing all-or-nothing semantics
//! pre-check with [`ContainmentTree::remaining_capacity`] or
//! [`ContainmentTree::stored_of`].

use stowage_types::{Freshness, PhaseClass, ResourceId, ResourceKind, Scope, UnitEventKind, UnitId};

use super::ContainmentTree;
use crate::error::InventoryError;
use crate::store::check_amount;

impl ContainmentTree {
    // -----------------------------------------------------------------------
    // Bulk resources
    // -----------------------------------------------------------------------

    /// Store a bulk amount, locally first and then, for `Scope::Nested`,
    /// depth-first into container children in storage order.
    ///
    /// # Errors
    ///
    /// [`InventoryError::CapacityExceeded`] if the amount exceeds the
    /// remaining capacity for `scope` (nothing is stored).
    /// [`InventoryError::StorageExceeded`] if a remainder is left after
    /// distribution (the rest stays stored).
    pub fn store(
        &mut self,
        id: UnitId,
        resource: ResourceId,
        amount: f64,
        scope: Scope,
    ) -> Result<(), InventoryError> {
        check_amount(amount)?;
        self.registry.expect_kind(resource, ResourceKind::Bulk)?;
        let available = self.remaining_capacity(id, resource, scope, Freshness::Fresh)?;
        if amount <= 0.0 {
            return Ok(());
        }
        if amount > available + self.epsilon() {
            return Err(InventoryError::CapacityExceeded {
                resource,
                requested: amount,
                available,
            });
        }
        let remainder = self.distribute_store(id, resource, amount, scope)?;
        if remainder > self.epsilon() {
            tracing::warn!(
                unit = %id,
                resource = %self.registry.name_of(resource),
                amount,
                remainder,
                "partial store, remainder not placed"
            );
            return Err(InventoryError::StorageExceeded {
                resource,
                requested: amount,
                remainder,
            });
        }
        Ok(())
    }

    /// Retrieve a bulk amount, locally first and then depth-first from
    /// container children in storage order.
    ///
    /// # Errors
    ///
    /// [`InventoryError::InsufficientStock`] if the subtree holds less than
    /// `amount` (nothing is retrieved). [`InventoryError::RetrievalExceeded`]
    /// if a remainder could not be found (the rest stays retrieved).
    pub fn retrieve(
        &mut self,
        id: UnitId,
        resource: ResourceId,
        amount: f64,
    ) -> Result<(), InventoryError> {
        check_amount(amount)?;
        self.registry.expect_kind(resource, ResourceKind::Bulk)?;
        let available = self.nested_stored(id, resource, Freshness::Fresh)?;
        if amount <= 0.0 {
            return Ok(());
        }
        if amount > available + self.epsilon() {
            return Err(InventoryError::InsufficientStock {
                resource,
                requested: amount,
                available,
            });
        }
        let remainder = self.distribute_retrieve(id, resource, amount)?;
        if remainder > self.epsilon() {
            tracing::warn!(
                unit = %id,
                resource = %self.registry.name_of(resource),
                amount,
                remainder,
                "partial retrieval, remainder not found"
            );
            return Err(InventoryError::RetrievalExceeded {
                resource,
                requested: amount,
                remainder,
            });
        }
        Ok(())
    }

    /// Move a bulk amount between any two units.
    ///
    /// Both sides are checked before anything moves. If the destination
    /// takes only part of the amount, the rest goes back to the source and
    /// the destination's `StorageExceeded` error is returned; the moved part
    /// is `requested - remainder`.
    ///
    /// # Errors
    ///
    /// The up-front `InsufficientStock` / `CapacityExceeded` checks, the
    /// partial errors above, or [`InventoryError::TransferStranded`] when the
    /// unmoved part could not be returned to the source.
    pub fn transfer(
        &mut self,
        from: UnitId,
        to: UnitId,
        resource: ResourceId,
        amount: f64,
    ) -> Result<(), InventoryError> {
        check_amount(amount)?;
        self.registry.expect_kind(resource, ResourceKind::Bulk)?;
        let available = self.nested_stored(from, resource, Freshness::Fresh)?;
        let room = self.remaining_capacity(to, resource, Scope::Nested, Freshness::Fresh)?;
        if amount <= 0.0 {
            return Ok(());
        }
        if amount > available + self.epsilon() {
            return Err(InventoryError::InsufficientStock {
                resource,
                requested: amount,
                available,
            });
        }
        if amount > room + self.epsilon() {
            return Err(InventoryError::CapacityExceeded {
                resource,
                requested: amount,
                available: room,
            });
        }

        if let Err(err) = self.retrieve(from, resource, amount) {
            if let Some(remainder) = err.remainder() {
                self.return_to_source(from, resource, 0.0, amount - remainder)?;
            }
            return Err(err);
        }
        match self.store(to, resource, amount, Scope::Nested) {
            Ok(()) => {
                tracing::debug!(
                    from = %from,
                    to = %to,
                    resource = %self.registry.name_of(resource),
                    amount,
                    "transferred"
                );
                Ok(())
            }
            Err(err) => {
                let unplaced = err.remainder().unwrap_or(amount);
                self.return_to_source(from, resource, amount - unplaced, unplaced)?;
                Err(err)
            }
        }
    }

    /// Put `unmoved` back into `source` after a failed transfer. `moved` is
    /// what already reached the destination.
    fn return_to_source(
        &mut self,
        source: UnitId,
        resource: ResourceId,
        moved: f64,
        unmoved: f64,
    ) -> Result<(), InventoryError> {
        if unmoved <= self.epsilon() {
            return Ok(());
        }
        self.store(source, resource, unmoved, Scope::Nested).map_err(|err| {
            let stranded = err.remainder().unwrap_or(unmoved);
            tracing::warn!(
                unit = %source,
                resource = %self.registry.name_of(resource),
                stranded,
                error = %err,
                "could not return unmoved amount to source"
            );
            InventoryError::TransferStranded {
                resource,
                from: source,
                moved,
                stranded,
                cause: Box::new(err),
            }
        })
    }

    /// Place `amount` in `id` and, for `Scope::Nested`, its container
    /// subtree. Returns what could not be placed.
    fn distribute_store(
        &mut self,
        id: UnitId,
        resource: ResourceId,
        amount: f64,
        scope: Scope,
    ) -> Result<f64, InventoryError> {
        let eps = self.epsilon();
        let mut remaining = amount;

        let local_room = self.remaining_capacity(id, resource, Scope::Local, Freshness::Fresh)?;
        let local = if remaining <= local_room + eps {
            remaining
        } else {
            local_room
        };
        if local > 0.0 {
            self.store_local(id, resource, local)?;
            remaining -= local;
        }

        if scope == Scope::Nested {
            for child in self.container_children(id)? {
                if remaining <= eps {
                    break;
                }
                let room = self.remaining_capacity(child, resource, Scope::Nested, Freshness::Fresh)?;
                if room <= eps {
                    continue;
                }
                let offered = remaining.min(room);
                let left = self.distribute_store(child, resource, offered, Scope::Nested)?;
                remaining -= offered - left;
            }
        }
        Ok(remaining.max(0.0))
    }

    /// Take `amount` from `id` and its container subtree. Returns what
    /// could not be found.
    fn distribute_retrieve(
        &mut self,
        id: UnitId,
        resource: ResourceId,
        amount: f64,
    ) -> Result<f64, InventoryError> {
        let eps = self.epsilon();
        let mut remaining = amount;

        let held = self.entry(id)?.inventory.store.stored(resource);
        let local = if remaining <= held + eps { remaining } else { held };
        if local > 0.0 {
            self.retrieve_local(id, resource, local)?;
            remaining -= local;
        }

        for child in self.container_children(id)? {
            if remaining <= eps {
                break;
            }
            let stock = self.nested_stored(child, resource, Freshness::Fresh)?;
            if stock <= eps {
                continue;
            }
            let wanted = remaining.min(stock);
            let left = self.distribute_retrieve(child, resource, wanted)?;
            remaining -= wanted - left;
        }
        Ok(remaining.max(0.0))
    }

    pub(crate) fn store_local(
        &mut self,
        id: UnitId,
        resource: ResourceId,
        amount: f64,
    ) -> Result<(), InventoryError> {
        let eps = self.epsilon();
        let entry = self.entries.get_mut(&id).ok_or(InventoryError::UnknownUnit(id))?;
        entry.inventory.store.store(&self.registry, resource, amount, eps)?;
        self.invalidate_stored(id, resource);
        self.emit(id, UnitEventKind::ResourceStored { resource, amount });
        tracing::debug!(
            unit = %id,
            resource = %self.registry.name_of(resource),
            amount,
            "resource stored"
        );
        Ok(())
    }

    pub(crate) fn retrieve_local(
        &mut self,
        id: UnitId,
        resource: ResourceId,
        amount: f64,
    ) -> Result<(), InventoryError> {
        let eps = self.epsilon();
        let entry = self.entries.get_mut(&id).ok_or(InventoryError::UnknownUnit(id))?;
        entry.inventory.store.retrieve(resource, amount, eps)?;
        self.invalidate_stored(id, resource);
        self.emit(id, UnitEventKind::ResourceRetrieved { resource, amount });
        tracing::debug!(
            unit = %id,
            resource = %self.registry.name_of(resource),
            amount,
            "resource retrieved"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Discrete parts
    // -----------------------------------------------------------------------

    /// Store parts locally. Their mass is charged against general capacity.
    pub fn store_items(
        &mut self,
        id: UnitId,
        resource: ResourceId,
        count: u32,
    ) -> Result<(), InventoryError> {
        self.registry.expect_kind(resource, ResourceKind::Discrete)?;
        let available = self.remaining_general_capacity(id, Freshness::Fresh)?;
        let eps = self.epsilon();
        let entry = self.entries.get_mut(&id).ok_or(InventoryError::UnknownUnit(id))?;
        entry
            .inventory
            .store
            .store_items(&self.registry, resource, count, available, eps)?;
        if count == 0 {
            return Ok(());
        }
        self.invalidate_general(id);
        self.invalidate_mass(id);
        self.emit(id, UnitEventKind::ItemsStored { resource, count });
        tracing::debug!(unit = %id, resource = %self.registry.name_of(resource), count, "items stored");
        Ok(())
    }

    /// Retrieve parts from the local store.
    pub fn retrieve_items(
        &mut self,
        id: UnitId,
        resource: ResourceId,
        count: u32,
    ) -> Result<(), InventoryError> {
        self.registry.expect_kind(resource, ResourceKind::Discrete)?;
        let entry = self.entry_mut(id)?;
        entry.inventory.store.retrieve_items(resource, count)?;
        if count == 0 {
            return Ok(());
        }
        self.invalidate_general(id);
        self.invalidate_mass(id);
        self.emit(id, UnitEventKind::ItemsRetrieved { resource, count });
        tracing::debug!(unit = %id, resource = %self.registry.name_of(resource), count, "items retrieved");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Capacity grants and mass
    // -----------------------------------------------------------------------

    /// Change general capacity by `delta` (may be negative). The result is
    /// floored at zero.
    pub fn add_general_capacity(&mut self, id: UnitId, delta: f64) -> Result<(), InventoryError> {
        if !delta.is_finite() {
            return Err(InventoryError::InvalidAmount { amount: delta });
        }
        let entry = self.entry_mut(id)?;
        let updated = (entry.inventory.general_capacity + delta).max(0.0);
        entry.inventory.general_capacity = updated;
        self.invalidate_general(id);
        self.emit(id, UnitEventKind::CapacityChanged { resource: None });
        tracing::debug!(unit = %id, delta, general_capacity = updated, "general capacity changed");
        Ok(())
    }

    /// Grant capacity for one bulk resource.
    pub fn add_type_capacity(
        &mut self,
        id: UnitId,
        resource: ResourceId,
        amount: f64,
    ) -> Result<(), InventoryError> {
        self.registry.expect_kind(resource, ResourceKind::Bulk)?;
        self.entry_mut(id)?.inventory.store.add_type_capacity(resource, amount)?;
        self.capacity_changed(id, resource);
        Ok(())
    }

    /// Withdraw capacity for one bulk resource.
    ///
    /// Withdrawing below the stored amount is allowed; the contents stay and
    /// remaining capacity reads zero until enough is retrieved.
    pub fn remove_type_capacity(
        &mut self,
        id: UnitId,
        resource: ResourceId,
        amount: f64,
    ) -> Result<(), InventoryError> {
        self.registry.expect_kind(resource, ResourceKind::Bulk)?;
        let eps = self.epsilon();
        self.entry_mut(id)?
            .inventory
            .store
            .remove_type_capacity(resource, amount, eps)?;
        self.capacity_changed(id, resource);
        Ok(())
    }

    /// Grant capacity to every bulk resource of a phase class.
    pub fn add_phase_capacity(
        &mut self,
        id: UnitId,
        phase: PhaseClass,
        amount: f64,
    ) -> Result<(), InventoryError> {
        self.entry_mut(id)?.inventory.store.add_phase_capacity(phase, amount)?;
        self.phase_capacity_changed(id, phase);
        Ok(())
    }

    /// Withdraw capacity from a phase class pool.
    pub fn remove_phase_capacity(
        &mut self,
        id: UnitId,
        phase: PhaseClass,
        amount: f64,
    ) -> Result<(), InventoryError> {
        let eps = self.epsilon();
        self.entry_mut(id)?
            .inventory
            .store
            .remove_phase_capacity(phase, amount, eps)?;
        self.phase_capacity_changed(id, phase);
        Ok(())
    }

    /// Replace a unit's own mass, for example after wear or modification.
    pub fn set_base_mass(&mut self, id: UnitId, mass: f64) -> Result<(), InventoryError> {
        check_amount(mass)?;
        self.entry_mut(id)?.unit.base_mass = mass;
        self.invalidate_mass(id);
        self.emit(id, UnitEventKind::MassChanged { mass });
        tracing::debug!(unit = %id, mass, "base mass changed");
        Ok(())
    }

    fn capacity_changed(&mut self, id: UnitId, resource: ResourceId) {
        self.invalidate_capacity(id, resource);
        self.invalidate_phase_peers(id, resource);
        self.emit(id, UnitEventKind::CapacityChanged { resource: Some(resource) });
        tracing::debug!(unit = %id, resource = %self.registry.name_of(resource), "capacity changed");
    }

    fn phase_capacity_changed(&mut self, id: UnitId, phase: PhaseClass) {
        let members: Vec<ResourceId> = self.registry.phase_members(phase).collect();
        for resource in members {
            self.invalidate_capacity(id, resource);
        }
        self.emit(id, UnitEventKind::CapacityChanged { resource: None });
        tracing::debug!(unit = %id, %phase, "phase capacity changed");
    }
}

#[cfg(test)]
mod tests {
    use stowage_types::{Freshness, PhaseClass, Scope, UnitKind};

    use super::super::fixtures::{close, world};
    use crate::error::InventoryError;

    #[test]
    fn suit_oxygen_scenario() {
        let mut w = world();
        let suit = w.unit("suit", UnitKind::EvaSuit, 40.0, 0.0);
        assert!(w.tree.add_type_capacity(suit, w.oxygen, 1.0).is_ok());
        assert!(w.tree.store(suit, w.oxygen, 1.0, Scope::Local).is_ok());
        assert!(matches!(
            w.tree.store(suit, w.oxygen, 0.01, Scope::Local),
            Err(InventoryError::CapacityExceeded { .. })
        ));
        assert!(w.tree.retrieve(suit, w.oxygen, 1.0).is_ok());
        let stored = w.tree.stored_of(suit, w.oxygen, Scope::Local, Freshness::Fresh);
        assert!(stored.is_ok_and(|s| close(s, 0.0)));
        let present = w.tree.inventory(suit).map(|inv| inv.store().stored_amounts().contains_key(&w.oxygen));
        assert_eq!(present.ok(), Some(false));
    }

    #[test]
    fn nested_store_fills_local_first_then_children_in_order() {
        let mut w = world();
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 1_000.0);
        let first = w.unit("first tank", UnitKind::Container, 10.0, 0.0);
        let second = w.unit("second tank", UnitKind::Container, 10.0, 0.0);
        assert!(w.tree.add_type_capacity(rover, w.water, 10.0).is_ok());
        assert!(w.tree.add_type_capacity(first, w.water, 15.0).is_ok());
        assert!(w.tree.add_type_capacity(second, w.water, 15.0).is_ok());
        assert!(w.tree.store_unit(rover, first).is_ok());
        assert!(w.tree.store_unit(rover, second).is_ok());

        assert!(w.tree.store(rover, w.water, 30.0, Scope::Nested).is_ok());
        let local = |w: &super::super::fixtures::World, id| {
            w.tree.stored_of(id, w.water, Scope::Local, Freshness::Fresh).unwrap_or(f64::NAN)
        };
        assert!(close(local(&w, rover), 10.0));
        assert!(close(local(&w, first), 15.0));
        assert!(close(local(&w, second), 5.0));
        let total = w.tree.stored_of(rover, w.water, Scope::Nested, Freshness::Fresh);
        assert!(total.is_ok_and(|t| close(t, 30.0)));
    }

    #[test]
    fn store_beyond_capacity_is_rejected_up_front() {
        let mut w = world();
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 1_000.0);
        assert!(w.tree.add_type_capacity(rover, w.water, 10.0).is_ok());
        let result = w.tree.store(rover, w.water, 10.5, Scope::Nested);
        assert!(matches!(result, Err(InventoryError::CapacityExceeded { .. })));
        let stored = w.tree.stored_of(rover, w.water, Scope::Nested, Freshness::Fresh);
        assert!(stored.is_ok_and(|s| close(s, 0.0)));
    }

    #[test]
    fn local_scope_does_not_use_children() {
        let mut w = world();
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 1_000.0);
        let tank = w.unit("tank", UnitKind::Container, 10.0, 0.0);
        assert!(w.tree.add_type_capacity(tank, w.water, 15.0).is_ok());
        assert!(w.tree.store_unit(rover, tank).is_ok());
        assert!(w.tree.store(rover, w.water, 5.0, Scope::Local).is_err());
        assert!(w.tree.store(rover, w.water, 5.0, Scope::Nested).is_ok());
    }

    #[test]
    fn nested_retrieve_drains_children() {
        let mut w = world();
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 1_000.0);
        let tank = w.unit("tank", UnitKind::Container, 10.0, 0.0);
        assert!(w.tree.add_type_capacity(rover, w.water, 5.0).is_ok());
        assert!(w.tree.add_type_capacity(tank, w.water, 15.0).is_ok());
        assert!(w.tree.store_unit(rover, tank).is_ok());
        assert!(w.tree.store(rover, w.water, 20.0, Scope::Nested).is_ok());

        assert!(w.tree.retrieve(rover, w.water, 12.0).is_ok());
        let tank_left = w.tree.stored_of(tank, w.water, Scope::Local, Freshness::Fresh);
        assert!(tank_left.is_ok_and(|s| close(s, 8.0)));
        assert!(matches!(
            w.tree.retrieve(rover, w.water, 9.0),
            Err(InventoryError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn transfer_moves_mass_between_trees() {
        let mut w = world();
        let depot = w.unit("depot", UnitKind::Building, 5_000.0, 0.0);
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 1_000.0);
        assert!(w.tree.add_type_capacity(depot, w.water, 100.0).is_ok());
        assert!(w.tree.add_type_capacity(rover, w.water, 30.0).is_ok());
        assert!(w.tree.store(depot, w.water, 50.0, Scope::Local).is_ok());

        assert!(w.tree.transfer(depot, rover, w.water, 20.0).is_ok());
        let depot_left = w.tree.stored_of(depot, w.water, Scope::Nested, Freshness::Fresh);
        let rover_has = w.tree.stored_of(rover, w.water, Scope::Nested, Freshness::Fresh);
        assert!(depot_left.is_ok_and(|s| close(s, 30.0)));
        assert!(rover_has.is_ok_and(|s| close(s, 20.0)));

        // Too much for the rover: nothing moves.
        assert!(matches!(
            w.tree.transfer(depot, rover, w.water, 25.0),
            Err(InventoryError::CapacityExceeded { .. })
        ));
        let depot_left = w.tree.stored_of(depot, w.water, Scope::Nested, Freshness::Fresh);
        assert!(depot_left.is_ok_and(|s| close(s, 30.0)));
    }

    #[test]
    fn failed_return_to_source_reports_stranded_amount() {
        let mut w = world();
        let depot = w.unit("depot", UnitKind::Building, 5_000.0, 0.0);
        assert!(w.tree.add_type_capacity(depot, w.water, 10.0).is_ok());
        assert!(w.tree.store(depot, w.water, 10.0, Scope::Local).is_ok());
        assert!(w.tree.remove_type_capacity(depot, w.water, 10.0).is_ok());
        // Simulate the rollback after 3 kg left a depot that no longer has
        // room for water.
        assert!(w.tree.retrieve(depot, w.water, 3.0).is_ok());
        let result = w.tree.return_to_source(depot, w.water, 1.0, 3.0);
        assert!(matches!(
            result,
            Err(InventoryError::TransferStranded { from, moved, stranded, ref cause, .. })
                if from == depot
                    && close(moved, 1.0)
                    && close(stranded, 3.0)
                    && matches!(**cause, InventoryError::CapacityExceeded { .. })
        ));
        assert!(w.tree.return_to_source(depot, w.water, 3.0, 0.0).is_ok());
    }

    #[test]
    fn items_use_general_capacity() {
        let mut w = world();
        let locker = w.unit("locker", UnitKind::Container, 20.0, 5.0);
        assert!(w.tree.store_items(locker, w.wrench, 2).is_ok());
        assert!(matches!(
            w.tree.store_items(locker, w.wrench, 1),
            Err(InventoryError::CapacityExceeded { .. })
        ));
        assert!(w.tree.retrieve_items(locker, w.wrench, 2).is_ok());
        assert!(w.tree.store_items(locker, w.oxygen, 1).is_err());
        assert_eq!(w.tree.is_empty_unit(locker).ok(), Some(true));
    }

    #[test]
    fn phase_capacity_grants_apply_to_members() {
        let mut w = world();
        let tank = w.unit("tank", UnitKind::Container, 10.0, 0.0);
        assert!(w.tree.add_phase_capacity(tank, PhaseClass::Gas, 4.0).is_ok());
        let before = w.tree.capacity_of(tank, w.oxygen, Scope::Nested, Freshness::Fresh);
        assert!(before.is_ok_and(|c| close(c, 4.0)));
        assert!(w.tree.remove_phase_capacity(tank, PhaseClass::Gas, 1.0).is_ok());
        let after = w.tree.capacity_of(tank, w.oxygen, Scope::Nested, Freshness::Fresh);
        assert!(after.is_ok_and(|c| close(c, 3.0)));
        let water = w.tree.capacity_of(tank, w.water, Scope::Nested, Freshness::Fresh);
        assert!(water.is_ok_and(|c| close(c, 0.0)));
    }

    #[test]
    fn phase_pool_is_shared_across_resources() {
        let mut w = world();
        let tank = w.unit("tank", UnitKind::Container, 10.0, 0.0);
        assert!(w.tree.add_phase_capacity(tank, PhaseClass::Gas, 4.0).is_ok());
        // Warm the nitrogen cache before oxygen draws on the pool.
        let warm = w.tree.remaining_capacity(tank, w.nitrogen, Scope::Nested, Freshness::Fresh);
        assert!(warm.is_ok_and(|r| close(r, 4.0)));

        assert!(w.tree.store(tank, w.oxygen, 4.0, Scope::Local).is_ok());
        assert!(matches!(
            w.tree.store(tank, w.nitrogen, 4.0, Scope::Nested),
            Err(InventoryError::CapacityExceeded { .. })
        ));
        let room = w.tree.remaining_capacity(tank, w.nitrogen, Scope::Nested, Freshness::Fresh);
        assert!(room.is_ok_and(|r| close(r, 0.0)));

        assert!(w.tree.retrieve(tank, w.oxygen, 1.5).is_ok());
        assert!(w.tree.store(tank, w.nitrogen, 1.5, Scope::Nested).is_ok());
        let gas = w.tree.stored_of(tank, w.oxygen, Scope::Local, Freshness::Fresh).unwrap_or(f64::NAN)
            + w.tree.stored_of(tank, w.nitrogen, Scope::Local, Freshness::Fresh).unwrap_or(f64::NAN);
        assert!(close(gas, 4.0));
    }

    #[test]
    fn shrinking_a_type_grant_draws_on_the_pool() {
        let mut w = world();
        let tank = w.unit("tank", UnitKind::Container, 10.0, 0.0);
        assert!(w.tree.add_type_capacity(tank, w.oxygen, 3.0).is_ok());
        assert!(w.tree.add_phase_capacity(tank, PhaseClass::Gas, 2.0).is_ok());
        assert!(w.tree.store(tank, w.oxygen, 3.0, Scope::Local).is_ok());
        let before = w.tree.capacity_of(tank, w.nitrogen, Scope::Nested, Freshness::Fresh);
        assert!(before.is_ok_and(|c| close(c, 2.0)));
        assert!(w.tree.remove_type_capacity(tank, w.oxygen, 2.0).is_ok());
        let after = w.tree.capacity_of(tank, w.nitrogen, Scope::Nested, Freshness::Fresh);
        assert!(after.is_ok_and(|c| close(c, 0.0)));
    }

    #[test]
    fn general_capacity_floors_at_zero() {
        let mut w = world();
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 10.0);
        assert!(w.tree.add_general_capacity(rover, -25.0).is_ok());
        let general = w.tree.inventory(rover).map(crate::Inventory::general_capacity);
        assert!(general.is_ok_and(|g| close(g, 0.0)));
        assert!(w.tree.add_general_capacity(rover, f64::INFINITY).is_err());
    }

    #[test]
    fn removing_type_capacity_refreshes_nested_view() {
        let mut w = world();
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 1_000.0);
        let tank = w.unit("tank", UnitKind::Container, 10.0, 0.0);
        assert!(w.tree.add_type_capacity(tank, w.water, 15.0).is_ok());
        assert!(w.tree.store_unit(rover, tank).is_ok());
        let before = w.tree.capacity_of(rover, w.water, Scope::Nested, Freshness::Fresh);
        assert!(before.is_ok_and(|c| close(c, 15.0)));
        assert!(w.tree.remove_type_capacity(tank, w.water, 5.0).is_ok());
        let after = w.tree.capacity_of(rover, w.water, Scope::Nested, Freshness::Fresh);
        assert!(after.is_ok_and(|c| close(c, 10.0)));
    }
}
