//! Moving whole units in and out of containers.

use stowage_types::{Freshness, ResourceId, UnitEventKind, UnitId};

use super::{ContainmentTree, Entry};
use crate::error::{ContainmentRejection, InventoryError};
use crate::inventory::Inventory;
use crate::store::ResourceStore;
use crate::unit::Unit;

/// Bulk resource moved from a pass-through unit into its new container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Absorption {
    /// The absorbed resource.
    pub resource: ResourceId,
    /// Amount moved (kg).
    pub amount: f64,
}

/// Everything [`ContainmentTree::destroy_unit`] took out of the tree.
#[derive(Debug, Clone)]
pub struct DestroyedUnit {
    /// The removed unit, detached from any container.
    pub unit: Unit,
    /// Its inventory, minus the units that were moved out.
    pub inventory: Inventory,
    /// Per re-homed child, what the former container absorbed from it.
    pub absorbed: Vec<(UnitId, Absorption)>,
}

impl ContainmentTree {
    /// Check whether `unit` could be stored in `container` right now.
    ///
    /// # Errors
    ///
    /// [`InventoryError::UnknownUnit`] for missing ids, otherwise
    /// [`InventoryError::CycleOrCapacity`] with the rejection reason.
    pub fn check_store_unit(&self, container: UnitId, unit: UnitId) -> Result<(), InventoryError> {
        self.entry(container)?;
        let incoming = self.entry(unit)?;
        let reject = |reason| InventoryError::CycleOrCapacity {
            container,
            unit,
            reason,
        };

        if container == unit {
            return Err(reject(ContainmentRejection::SelfReference));
        }
        match incoming.unit.container() {
            Some(current) if current == container => {
                return Err(reject(ContainmentRejection::AlreadyContained));
            }
            Some(other) => return Err(reject(ContainmentRejection::HasOtherContainer(other))),
            None => {}
        }
        if self.ancestor_chain(container).contains(&unit) {
            return Err(reject(ContainmentRejection::Cycle));
        }
        let mass = self.unit_mass(unit, Freshness::Fresh)?;
        let available = self.remaining_general_capacity(container, Freshness::Fresh)?;
        if mass > available + self.epsilon() {
            return Err(reject(ContainmentRejection::InsufficientGeneralCapacity {
                mass,
                available,
            }));
        }
        Ok(())
    }

    /// Non-failing form of [`check_store_unit`](Self::check_store_unit).
    pub fn can_store_unit(&self, container: UnitId, unit: UnitId) -> bool {
        self.check_store_unit(container, unit).is_ok()
    }

    /// Put `unit` inside `container`.
    ///
    /// If the unit is pass-through, bulk resources it holds locally are then
    /// moved into the container's local store as far as it has room; the
    /// rest stays. The moved amounts are returned.
    pub fn store_unit(
        &mut self,
        container: UnitId,
        unit: UnitId,
    ) -> Result<Vec<Absorption>, InventoryError> {
        self.check_store_unit(container, unit)?;
        self.entry_mut(container)?.inventory.contained.push(unit);
        self.entry_mut(unit)?.unit.set_container(Some(container));
        self.invalidate_everything(container);
        self.emit(container, UnitEventKind::UnitStored { unit });
        tracing::debug!(container = %container, unit = %unit, "unit stored");

        if self.entry(unit)?.unit.pass_through {
            Ok(self.absorb(container, unit))
        } else {
            Ok(Vec::new())
        }
    }

    fn absorb(&mut self, container: UnitId, unit: UnitId) -> Vec<Absorption> {
        let eps = self.epsilon();
        let held: Vec<(ResourceId, f64)> = self
            .entries
            .get(&unit)
            .map(|entry| {
                entry
                    .inventory
                    .store
                    .stored_amounts()
                    .iter()
                    .map(|(resource, amount)| (*resource, *amount))
                    .collect()
            })
            .unwrap_or_default();

        let mut absorbed = Vec::new();
        for (resource, amount) in held {
            let room = self
                .entries
                .get(&container)
                .map_or(0.0, |entry| entry.inventory.store.remaining(&self.registry, resource));
            let moving = amount.min(room);
            if moving <= eps {
                continue;
            }
            if let Err(err) = self.retrieve_local(unit, resource, moving) {
                tracing::warn!(unit = %unit, error = %err, "absorption skipped");
                continue;
            }
            if let Err(err) = self.store_local(container, resource, moving) {
                tracing::warn!(container = %container, error = %err, "absorption failed, returning to unit");
                if let Err(err) = self.store_local(unit, resource, moving) {
                    tracing::warn!(unit = %unit, error = %err, "could not return absorbed amount");
                }
                continue;
            }
            absorbed.push(Absorption {
                resource,
                amount: moving,
            });
        }
        if !absorbed.is_empty() {
            tracing::debug!(container = %container, unit = %unit, count = absorbed.len(), "resources absorbed");
        }
        absorbed
    }

    /// Take `unit` out of `container`, leaving it as a free-standing root.
    pub fn retrieve_unit(&mut self, container: UnitId, unit: UnitId) -> Result<(), InventoryError> {
        self.entry(unit)?;
        let entry = self.entry_mut(container)?;
        if !entry.inventory.contained.contains(&unit) {
            return Err(InventoryError::NotContained { container, unit });
        }
        entry.inventory.contained.retain(|id| *id != unit);
        self.entry_mut(unit)?.unit.set_container(None);
        self.invalidate_everything(container);
        self.emit(container, UnitEventKind::UnitRetrieved { unit });
        tracing::debug!(container = %container, unit = %unit, "unit retrieved");
        Ok(())
    }

    /// Remove a unit from the tree.
    ///
    /// The unit is first taken out of its container. Units it contains are
    /// moved to that former container when they fit; otherwise they are
    /// released as roots. Pass-through children moved up may have resources
    /// absorbed by the former container; those moves are reported with the
    /// removed unit and its inventory.
    pub fn destroy_unit(&mut self, id: UnitId) -> Result<DestroyedUnit, InventoryError> {
        let parent = self.entry(id)?.unit.container();
        if let Some(parent) = parent {
            self.retrieve_unit(parent, id)?;
        }
        let children = self.entry(id)?.inventory.contained.clone();
        let mut absorbed = Vec::new();
        for child in children {
            self.retrieve_unit(id, child)?;
            let Some(parent) = parent else {
                continue;
            };
            match self.store_unit(parent, child) {
                Ok(moved) => absorbed.extend(moved.into_iter().map(|absorption| (child, absorption))),
                Err(err) => tracing::warn!(unit = %child, error = %err, "orphan released as root"),
            }
        }
        let Entry { unit, inventory } = self
            .entries
            .remove(&id)
            .ok_or(InventoryError::UnknownUnit(id))?;
        tracing::debug!(unit = %id, name = %unit.name, absorbed = absorbed.len(), "unit destroyed");
        Ok(DestroyedUnit {
            unit,
            inventory,
            absorbed,
        })
    }

    /// Add `owner` as a root whose inventory has the same capacities as
    /// `template`'s (type, phase and general) but no contents.
    pub fn clone_template(&mut self, template: UnitId, owner: Unit) -> Result<UnitId, InventoryError> {
        let source = self.inventory(template)?;
        let store = ResourceStore::from_parts(
            source.store.type_capacities().clone(),
            source.store.phase_capacities().clone(),
            std::collections::BTreeMap::new(),
            std::collections::BTreeMap::new(),
        );
        let general = source.general_capacity;
        let id = self.add_unit(owner)?;
        let entry = self.entry_mut(id)?;
        entry.inventory.store = store;
        entry.inventory.general_capacity = general;
        self.emit(id, UnitEventKind::CapacityChanged { resource: None });
        tracing::debug!(template = %template, unit = %id, "inventory cloned from template");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use stowage_types::{Freshness, Scope, UnitKind};

    use super::super::fixtures::{close, world};
    use crate::error::{ContainmentRejection, InventoryError};
    use crate::unit::Unit;

    fn rejection(result: Result<Vec<super::Absorption>, InventoryError>) -> Option<ContainmentRejection> {
        match result {
            Err(InventoryError::CycleOrCapacity { reason, .. }) => Some(reason),
            _ => None,
        }
    }

    #[test]
    fn rejects_self_duplicates_and_cycles() {
        let mut w = world();
        let a = w.unit("a", UnitKind::Container, 1.0, 100.0);
        let b = w.unit("b", UnitKind::Container, 1.0, 100.0);
        let c = w.unit("c", UnitKind::Container, 1.0, 100.0);

        assert_eq!(rejection(w.tree.store_unit(a, a)), Some(ContainmentRejection::SelfReference));
        assert!(w.tree.store_unit(a, b).is_ok());
        assert_eq!(rejection(w.tree.store_unit(a, b)), Some(ContainmentRejection::AlreadyContained));
        assert_eq!(rejection(w.tree.store_unit(b, a)), Some(ContainmentRejection::Cycle));
        assert!(w.tree.store_unit(b, c).is_ok());
        assert_eq!(rejection(w.tree.store_unit(c, a)), Some(ContainmentRejection::Cycle));
        assert_eq!(rejection(w.tree.store_unit(a, c)), Some(ContainmentRejection::HasOtherContainer(b)));
    }

    #[test]
    fn heavy_unit_needs_general_capacity() {
        let mut w = world();
        let base = w.unit("base", UnitKind::Settlement, 0.0, 100.0);
        let rover = w.unit("heavy rover", UnitKind::Vehicle, 150.0, 0.0);
        assert!(matches!(
            rejection(w.tree.store_unit(base, rover)),
            Some(ContainmentRejection::InsufficientGeneralCapacity { .. })
        ));
        assert!(!w.tree.can_store_unit(base, rover));
        assert!(w.tree.set_base_mass(rover, 50.0).is_ok());
        assert!(w.tree.can_store_unit(base, rover));
        assert!(w.tree.store_unit(base, rover).is_ok());
    }

    #[test]
    fn retrieve_unit_requires_direct_containment() {
        let mut w = world();
        let base = w.unit("base", UnitKind::Settlement, 0.0, 1_000.0);
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 100.0);
        let bag = w.unit("bag", UnitKind::Container, 1.0, 0.0);
        assert!(w.tree.store_unit(base, rover).is_ok());
        assert!(w.tree.store_unit(rover, bag).is_ok());
        assert!(matches!(
            w.tree.retrieve_unit(base, bag),
            Err(InventoryError::NotContained { .. })
        ));
        assert!(w.tree.retrieve_unit(rover, bag).is_ok());
        assert_eq!(w.tree.container_of(bag).ok(), Some(None));
    }

    #[test]
    fn pass_through_units_are_absorbed_up_to_room() {
        let mut w = world();
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 100.0);
        let suit = w.unit("suit", UnitKind::EvaSuit, 40.0, 0.0);
        assert!(w.tree.add_type_capacity(rover, w.oxygen, 3.0).is_ok());
        assert!(w.tree.add_type_capacity(suit, w.oxygen, 5.0).is_ok());
        assert!(w.tree.store(suit, w.oxygen, 5.0, Scope::Local).is_ok());

        let absorbed = w.tree.store_unit(rover, suit).unwrap_or_default();
        assert_eq!(absorbed.len(), 1);
        assert!(absorbed.iter().all(|a| a.resource == w.oxygen && close(a.amount, 3.0)));
        let rover_local = w.tree.stored_of(rover, w.oxygen, Scope::Local, Freshness::Fresh);
        let suit_local = w.tree.stored_of(suit, w.oxygen, Scope::Local, Freshness::Fresh);
        assert!(rover_local.is_ok_and(|s| close(s, 3.0)));
        assert!(suit_local.is_ok_and(|s| close(s, 2.0)));
        let total = w.tree.stored_of(rover, w.oxygen, Scope::Nested, Freshness::Fresh);
        assert!(total.is_ok_and(|s| close(s, 5.0)));
    }

    #[test]
    fn destroy_reparents_children() {
        let mut w = world();
        let base = w.unit("base", UnitKind::Settlement, 0.0, 10_000.0);
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 100.0);
        let bag = w.unit("bag", UnitKind::Container, 1.0, 0.0);
        assert!(w.tree.store_unit(base, rover).is_ok());
        assert!(w.tree.store_unit(rover, bag).is_ok());

        let destroyed = w.tree.destroy_unit(rover);
        assert!(destroyed.is_ok_and(|d| d.unit.id == rover && d.unit.container().is_none() && d.absorbed.is_empty()));
        assert_eq!(w.tree.container_of(bag).ok(), Some(Some(base)));
        assert_eq!(w.tree.contained_units(base).ok(), Some(&[bag][..]));
        assert!(w.tree.unit(rover).is_err());
        let mass = w.tree.unit_mass(base, Freshness::Fresh);
        assert!(mass.is_ok_and(|m| close(m, 1.0)));
    }

    #[test]
    fn destroy_reports_what_the_grandparent_absorbed() {
        let mut w = world();
        let base = w.unit("base", UnitKind::Settlement, 0.0, 10_000.0);
        let rover = w.unit("rover", UnitKind::Vehicle, 500.0, 100.0);
        let suit = w.unit("suit", UnitKind::EvaSuit, 40.0, 0.0);
        assert!(w.tree.add_type_capacity(base, w.oxygen, 10.0).is_ok());
        assert!(w.tree.add_type_capacity(suit, w.oxygen, 5.0).is_ok());
        assert!(w.tree.store_unit(base, rover).is_ok());
        // The rover has no oxygen room, so nothing is absorbed on the way in.
        assert!(w.tree.store_unit(rover, suit).is_ok_and(|moved| moved.is_empty()));
        assert!(w.tree.store(suit, w.oxygen, 4.0, Scope::Local).is_ok());

        let destroyed = w.tree.destroy_unit(rover);
        let absorbed = destroyed.map(|d| d.absorbed).unwrap_or_default();
        assert_eq!(absorbed.len(), 1);
        assert!(absorbed
            .iter()
            .all(|(child, a)| *child == suit && a.resource == w.oxygen && close(a.amount, 4.0)));
        let base_local = w.tree.stored_of(base, w.oxygen, Scope::Local, Freshness::Fresh);
        let suit_local = w.tree.stored_of(suit, w.oxygen, Scope::Local, Freshness::Fresh);
        assert!(base_local.is_ok_and(|s| close(s, 4.0)));
        assert!(suit_local.is_ok_and(|s| close(s, 0.0)));
    }

    #[test]
    fn clone_template_copies_capacity_only() {
        let mut w = world();
        let tank = w.unit("tank", UnitKind::Container, 10.0, 7.0);
        assert!(w.tree.add_type_capacity(tank, w.water, 15.0).is_ok());
        assert!(w.tree.store(tank, w.water, 5.0, Scope::Local).is_ok());

        let copy = w.tree.clone_template(tank, Unit::new("tank 2", UnitKind::Container, 10.0));
        assert!(copy.is_ok());
        let copy = copy.unwrap_or(tank);
        let cap = w.tree.capacity_of(copy, w.water, Scope::Local, Freshness::Fresh);
        assert!(cap.is_ok_and(|c| close(c, 15.0)));
        let stored = w.tree.stored_of(copy, w.water, Scope::Local, Freshness::Fresh);
        assert!(stored.is_ok_and(|s| close(s, 0.0)));
        let general = w.tree.remaining_general_capacity(copy, Freshness::Fresh);
        assert!(general.is_ok_and(|g| close(g, 7.0)));
    }
}
