//! A single container's local resource ledger.
//!
//! [`ResourceStore`] holds per-resource capacity grants, a phase-class
//! capacity pool, bulk amounts, and discrete part counts for one inventory.
//! It knows nothing about nesting: the owning inventory decides how much
//! general mass budget discrete parts may use and handles cache invalidation.
//!
//! Entries are created on first store and removed (not zeroed) when the
//! quantity returns to zero, so enumerating present resources stays cheap.

use std::collections::BTreeMap;

use stowage_types::{PhaseClass, ResourceId, ResourceKind};

use crate::error::InventoryError;
use crate::registry::ResourceRegistry;

/// Local capacity and contents of one inventory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceStore {
    /// Explicit capacity grants for a specific bulk resource (kg).
    type_capacity: BTreeMap<ResourceId, f64>,
    /// Capacity shared by every bulk resource of a phase class (kg).
    phase_capacity: BTreeMap<PhaseClass, f64>,
    /// Bulk quantities held locally (kg).
    stored: BTreeMap<ResourceId, f64>,
    /// Discrete part counts held locally.
    item_counts: BTreeMap<ResourceId, u32>,
}

/// Reject negative, NaN and infinite amounts.
pub(crate) fn check_amount(amount: f64) -> Result<(), InventoryError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(InventoryError::InvalidAmount { amount })
    }
}

impl ResourceStore {
    /// Create an empty store with no capacity.
    pub const fn new() -> Self {
        Self {
            type_capacity: BTreeMap::new(),
            phase_capacity: BTreeMap::new(),
            stored: BTreeMap::new(),
            item_counts: BTreeMap::new(),
        }
    }

    /// Rebuild a store from previously captured parts.
    pub(crate) const fn from_parts(
        type_capacity: BTreeMap<ResourceId, f64>,
        phase_capacity: BTreeMap<PhaseClass, f64>,
        stored: BTreeMap<ResourceId, f64>,
        item_counts: BTreeMap<ResourceId, u32>,
    ) -> Self {
        Self {
            type_capacity,
            phase_capacity,
            stored,
            item_counts,
        }
    }

    // -----------------------------------------------------------------------
    // Bulk queries
    // -----------------------------------------------------------------------

    /// Local capacity for a bulk resource: its type grant plus whatever of
    /// its phase pool the other members of that phase have not drawn.
    /// Unknown and discrete ids have zero capacity.
    pub fn capacity(&self, registry: &ResourceRegistry, resource: ResourceId) -> f64 {
        let typed = self.type_grant(resource);
        let pooled = registry
            .get(resource)
            .and_then(stowage_types::ResourceDescriptor::phase)
            .map_or(0.0, |phase| {
                let pool = self.phase_capacity.get(&phase).copied().unwrap_or(0.0);
                (pool - self.pool_draw(registry, phase, Some(resource))).max(0.0)
            });
        typed + pooled
    }

    fn type_grant(&self, resource: ResourceId) -> f64 {
        self.type_capacity.get(&resource).copied().unwrap_or(0.0)
    }

    /// Amount of the `phase` pool in use: every member's stored amount
    /// above its own type grant, skipping `except`.
    pub fn pool_draw(
        &self,
        registry: &ResourceRegistry,
        phase: PhaseClass,
        except: Option<ResourceId>,
    ) -> f64 {
        self.stored
            .iter()
            .filter(|(id, _)| Some(**id) != except)
            .filter(|(id, _)| {
                registry.get(**id).and_then(stowage_types::ResourceDescriptor::phase) == Some(phase)
            })
            .map(|(id, amount)| (amount - self.type_grant(*id)).max(0.0))
            .sum()
    }

    /// Amount of a bulk resource held locally (kg).
    pub fn stored(&self, resource: ResourceId) -> f64 {
        self.stored.get(&resource).copied().unwrap_or(0.0)
    }

    /// Local capacity minus local stored amount, never negative.
    pub fn remaining(&self, registry: &ResourceRegistry, resource: ResourceId) -> f64 {
        (self.capacity(registry, resource) - self.stored(resource)).max(0.0)
    }

    /// Total bulk mass held locally (kg).
    pub fn bulk_mass(&self) -> f64 {
        self.stored.values().sum()
    }

    /// Bulk resources currently present.
    pub fn stored_resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.stored.keys().copied()
    }

    // -----------------------------------------------------------------------
    // Bulk mutations
    // -----------------------------------------------------------------------

    /// Add a bulk amount.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::CapacityExceeded`] if `amount` exceeds the
    /// local remaining capacity by more than `epsilon`, plus the usual
    /// validation errors for unknown, discrete or invalid inputs.
    pub fn store(
        &mut self,
        registry: &ResourceRegistry,
        resource: ResourceId,
        amount: f64,
        epsilon: f64,
    ) -> Result<(), InventoryError> {
        check_amount(amount)?;
        registry.expect_kind(resource, ResourceKind::Bulk)?;
        let available = self.remaining(registry, resource);
        if amount > available + epsilon {
            return Err(InventoryError::CapacityExceeded {
                resource,
                requested: amount,
                available,
            });
        }
        if amount > 0.0 {
            *self.stored.entry(resource).or_insert(0.0) += amount;
        }
        Ok(())
    }

    /// Remove a bulk amount. A result at or below `epsilon` removes the entry.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InsufficientStock`] if `amount` exceeds the
    /// stored amount by more than `epsilon`.
    pub fn retrieve(
        &mut self,
        resource: ResourceId,
        amount: f64,
        epsilon: f64,
    ) -> Result<(), InventoryError> {
        check_amount(amount)?;
        let available = self.stored(resource);
        if amount > available + epsilon {
            return Err(InventoryError::InsufficientStock {
                resource,
                requested: amount,
                available,
            });
        }
        let left = available - amount;
        if left <= epsilon {
            self.stored.remove(&resource);
        } else {
            self.stored.insert(resource, left);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Discrete parts
    // -----------------------------------------------------------------------

    /// Number of parts held locally.
    pub fn item_count(&self, resource: ResourceId) -> u32 {
        self.item_counts.get(&resource).copied().unwrap_or(0)
    }

    /// Total mass of the parts held locally (kg).
    pub fn item_mass(&self, registry: &ResourceRegistry) -> f64 {
        self.item_counts
            .iter()
            .map(|(id, count)| {
                registry
                    .get(*id)
                    .and_then(stowage_types::ResourceDescriptor::mass_per_unit)
                    .map_or(0.0, |mass| mass * f64::from(*count))
            })
            .sum()
    }

    /// Parts currently present.
    pub fn item_resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.item_counts.keys().copied()
    }

    /// Add parts. Parts consume the owning inventory's general mass budget,
    /// which the caller passes in as `available_mass`.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::CapacityExceeded`] if the parts' mass
    /// exceeds `available_mass`, [`InventoryError::CountOverflow`] if the
    /// count overflows, or [`InventoryError::WrongResourceKind`] for bulk ids.
    pub fn store_items(
        &mut self,
        registry: &ResourceRegistry,
        resource: ResourceId,
        count: u32,
        available_mass: f64,
        epsilon: f64,
    ) -> Result<(), InventoryError> {
        let descriptor = registry.expect_kind(resource, ResourceKind::Discrete)?;
        let mass = descriptor.mass_per_unit().unwrap_or(0.0) * f64::from(count);
        if mass > available_mass + epsilon {
            return Err(InventoryError::CapacityExceeded {
                resource,
                requested: mass,
                available: available_mass,
            });
        }
        if count == 0 {
            return Ok(());
        }
        let total = self
            .item_count(resource)
            .checked_add(count)
            .ok_or(InventoryError::CountOverflow { resource })?;
        self.item_counts.insert(resource, total);
        Ok(())
    }

    /// Remove parts. The entry is removed when the count reaches zero.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InsufficientStock`] if fewer parts are held.
    pub fn retrieve_items(&mut self, resource: ResourceId, count: u32) -> Result<(), InventoryError> {
        let held = self.item_count(resource);
        let left = held
            .checked_sub(count)
            .ok_or(InventoryError::InsufficientStock {
                resource,
                requested: f64::from(count),
                available: f64::from(held),
            })?;
        if left == 0 {
            self.item_counts.remove(&resource);
        } else {
            self.item_counts.insert(resource, left);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Capacity grants
    // -----------------------------------------------------------------------

    /// Grant capacity for one bulk resource.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidAmount`] for negative or non-finite
    /// amounts.
    pub fn add_type_capacity(&mut self, resource: ResourceId, amount: f64) -> Result<(), InventoryError> {
        check_amount(amount)?;
        *self.type_capacity.entry(resource).or_insert(0.0) += amount;
        Ok(())
    }

    /// Withdraw capacity for one bulk resource, flooring at zero.
    ///
    /// Dropping capacity below the stored amount is allowed here; callers
    /// that care must check first.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidAmount`] for negative or non-finite
    /// amounts.
    pub fn remove_type_capacity(
        &mut self,
        resource: ResourceId,
        amount: f64,
        epsilon: f64,
    ) -> Result<(), InventoryError> {
        check_amount(amount)?;
        let left = self.type_grant(resource) - amount;
        if left <= epsilon {
            self.type_capacity.remove(&resource);
        } else {
            self.type_capacity.insert(resource, left);
        }
        Ok(())
    }

    /// Grant capacity to a phase-class pool.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidAmount`] for negative or non-finite
    /// amounts.
    pub fn add_phase_capacity(&mut self, phase: PhaseClass, amount: f64) -> Result<(), InventoryError> {
        check_amount(amount)?;
        *self.phase_capacity.entry(phase).or_insert(0.0) += amount;
        Ok(())
    }

    /// Withdraw capacity from a phase-class pool, flooring at zero.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidAmount`] for negative or non-finite
    /// amounts.
    pub fn remove_phase_capacity(
        &mut self,
        phase: PhaseClass,
        amount: f64,
        epsilon: f64,
    ) -> Result<(), InventoryError> {
        check_amount(amount)?;
        let left = self.phase_capacity.get(&phase).copied().unwrap_or(0.0) - amount;
        if left <= epsilon {
            self.phase_capacity.remove(&phase);
        } else {
            self.phase_capacity.insert(phase, left);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Raw views for serializers
    // -----------------------------------------------------------------------

    /// Type capacity grants.
    pub const fn type_capacities(&self) -> &BTreeMap<ResourceId, f64> {
        &self.type_capacity
    }

    /// Phase capacity pools.
    pub const fn phase_capacities(&self) -> &BTreeMap<PhaseClass, f64> {
        &self.phase_capacity
    }

    /// Bulk quantities.
    pub const fn stored_amounts(&self) -> &BTreeMap<ResourceId, f64> {
        &self.stored
    }

    /// Part counts.
    pub const fn item_counts(&self) -> &BTreeMap<ResourceId, u32> {
        &self.item_counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-7;

    struct Fixture {
        registry: ResourceRegistry,
        oxygen: ResourceId,
        nitrogen: ResourceId,
        ice: ResourceId,
        wrench: ResourceId,
    }

    fn fixture() -> Fixture {
        let mut builder = ResourceRegistry::builder();
        let oxygen = builder.bulk("oxygen", PhaseClass::Gas).unwrap_or(ResourceId(90));
        let nitrogen = builder.bulk("nitrogen", PhaseClass::Gas).unwrap_or(ResourceId(91));
        let ice = builder.bulk("ice", PhaseClass::Solid).unwrap_or(ResourceId(92));
        let wrench = builder.discrete("wrench", 2.0).unwrap_or(ResourceId(93));
        Fixture {
            registry: builder.build(),
            oxygen,
            nitrogen,
            ice,
            wrench,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn capacity_combines_type_and_phase() {
        let f = fixture();
        let mut store = ResourceStore::new();
        assert!(store.add_type_capacity(f.oxygen, 1.0).is_ok());
        assert!(store.add_phase_capacity(PhaseClass::Gas, 4.0).is_ok());
        assert!(close(store.capacity(&f.registry, f.oxygen), 5.0));
        assert!(close(store.capacity(&f.registry, f.nitrogen), 4.0));
        assert!(close(store.capacity(&f.registry, f.ice), 0.0));
    }

    #[test]
    fn phase_pool_is_shared_between_members() {
        let f = fixture();
        let mut store = ResourceStore::new();
        assert!(store.add_phase_capacity(PhaseClass::Gas, 4.0).is_ok());
        assert!(store.store(&f.registry, f.oxygen, 3.0, EPS).is_ok());
        assert!(close(store.remaining(&f.registry, f.nitrogen), 1.0));
        assert!(matches!(
            store.store(&f.registry, f.nitrogen, 4.0, EPS),
            Err(InventoryError::CapacityExceeded { .. })
        ));
        assert!(store.store(&f.registry, f.nitrogen, 1.0, EPS).is_ok());
        assert!(close(store.remaining(&f.registry, f.oxygen), 0.0));
        assert!(close(store.pool_draw(&f.registry, PhaseClass::Gas, None), 4.0));
    }

    #[test]
    fn type_grant_is_used_before_the_pool() {
        let f = fixture();
        let mut store = ResourceStore::new();
        assert!(store.add_type_capacity(f.oxygen, 2.0).is_ok());
        assert!(store.add_phase_capacity(PhaseClass::Gas, 4.0).is_ok());
        assert!(store.store(&f.registry, f.oxygen, 3.0, EPS).is_ok());
        // Two of the three kilograms sit in the oxygen grant, one in the pool.
        assert!(close(store.capacity(&f.registry, f.nitrogen), 3.0));
        assert!(close(store.remaining(&f.registry, f.oxygen), 3.0));
        // Other phases are untouched.
        assert!(close(store.capacity(&f.registry, f.ice), 0.0));
    }

    #[test]
    fn unknown_resource_has_zero_capacity() {
        let f = fixture();
        let store = ResourceStore::new();
        assert!(close(store.capacity(&f.registry, ResourceId(77)), 0.0));
        assert!(close(store.stored(ResourceId(77)), 0.0));
    }

    #[test]
    fn store_and_retrieve_to_zero_removes_entry() {
        let f = fixture();
        let mut store = ResourceStore::new();
        assert!(store.add_type_capacity(f.oxygen, 1.0).is_ok());
        assert!(store.store(&f.registry, f.oxygen, 1.0, EPS).is_ok());
        assert!(matches!(
            store.store(&f.registry, f.oxygen, 0.01, EPS),
            Err(InventoryError::CapacityExceeded { .. })
        ));
        assert!(store.retrieve(f.oxygen, 1.0, EPS).is_ok());
        assert!(close(store.stored(f.oxygen), 0.0));
        assert!(!store.stored_amounts().contains_key(&f.oxygen));
    }

    #[test]
    fn drift_within_epsilon_is_absorbed() {
        let f = fixture();
        let mut store = ResourceStore::new();
        assert!(store.add_type_capacity(f.oxygen, 0.3).is_ok());
        assert!(store.store(&f.registry, f.oxygen, 0.1, EPS).is_ok());
        assert!(store.store(&f.registry, f.oxygen, 0.2, EPS).is_ok());
        // 0.1 + 0.2 is not exactly 0.3 in binary floating point.
        assert!(store.retrieve(f.oxygen, 0.3, EPS).is_ok());
        assert!(store.stored_amounts().is_empty());
    }

    #[test]
    fn over_retrieve_is_rejected_without_change() {
        let f = fixture();
        let mut store = ResourceStore::new();
        assert!(store.add_type_capacity(f.oxygen, 2.0).is_ok());
        assert!(store.store(&f.registry, f.oxygen, 1.0, EPS).is_ok());
        assert!(matches!(
            store.retrieve(f.oxygen, 1.5, EPS),
            Err(InventoryError::InsufficientStock { .. })
        ));
        assert!(close(store.stored(f.oxygen), 1.0));
    }

    #[test]
    fn negative_and_nan_amounts_are_rejected() {
        let f = fixture();
        let mut store = ResourceStore::new();
        assert!(matches!(
            store.store(&f.registry, f.oxygen, -1.0, EPS),
            Err(InventoryError::InvalidAmount { .. })
        ));
        assert!(store.retrieve(f.oxygen, f64::NAN, EPS).is_err());
    }

    #[test]
    fn bulk_operations_reject_parts() {
        let f = fixture();
        let mut store = ResourceStore::new();
        assert!(matches!(
            store.store(&f.registry, f.wrench, 1.0, EPS),
            Err(InventoryError::WrongResourceKind { .. })
        ));
    }

    #[test]
    fn items_are_bounded_by_available_mass() {
        let f = fixture();
        let mut store = ResourceStore::new();
        assert!(store.store_items(&f.registry, f.wrench, 3, 6.0, EPS).is_ok());
        assert_eq!(store.item_count(f.wrench), 3);
        assert!(close(store.item_mass(&f.registry), 6.0));
        assert!(matches!(
            store.store_items(&f.registry, f.wrench, 1, 1.0, EPS),
            Err(InventoryError::CapacityExceeded { .. })
        ));
        assert!(store.retrieve_items(f.wrench, 3).is_ok());
        assert!(store.item_counts().is_empty());
        assert!(store.retrieve_items(f.wrench, 1).is_err());
    }

    #[test]
    fn removing_capacity_below_stored_is_allowed() {
        let f = fixture();
        let mut store = ResourceStore::new();
        assert!(store.add_type_capacity(f.ice, 10.0).is_ok());
        assert!(store.store(&f.registry, f.ice, 8.0, EPS).is_ok());
        assert!(store.remove_type_capacity(f.ice, 5.0, EPS).is_ok());
        assert!(close(store.capacity(&f.registry, f.ice), 5.0));
        assert!(close(store.remaining(&f.registry, f.ice), 0.0));
        assert!(store.remove_type_capacity(f.ice, 50.0, EPS).is_ok());
        assert!(store.type_capacities().is_empty());
    }
}
