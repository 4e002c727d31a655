//! The resource catalog.
//!
//! A [`ResourceRegistry`] maps dense [`ResourceId`]s to immutable
//! [`ResourceDescriptor`]s. It is built once with a [`RegistryBuilder`] before
//! any inventory exists and is shared read-only (behind an `Arc`) by every
//! inventory in a [`ContainmentTree`](crate::ContainmentTree). Hot paths use
//! ids; names are only resolved at the edges (configuration, logs).

use std::collections::BTreeMap;

use stowage_types::{PhaseClass, ResourceClass, ResourceDescriptor, ResourceId, ResourceKind};

use crate::error::InventoryError;

/// Immutable catalog of every resource in a simulation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceRegistry {
    /// Descriptors indexed by `ResourceId`.
    descriptors: Vec<ResourceDescriptor>,
    /// Lowercase name to id.
    by_name: BTreeMap<String, ResourceId>,
}

impl ResourceRegistry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Number of registered resources.
    pub const fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no resources are registered.
    pub const fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Look up a descriptor, `None` if the id is not registered.
    pub fn get(&self, id: ResourceId) -> Option<&ResourceDescriptor> {
        id.index().and_then(|idx| self.descriptors.get(idx))
    }

    /// Look up a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UnknownResource`] if the id is not registered.
    pub fn descriptor(&self, id: ResourceId) -> Result<&ResourceDescriptor, InventoryError> {
        self.get(id).ok_or(InventoryError::UnknownResource(id))
    }

    /// Look up a descriptor and require a specific kind.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UnknownResource`] or
    /// [`InventoryError::WrongResourceKind`].
    pub fn expect_kind(
        &self,
        id: ResourceId,
        expected: ResourceKind,
    ) -> Result<&ResourceDescriptor, InventoryError> {
        let descriptor = self.descriptor(id)?;
        if descriptor.kind() != expected {
            return Err(InventoryError::WrongResourceKind {
                resource: id,
                expected,
            });
        }
        Ok(descriptor)
    }

    /// Resolve a resource by name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<ResourceId> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    /// Resolve a resource by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UnknownResourceName`] if nothing matches.
    pub fn resolve(&self, name: &str) -> Result<ResourceId, InventoryError> {
        self.find(name)
            .ok_or_else(|| InventoryError::UnknownResourceName(name.to_owned()))
    }

    /// Display name of a resource, `"?"` for unknown ids.
    pub fn name_of(&self, id: ResourceId) -> &str {
        self.get(id).map_or("?", |d| d.name.as_str())
    }

    /// Iterate every descriptor in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.iter()
    }

    /// Iterate every registered id in order.
    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.descriptors.iter().map(|d| d.id)
    }

    /// Iterate the bulk resources that draw on a phase capacity pool.
    pub fn phase_members(&self, phase: PhaseClass) -> impl Iterator<Item = ResourceId> + '_ {
        self.descriptors
            .iter()
            .filter(move |d| d.phase() == Some(phase))
            .map(|d| d.id)
    }
}

/// Builder assigning dense ids in registration order.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: ResourceRegistry,
}

impl RegistryBuilder {
    /// Register a bulk resource of the given phase class.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::DuplicateResource`] if the name is taken, or
    /// [`InventoryError::InvalidDescriptor`] if it is empty.
    pub fn bulk(&mut self, name: &str, phase: PhaseClass) -> Result<ResourceId, InventoryError> {
        self.register(name, ResourceClass::Bulk { phase })
    }

    /// Register a discrete part with a fixed mass per part.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::DuplicateResource`] if the name is taken, or
    /// [`InventoryError::InvalidDescriptor`] if the mass is not a positive
    /// finite number.
    pub fn discrete(&mut self, name: &str, mass_per_unit: f64) -> Result<ResourceId, InventoryError> {
        if !mass_per_unit.is_finite() || mass_per_unit <= 0.0 {
            return Err(InventoryError::InvalidDescriptor {
                name: name.to_owned(),
                reason: format!("mass per unit must be positive, got {mass_per_unit}"),
            });
        }
        self.register(name, ResourceClass::Discrete { mass_per_unit })
    }

    /// Finish building.
    pub fn build(self) -> ResourceRegistry {
        self.registry
    }

    fn register(&mut self, name: &str, class: ResourceClass) -> Result<ResourceId, InventoryError> {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return Err(InventoryError::InvalidDescriptor {
                name: name.to_owned(),
                reason: "name must not be empty".to_owned(),
            });
        }
        if self.registry.by_name.contains_key(&key) {
            return Err(InventoryError::DuplicateResource(key));
        }
        let raw = u32::try_from(self.registry.descriptors.len()).map_err(|_overflow| {
            InventoryError::InvalidDescriptor {
                name: key.clone(),
                reason: "registry is full".to_owned(),
            }
        })?;
        let id = ResourceId(raw);
        self.registry.by_name.insert(key.clone(), id);
        self.registry.descriptors.push(ResourceDescriptor {
            id,
            name: key,
            class,
        });
        Ok(id)
    }
}
