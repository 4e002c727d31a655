//! Resource descriptors.

use serde::{Deserialize, Serialize};

use crate::enums::{PhaseClass, ResourceKind};
use crate::ids::ResourceId;

/// Kind-specific attributes of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceClass {
    /// Fungible material sharing the capacity pool of its phase.
    Bulk {
        /// Phase class whose capacity pool this resource draws on.
        phase: PhaseClass,
    },
    /// Countable part consuming general mass budget.
    Discrete {
        /// Mass of one part (kg).
        mass_per_unit: f64,
    },
}

/// Immutable description of a registered resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Dense registry id.
    pub id: ResourceId,
    /// Unique, case-insensitive name (stored lowercase).
    pub name: String,
    /// Bulk or discrete attributes.
    pub class: ResourceClass,
}

impl ResourceDescriptor {
    /// Return whether this resource is bulk or discrete.
    pub const fn kind(&self) -> ResourceKind {
        match self.class {
            ResourceClass::Bulk { .. } => ResourceKind::Bulk,
            ResourceClass::Discrete { .. } => ResourceKind::Discrete,
        }
    }

    /// Phase class of a bulk resource, `None` for discrete parts.
    pub const fn phase(&self) -> Option<PhaseClass> {
        match self.class {
            ResourceClass::Bulk { phase } => Some(phase),
            ResourceClass::Discrete { .. } => None,
        }
    }

    /// Mass per part of a discrete resource, `None` for bulk resources.
    pub const fn mass_per_unit(&self) -> Option<f64> {
        match self.class {
            ResourceClass::Bulk { .. } => None,
            ResourceClass::Discrete { mass_per_unit } => Some(mass_per_unit),
        }
    }
}
