//! Notifications fired after successful inventory mutations.
//!
//! Events are fire-and-forget: observers (UI, event log) react to them,
//! but nothing in the engine's correctness depends on their delivery.

use serde::{Deserialize, Serialize};

use crate::ids::{ResourceId, UnitId};

/// What changed in a unit's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnitEventKind {
    /// A bulk resource amount was stored.
    ResourceStored {
        /// The stored resource.
        resource: ResourceId,
        /// Amount stored (kg).
        amount: f64,
    },
    /// A bulk resource amount was retrieved.
    ResourceRetrieved {
        /// The retrieved resource.
        resource: ResourceId,
        /// Amount retrieved (kg).
        amount: f64,
    },
    /// Discrete parts were stored.
    ItemsStored {
        /// The stored part.
        resource: ResourceId,
        /// Number of parts stored.
        count: u32,
    },
    /// Discrete parts were retrieved.
    ItemsRetrieved {
        /// The retrieved part.
        resource: ResourceId,
        /// Number of parts retrieved.
        count: u32,
    },
    /// A unit was stored inside this unit.
    UnitStored {
        /// The stored unit.
        unit: UnitId,
    },
    /// A unit was taken out of this unit.
    UnitRetrieved {
        /// The retrieved unit.
        unit: UnitId,
    },
    /// The unit joined the tree as a free-standing root.
    UnitAdded,
    /// The unit's own mass was replaced.
    MassChanged {
        /// New base mass (kg).
        mass: f64,
    },
    /// A capacity grant changed. `None` means general capacity.
    CapacityChanged {
        /// The affected resource, if the change was resource-specific.
        resource: Option<ResourceId>,
    },
}

/// A notification addressed to the unit whose inventory changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEvent {
    /// The unit whose inventory changed.
    pub unit: UnitId,
    /// What changed.
    pub kind: UnitEventKind,
}
