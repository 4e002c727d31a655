//! Error types for the `stowage-inventory` crate.
//!
//! Every fallible engine operation reports a typed [`InventoryError`] to its
//! immediate caller. The engine never retries internally. Multi-container
//! store and retrieve are not atomic: the `StorageExceeded` and
//! `RetrievalExceeded` variants are returned *after* partial mutations have
//! already been applied, and carry the amount that could not be moved.

use stowage_types::{ResourceId, ResourceKind, UnitId};

/// Why a unit could not be stored inside another unit.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainmentRejection {
    /// A unit cannot contain itself.
    SelfReference,
    /// The unit already contains the container, directly or transitively.
    Cycle,
    /// The unit is already directly contained here.
    AlreadyContained,
    /// The unit is held by a different container.
    HasOtherContainer(UnitId),
    /// The unit's mass exceeds the container's remaining general capacity.
    InsufficientGeneralCapacity {
        /// Mass of the unit being stored (kg).
        mass: f64,
        /// Remaining general capacity of the container (kg).
        available: f64,
    },
}

impl core::fmt::Display for ContainmentRejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SelfReference => f.write_str("unit cannot contain itself"),
            Self::Cycle => f.write_str("unit already contains the container"),
            Self::AlreadyContained => f.write_str("unit is already contained here"),
            Self::HasOtherContainer(other) => write!(f, "unit is held by {other}"),
            Self::InsufficientGeneralCapacity { mass, available } => write!(
                f,
                "unit mass {mass} kg exceeds remaining general capacity {available} kg"
            ),
        }
    }
}

/// Errors that can occur during inventory operations.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// A store was rejected up front: not enough capacity for the scope.
    #[error("capacity exceeded: storing {requested} of {resource} but only {available} available")]
    CapacityExceeded {
        /// The resource being stored.
        resource: ResourceId,
        /// The amount the caller attempted to store.
        requested: f64,
        /// The remaining capacity at the time of the check.
        available: f64,
    },

    /// A store was only partially applied. The stored part is kept.
    #[error("storage exceeded: {remainder} of {requested} {resource} could not be stored")]
    StorageExceeded {
        /// The resource being stored.
        resource: ResourceId,
        /// The amount the caller attempted to store.
        requested: f64,
        /// The amount left over after exhausting local and nested capacity.
        remainder: f64,
    },

    /// A retrieval was rejected up front: not enough stock.
    #[error("insufficient stock: wanted {requested} of {resource} but only {available} stored")]
    InsufficientStock {
        /// The resource being retrieved.
        resource: ResourceId,
        /// The amount the caller attempted to retrieve.
        requested: f64,
        /// The amount stored at the time of the check.
        available: f64,
    },

    /// A retrieval was only partially applied. The retrieved part is gone.
    #[error("retrieval exceeded: {remainder} of {requested} {resource} could not be retrieved")]
    RetrievalExceeded {
        /// The resource being retrieved.
        resource: ResourceId,
        /// The amount the caller attempted to retrieve.
        requested: f64,
        /// The amount that could not be found in the subtree.
        remainder: f64,
    },

    /// A transfer failed part way and the unmoved amount could not be put
    /// back into the source. `stranded` has left the source and is not
    /// stored anywhere; `moved` reached the destination.
    #[error("transfer of {resource} from {from} stranded {stranded} (moved {moved}): {cause}")]
    TransferStranded {
        /// The resource being transferred.
        resource: ResourceId,
        /// The source unit.
        from: UnitId,
        /// Amount that reached the destination.
        moved: f64,
        /// Amount removed from the source that could not be returned.
        stranded: f64,
        /// Why the return to the source failed.
        #[source]
        cause: Box<InventoryError>,
    },

    /// Storing a unit would create a cycle, is a self-reference, a duplicate,
    /// or exceeds the container's general capacity.
    #[error("cannot store unit {unit} in {container}: {reason}")]
    CycleOrCapacity {
        /// The would-be container.
        container: UnitId,
        /// The unit being stored.
        unit: UnitId,
        /// Why the store was rejected.
        reason: ContainmentRejection,
    },

    /// The unit is not directly contained in the container.
    #[error("unit {unit} is not contained in {container}")]
    NotContained {
        /// The container that was asked to release the unit.
        container: UnitId,
        /// The unit that is not there.
        unit: UnitId,
    },

    /// A resource id not present in the registry. A programming error.
    #[error("unknown resource: {0}")]
    UnknownResource(ResourceId),

    /// A resource name not present in the registry.
    #[error("unknown resource name: {0}")]
    UnknownResourceName(String),

    /// A unit id not present in the containment tree.
    #[error("unknown unit: {0}")]
    UnknownUnit(UnitId),

    /// A bulk operation on a discrete part, or the other way around.
    #[error("resource {resource} is not {expected:?}")]
    WrongResourceKind {
        /// The resource that was used.
        resource: ResourceId,
        /// The kind the operation requires.
        expected: ResourceKind,
    },

    /// Negative, NaN, or infinite amounts are rejected.
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: f64,
    },

    /// A unit with the same id is already in the tree.
    #[error("duplicate unit id: {0}")]
    DuplicateUnit(UnitId),

    /// A resource with the same name is already registered.
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),

    /// A resource descriptor failed validation.
    #[error("invalid resource descriptor {name}: {reason}")]
    InvalidDescriptor {
        /// The resource name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A discrete part count would overflow `u32`.
    #[error("part count overflow for {resource}")]
    CountOverflow {
        /// The resource whose count overflowed.
        resource: ResourceId,
    },

    /// The engine configuration is invalid.
    #[error("invalid inventory configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A snapshot failed validation during restore.
    #[error("invalid snapshot: {reason}")]
    InvalidSnapshot {
        /// What is wrong with the snapshot.
        reason: String,
    },
}

impl InventoryError {
    /// The amount left behind by a non-atomic store or retrieve, if any.
    ///
    /// Returns `None` for every error that was raised before any mutation.
    pub const fn remainder(&self) -> Option<f64> {
        match self {
            Self::StorageExceeded { remainder, .. } | Self::RetrievalExceeded { remainder, .. } => {
                Some(*remainder)
            }
            _ => None,
        }
    }

    /// Whether partial state may have been applied before this error.
    pub const fn is_partial(&self) -> bool {
        self.remainder().is_some() || matches!(self, Self::TransferStranded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_only_for_partial_failures() {
        let partial = InventoryError::StorageExceeded {
            resource: ResourceId(1),
            requested: 10.0,
            remainder: 2.5,
        };
        assert_eq!(partial.remainder(), Some(2.5));
        assert!(partial.is_partial());

        let upfront = InventoryError::CapacityExceeded {
            resource: ResourceId(1),
            requested: 10.0,
            available: 7.5,
        };
        assert!(upfront.remainder().is_none());
        assert!(!upfront.is_partial());

        let stranded = InventoryError::TransferStranded {
            resource: ResourceId(1),
            from: UnitId::new(),
            moved: 0.0,
            stranded: 3.0,
            cause: Box::new(upfront),
        };
        assert!(stranded.remainder().is_none());
        assert!(stranded.is_partial());
        assert!(std::error::Error::source(&stranded).is_some());
    }

    #[test]
    fn rejection_reason_is_rendered_in_message() {
        let err = InventoryError::CycleOrCapacity {
            container: UnitId::new(),
            unit: UnitId::new(),
            reason: ContainmentRejection::Cycle,
        };
        assert!(err.to_string().contains("already contains the container"));
    }
}
