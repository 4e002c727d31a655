//! Hierarchical inventory and capacity-caching engine.
//!
//! Units (settlements, vehicles, suits, people, equipment) each own one
//! inventory. Inventories hold bulk resources measured by mass, discrete
//! parts counted as integers, and other units recursively. Every inventory
//! can answer "how much of resource R can I hold?" and "how much do I
//! hold?" for itself alone or for its whole subtree, cheaply, through a
//! dirty-bit cache that is invalidated up to the root on every change.
//!
//! # Architecture
//!
//! - [`registry`] -- [`ResourceRegistry`], the immutable resource catalog.
//! - [`store`] -- [`ResourceStore`], one inventory's local ledger.
//! - [`cache`] -- [`CapacityCache`], memoized subtree aggregates.
//! - [`inventory`] -- [`Inventory`], the per-unit aggregate.
//! - [`supply_demand`] -- [`SupplyDemandTracker`] counters for pricing.
//! - [`unit`] -- the [`Unit`] record and the [`UnitListener`] seam.
//! - [`tree`] -- [`ContainmentTree`], the arena owning every unit and
//!   implementing all cross-inventory operations.
//! - [`snapshot`] -- [`TreeSnapshot`] capture and restore.
//!
//! # Invariants
//!
//! After every successful operation:
//!
//! - stored amounts and capacities are non-negative;
//! - local stored amounts never exceed local capacity by more than epsilon;
//! - containment is a forest: no unit contains itself, transitively;
//! - a transfer moves mass without creating or destroying any.
//!
//! Multi-container store and retrieve are the one documented exception to
//! atomicity: see [`tree::resources`].
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use stowage_inventory::{ContainmentTree, InventoryError, ResourceRegistry, Unit};
//! use stowage_types::{Freshness, PhaseClass, Scope, UnitKind};
//!
//! # fn main() -> Result<(), InventoryError> {
//! let mut builder = ResourceRegistry::builder();
//! let oxygen = builder.bulk("oxygen", PhaseClass::Gas)?;
//! let mut tree = ContainmentTree::new(Arc::new(builder.build()));
//!
//! let rover = tree.add_unit(Unit::new("rover", UnitKind::Vehicle, 800.0))?;
//! let suit = tree.add_unit(Unit::new("suit", UnitKind::EvaSuit, 40.0))?;
//! tree.add_general_capacity(rover, 200.0)?;
//! tree.add_type_capacity(suit, oxygen, 1.0)?;
//! tree.store_unit(rover, suit)?;
//! tree.store(rover, oxygen, 0.5, Scope::Nested)?;
//!
//! let stored = tree.stored_of(rover, oxygen, Scope::Nested, Freshness::Fresh)?;
//! assert!((stored - 0.5).abs() < 1e-9);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod inventory;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod supply_demand;
pub mod tree;
pub mod unit;

pub use cache::{CacheFamily, CapacityCache};
pub use config::{DEFAULT_EPSILON, InventoryConfig};
pub use error::{ContainmentRejection, InventoryError};
pub use inventory::Inventory;
pub use registry::{RegistryBuilder, ResourceRegistry};
pub use snapshot::{TreeSnapshot, UnitSnapshot};
pub use store::ResourceStore;
pub use supply_demand::{DemandCounters, SupplyDemandTracker};
pub use tree::{Absorption, ContainmentTree, DestroyedUnit};
pub use unit::{Unit, UnitListener};
