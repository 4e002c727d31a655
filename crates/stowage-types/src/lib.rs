//! Shared type definitions for the stowage inventory engine.
//!
//! This crate holds the identifiers and value types every other stowage
//! crate speaks in. It contains no logic beyond small classification
//! helpers, so it can be depended on by the engine, the ledger, and any
//! external serializer without pulling in the engine itself.
//!
//! # Modules
//!
//! - [`ids`] -- [`UnitId`] (UUID v7) and the dense [`ResourceId`].
//! - [`enums`] -- [`ResourceKind`], [`PhaseClass`], [`UnitKind`], and the
//!   [`Scope`] / [`Freshness`] query selectors.
//! - [`structs`] -- [`ResourceDescriptor`] and its [`ResourceClass`].
//! - [`events`] -- [`UnitEvent`] notifications fired after mutations.

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export primary types at crate root for convenience.
pub use enums::{Freshness, PhaseClass, ResourceKind, Scope, UnitKind};
pub use events::{UnitEvent, UnitEventKind};
pub use ids::{ResourceId, UnitId};
pub use structs::{ResourceClass, ResourceDescriptor};
