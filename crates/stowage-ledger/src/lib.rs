//! Transfer ledger and conservation audit for stowage simulations.
//!
//! The inventory engine works in `f64` kilograms and tolerates float noise.
//! The ledger records the same movements as exact [`Decimal`] quantities so
//! a simulation can prove, tick by tick, that mass only enters the world
//! through production and only leaves it through depletion.
//!
//! # Modules
//!
//! - [`entry`] -- [`LedgerEntry`], its [`EntryKind`], and the validating
//!   [`EntryBuilder`].
//! - [`ledger`] -- The append-only [`Ledger`] with recording and query methods.
//! - [`conservation`] -- Per-tick balance checks and stock audits.
//!
//! # Entry kinds
//!
//! | Kind | From (debit) | To (credit) |
//! |------|-------------|-------------|
//! | Produce | outside world | Unit |
//! | Deplete | Unit | outside world |
//! | Transfer | Unit | another Unit |
//! | Absorb | stored Unit | its container |
//!
//! `Transfer` and `Absorb` are internal: they move mass between units and
//! must balance within a tick. `Produce` and `Deplete` are the only external
//! flows.
//!
//! # Usage
//!
//! ```
//! use rust_decimal::Decimal;
//! use stowage_ledger::{ConservationResult, Ledger};
//! use stowage_types::{ResourceId, UnitId};
//!
//! let mut ledger = Ledger::new();
//! let oxygen = ResourceId(0);
//! let tank = UnitId::new();
//! let suit = UnitId::new();
//!
//! ledger.record_produce(1, oxygen, Decimal::new(10, 0), tank).ok();
//! ledger.record_transfer(1, oxygen, Decimal::new(4, 0), tank, suit).ok();
//!
//! assert_eq!(ledger.verify_conservation(1), ConservationResult::Balanced);
//! assert_eq!(
//!     ledger.net_external_flow(1, oxygen).ok(),
//!     Some(Decimal::new(10, 0)),
//! );
//! ```

pub mod conservation;
pub mod entry;
pub mod ledger;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use stowage_types::{ResourceId, UnitId};

pub use conservation::ConservationResult;
pub use entry::{EntryBuilder, EntryKind, LedgerEntry, QUANTITY_SCALE, quantity_from_f64};
pub use ledger::Ledger;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when recording ledger entries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    /// The quantity was zero (no-op transfers are not recorded).
    #[error("ledger entry quantity must be greater than zero")]
    ZeroQuantity,

    /// The quantity was negative.
    #[error("ledger entry quantity must be positive, got {quantity}")]
    NegativeQuantity {
        /// The invalid quantity.
        quantity: Decimal,
    },

    /// A float amount could not be represented as a [`Decimal`].
    #[error("amount {value} cannot be represented as an exact quantity")]
    UnrepresentableQuantity {
        /// The rejected float.
        value: f64,
    },

    /// A required side of the entry was not set.
    #[error("{kind:?} entry requires a {side} unit")]
    MissingParty {
        /// The entry kind being built.
        kind: EntryKind,
        /// `"source"` or `"destination"`.
        side: &'static str,
    },

    /// A side was set that the entry kind does not allow.
    #[error("{kind:?} entry must not have a {side} unit")]
    UnexpectedParty {
        /// The entry kind being built.
        kind: EntryKind,
        /// `"source"` or `"destination"`.
        side: &'static str,
    },

    /// An internal movement named the same unit on both sides.
    #[error("{kind:?} entry moves mass from unit {unit} to itself")]
    SameParty {
        /// The entry kind being built.
        kind: EntryKind,
        /// The unit named twice.
        unit: UnitId,
    },

    /// A running total left the representable [`Decimal`] range.
    #[error("arithmetic overflow while summing resource {resource}")]
    Overflow {
        /// The resource whose total overflowed.
        resource: ResourceId,
    },

    /// An internal invariant was violated.
    #[error("internal ledger error: {0}")]
    InternalError(&'static str),
}

// ---------------------------------------------------------------------------
// Anomaly
// ---------------------------------------------------------------------------

/// A conservation failure detected for one tick.
///
/// Each imbalance maps a resource to `(expected, observed)`: for internal
/// balance checks that is `(debits, credits)`, for stock audits it is
/// `(net external flow, observed change in stock)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// Tick at which the anomaly was detected.
    pub tick: u64,
    /// Imbalanced resources and their two disagreeing totals.
    pub imbalances: BTreeMap<ResourceId, (Decimal, Decimal)>,
    /// Human-readable summary.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)?;
        for (resource, (expected, observed)) in &self.imbalances {
            write!(f, "; {resource}: expected {expected}, observed {observed}")?;
        }
        Ok(())
    }
}
