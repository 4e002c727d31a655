//! Ledger entries and their validating builder.
//!
//! [`EntryBuilder`] enforces the double-entry shape of every movement: a
//! strictly positive quantity, and exactly the sides its [`EntryKind`]
//! expects. External flows have one side open to the outside world;
//! internal movements name two distinct units.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stowage_types::{ResourceId, UnitId};

use crate::LedgerError;

/// Decimal places kept when converting engine amounts into ledger quantities.
pub const QUANTITY_SCALE: u32 = 9;

/// Category of a recorded movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Mass entering the world into a unit.
    Produce,
    /// Mass leaving the world from a unit.
    Deplete,
    /// Mass moved between two units.
    Transfer,
    /// Mass pulled from a pass-through unit into its new container.
    Absorb,
}

impl EntryKind {
    /// Whether this kind moves mass between units without creating or
    /// destroying it.
    pub const fn is_internal(self) -> bool {
        matches!(self, Self::Transfer | Self::Absorb)
    }
}

/// One immutable ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Tick the movement happened in.
    pub tick: u64,
    /// Category of movement.
    pub kind: EntryKind,
    /// Resource moved.
    pub resource: ResourceId,
    /// Exact quantity moved, always positive.
    pub quantity: Decimal,
    /// Debited unit, `None` for production.
    pub from: Option<UnitId>,
    /// Credited unit, `None` for depletion.
    pub to: Option<UnitId>,
}

impl LedgerEntry {
    /// Check quantity sign and the sides required by [`EntryKind`].
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.quantity.is_zero() {
            return Err(LedgerError::ZeroQuantity);
        }
        if self.quantity.is_sign_negative() {
            return Err(LedgerError::NegativeQuantity {
                quantity: self.quantity,
            });
        }
        validate_parties(self.kind, self.from, self.to)
    }
}

fn validate_parties(
    kind: EntryKind,
    from: Option<UnitId>,
    to: Option<UnitId>,
) -> Result<(), LedgerError> {
    let source = from.ok_or(LedgerError::MissingParty {
        kind,
        side: "source",
    });
    let destination = to.ok_or(LedgerError::MissingParty {
        kind,
        side: "destination",
    });
    match kind {
        EntryKind::Produce => {
            if from.is_some() {
                return Err(LedgerError::UnexpectedParty {
                    kind,
                    side: "source",
                });
            }
            destination.map(|_| ())
        }
        EntryKind::Deplete => {
            if to.is_some() {
                return Err(LedgerError::UnexpectedParty {
                    kind,
                    side: "destination",
                });
            }
            source.map(|_| ())
        }
        EntryKind::Transfer | EntryKind::Absorb => {
            let (a, b) = (source?, destination?);
            if a == b {
                return Err(LedgerError::SameParty { kind, unit: a });
            }
            Ok(())
        }
    }
}

/// Convert an engine amount in kilograms to an exact ledger quantity.
///
/// The float's binary expansion is rounded to [`QUANTITY_SCALE`] places.
pub fn quantity_from_f64(value: f64) -> Result<Decimal, LedgerError> {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp(QUANTITY_SCALE).normalize())
        .ok_or(LedgerError::UnrepresentableQuantity { value })
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for validated [`LedgerEntry`] values.
///
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use stowage_ledger::{EntryBuilder, EntryKind};
/// use stowage_types::{ResourceId, UnitId};
///
/// let entry = EntryBuilder::new(3, EntryKind::Deplete, ResourceId(1))
///     .from(UnitId::new())
///     .quantity(Decimal::new(25, 1))
///     .build();
///
/// assert!(entry.is_ok());
/// ```
#[derive(Debug)]
pub struct EntryBuilder {
    tick: u64,
    kind: EntryKind,
    resource: ResourceId,
    from: Option<UnitId>,
    to: Option<UnitId>,
    quantity: Option<Decimal>,
}

impl EntryBuilder {
    /// Start an entry for the given tick, kind, and resource.
    pub const fn new(tick: u64, kind: EntryKind, resource: ResourceId) -> Self {
        Self {
            tick,
            kind,
            resource,
            from: None,
            to: None,
            quantity: None,
        }
    }

    /// Set the debited unit.
    #[must_use]
    pub const fn from(mut self, unit: UnitId) -> Self {
        self.from = Some(unit);
        self
    }

    /// Set the credited unit.
    #[must_use]
    pub const fn to(mut self, unit: UnitId) -> Self {
        self.to = Some(unit);
        self
    }

    /// Set the quantity moved.
    #[must_use]
    pub const fn quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Validate and produce the entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroQuantity`] when no quantity or a zero
    /// quantity was set, [`LedgerError::NegativeQuantity`] for negative
    /// amounts, and a party error when the sides do not fit the kind.
    pub fn build(self) -> Result<LedgerEntry, LedgerError> {
        let entry = LedgerEntry {
            tick: self.tick,
            kind: self.kind,
            resource: self.resource,
            quantity: self.quantity.unwrap_or(Decimal::ZERO),
            from: self.from,
            to: self.to,
        };
        entry.validate()?;
        Ok(entry)
    }
}
