//! The append-only ledger of resource movements.
//!
//! Entries are never modified or removed. Every recording method validates
//! the entry before it is appended, so the stored log only ever holds
//! well-formed movements; [`Ledger::append`] applies the same validation to
//! entries constructed elsewhere.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use stowage_types::{ResourceId, UnitId};
use tracing::debug;

use crate::LedgerError;
use crate::conservation::{self, ConservationResult};
use crate::entry::{EntryBuilder, EntryKind, LedgerEntry};

/// Append-only log of every movement recorded during a run.
#[derive(Debug, Default)]
pub struct Ledger {
    /// All entries, in insertion order.
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Create a new empty ledger.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Return the number of entries in the ledger.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return whether the ledger has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Validate and append an entry built elsewhere.
    pub fn append(&mut self, entry: LedgerEntry) -> Result<&LedgerEntry, LedgerError> {
        entry.validate()?;
        self.push(entry)
    }

    /// Record mass produced into `to` from outside the world.
    pub fn record_produce(
        &mut self,
        tick: u64,
        resource: ResourceId,
        quantity: Decimal,
        to: UnitId,
    ) -> Result<&LedgerEntry, LedgerError> {
        let entry = EntryBuilder::new(tick, EntryKind::Produce, resource)
            .to(to)
            .quantity(quantity)
            .build()?;
        self.push(entry)
    }

    /// Record mass depleted from `from` out of the world.
    pub fn record_deplete(
        &mut self,
        tick: u64,
        resource: ResourceId,
        quantity: Decimal,
        from: UnitId,
    ) -> Result<&LedgerEntry, LedgerError> {
        let entry = EntryBuilder::new(tick, EntryKind::Deplete, resource)
            .from(from)
            .quantity(quantity)
            .build()?;
        self.push(entry)
    }

    /// Record mass moved from one unit to another.
    pub fn record_transfer(
        &mut self,
        tick: u64,
        resource: ResourceId,
        quantity: Decimal,
        from: UnitId,
        to: UnitId,
    ) -> Result<&LedgerEntry, LedgerError> {
        let entry = EntryBuilder::new(tick, EntryKind::Transfer, resource)
            .from(from)
            .to(to)
            .quantity(quantity)
            .build()?;
        self.push(entry)
    }

    /// Record mass absorbed by `container` from a pass-through unit it just
    /// took in.
    pub fn record_absorb(
        &mut self,
        tick: u64,
        resource: ResourceId,
        quantity: Decimal,
        stored: UnitId,
        container: UnitId,
    ) -> Result<&LedgerEntry, LedgerError> {
        let entry = EntryBuilder::new(tick, EntryKind::Absorb, resource)
            .from(stored)
            .to(container)
            .quantity(quantity)
            .build()?;
        self.push(entry)
    }

    /// Entries recorded for `tick`, in insertion order.
    pub fn entries_for_tick(&self, tick: u64) -> Vec<&LedgerEntry> {
        self.entries.iter().filter(|e| e.tick == tick).collect()
    }

    /// Produced minus depleted quantity of `resource` in `tick`.
    pub fn net_external_flow(&self, tick: u64, resource: ResourceId) -> Result<Decimal, LedgerError> {
        let mut net = Decimal::ZERO;
        for entry in &self.entries {
            if entry.tick != tick || entry.resource != resource {
                continue;
            }
            net = apply_external(net, entry)?;
        }
        Ok(net)
    }

    /// Net external flow of every resource touched in `tick`.
    ///
    /// Resources that only moved internally appear with a zero flow.
    pub fn net_external_flows(
        &self,
        tick: u64,
    ) -> Result<BTreeMap<ResourceId, Decimal>, LedgerError> {
        let mut flows: BTreeMap<ResourceId, Decimal> = BTreeMap::new();
        for entry in &self.entries {
            if entry.tick != tick {
                continue;
            }
            let net = flows.entry(entry.resource).or_insert(Decimal::ZERO);
            *net = apply_external(*net, entry)?;
        }
        Ok(flows)
    }

    /// Net quantity of `resource` credited to `unit` over the whole run.
    ///
    /// Only reflects recorded movements: stock a unit started with is not
    /// in the ledger unless it was recorded as production.
    pub fn unit_balance(&self, unit: UnitId, resource: ResourceId) -> Result<Decimal, LedgerError> {
        let overflow = LedgerError::Overflow { resource };
        let mut balance = Decimal::ZERO;
        for entry in self.entries.iter().filter(|e| e.resource == resource) {
            if entry.to == Some(unit) {
                balance = balance
                    .checked_add(entry.quantity)
                    .ok_or_else(|| overflow.clone())?;
            }
            if entry.from == Some(unit) {
                balance = balance
                    .checked_sub(entry.quantity)
                    .ok_or_else(|| overflow.clone())?;
            }
        }
        Ok(balance)
    }

    /// Verify that internal movements balance for `tick`.
    pub fn verify_conservation(&self, tick: u64) -> ConservationResult {
        conservation::verify_conservation(tick, &self.entries)
    }

    fn push(&mut self, entry: LedgerEntry) -> Result<&LedgerEntry, LedgerError> {
        debug!(
            tick = entry.tick,
            kind = ?entry.kind,
            resource = %entry.resource,
            quantity = %entry.quantity,
            "ledger entry recorded"
        );
        self.entries.push(entry);
        self.entries.last().ok_or(LedgerError::InternalError(
            "failed to retrieve entry after append",
        ))
    }
}

/// Fold one entry's external effect into a running net flow.
fn apply_external(net: Decimal, entry: &LedgerEntry) -> Result<Decimal, LedgerError> {
    let next = match entry.kind {
        EntryKind::Produce => net.checked_add(entry.quantity),
        EntryKind::Deplete => net.checked_sub(entry.quantity),
        EntryKind::Transfer | EntryKind::Absorb => Some(net),
    };
    next.ok_or(LedgerError::Overflow {
        resource: entry.resource,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const OXYGEN: ResourceId = ResourceId(0);
    const WATER: ResourceId = ResourceId(1);

    #[test]
    fn new_ledger_is_empty() {
        let ledger = Ledger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn production_and_depletion_make_the_net_flow() {
        let mut ledger = Ledger::new();
        let habitat = UnitId::new();

        let _ = ledger.record_produce(1, OXYGEN, dec!(12), habitat);
        let _ = ledger.record_deplete(1, OXYGEN, dec!(4.5), habitat);
        let _ = ledger.record_produce(1, WATER, dec!(3), habitat);
        let _ = ledger.record_produce(2, OXYGEN, dec!(100), habitat);

        assert_eq!(ledger.net_external_flow(1, OXYGEN).ok(), Some(dec!(7.5)));
        assert_eq!(ledger.net_external_flow(1, WATER).ok(), Some(dec!(3)));
        assert_eq!(ledger.net_external_flow(3, OXYGEN).ok(), Some(dec!(0)));

        let flows = ledger.net_external_flows(1).unwrap_or_default();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows.get(&OXYGEN), Some(&dec!(7.5)));
    }

    #[test]
    fn internal_moves_leave_net_flow_untouched() {
        let mut ledger = Ledger::new();
        let rover = UnitId::new();
        let suit = UnitId::new();

        let _ = ledger.record_transfer(1, OXYGEN, dec!(2), rover, suit);
        let _ = ledger.record_absorb(1, OXYGEN, dec!(1), suit, rover);

        assert_eq!(ledger.net_external_flow(1, OXYGEN).ok(), Some(dec!(0)));
        assert!(ledger.verify_conservation(1).is_balanced());
    }

    #[test]
    fn unit_balance_follows_both_sides() {
        let mut ledger = Ledger::new();
        let base = UnitId::new();
        let rover = UnitId::new();

        let _ = ledger.record_produce(1, WATER, dec!(10), base);
        let _ = ledger.record_transfer(1, WATER, dec!(3), base, rover);
        let _ = ledger.record_deplete(2, WATER, dec!(1), rover);

        assert_eq!(ledger.unit_balance(base, WATER).ok(), Some(dec!(7)));
        assert_eq!(ledger.unit_balance(rover, WATER).ok(), Some(dec!(2)));
        assert_eq!(ledger.unit_balance(rover, OXYGEN).ok(), Some(dec!(0)));
    }

    #[test]
    fn invalid_entries_are_not_appended() {
        let mut ledger = Ledger::new();
        let unit = UnitId::new();

        assert!(ledger.record_produce(1, OXYGEN, dec!(0), unit).is_err());
        assert!(ledger.record_transfer(1, OXYGEN, dec!(1), unit, unit).is_err());
        let forged = LedgerEntry {
            tick: 1,
            kind: EntryKind::Transfer,
            resource: OXYGEN,
            quantity: dec!(1),
            from: Some(unit),
            to: None,
        };
        assert!(ledger.append(forged).is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn entries_for_tick_filters_correctly() {
        let mut ledger = Ledger::new();
        let unit = UnitId::new();

        let _ = ledger.record_produce(1, OXYGEN, dec!(1), unit);
        let _ = ledger.record_produce(2, OXYGEN, dec!(1), unit);
        let _ = ledger.record_deplete(2, OXYGEN, dec!(1), unit);

        assert_eq!(ledger.entries_for_tick(1).len(), 1);
        assert_eq!(ledger.entries_for_tick(2).len(), 2);
        assert!(ledger.entries_for_tick(3).is_empty());
        assert_eq!(ledger.entries().len(), 3);
    }

    #[test]
    fn entries_serialize_with_exact_quantities() {
        let mut ledger = Ledger::new();
        let _ = ledger.record_produce(5, WATER, dec!(0.125), UnitId::new());
        let json = serde_json::to_string(ledger.entries()).unwrap_or_default();
        let back: Vec<LedgerEntry> = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(back.as_slice(), ledger.entries());
    }
}
