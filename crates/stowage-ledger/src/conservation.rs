//! Conservation checks over recorded entries and observed stock.
//!
//! Two checks run each tick:
//!
//! ```text
//! internal:  sum(debits of R in T) == sum(credits of R in T)   over Transfer/Absorb
//! stock:     stock_after(R) - stock_before(R) == produced(R, T) - depleted(R, T)
//! ```
//!
//! The first catches malformed internal entries (a missing side or a
//! hand-appended record). The second ties the ledger back to the engine: the
//! world's total stored mass of a resource may change only by the net
//! external flow recorded for it.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use stowage_types::ResourceId;

use crate::LedgerAnomaly;
use crate::entry::LedgerEntry;

/// The result of a conservation check for a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// Everything balances.
    Balanced,
    /// One or more resources are out of balance.
    Anomaly(LedgerAnomaly),
}

impl ConservationResult {
    /// Whether the check passed.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Verify that internal movements in `tick` balance for every resource.
///
/// An internal entry debits its source and credits its destination by the
/// same quantity, so well-formed entries always balance. An entry missing
/// one side contributes to only one total and shows up as an imbalance.
pub fn verify_conservation(tick: u64, entries: &[LedgerEntry]) -> ConservationResult {
    let mut debits: BTreeMap<ResourceId, Decimal> = BTreeMap::new();
    let mut credits: BTreeMap<ResourceId, Decimal> = BTreeMap::new();

    for entry in entries {
        if entry.tick != tick || !entry.kind.is_internal() {
            continue;
        }
        if entry.from.is_some() {
            let d = debits.entry(entry.resource).or_insert(Decimal::ZERO);
            *d = match d.checked_add(entry.quantity) {
                Some(val) => val,
                None => return overflow_anomaly(tick, entry.resource),
            };
        }
        if entry.to.is_some() {
            let c = credits.entry(entry.resource).or_insert(Decimal::ZERO);
            *c = match c.checked_add(entry.quantity) {
                Some(val) => val,
                None => return overflow_anomaly(tick, entry.resource),
            };
        }
    }

    let resources: BTreeSet<ResourceId> =
        debits.keys().chain(credits.keys()).copied().collect();

    let mut imbalances = BTreeMap::new();
    for resource in resources {
        let debit = debits.get(&resource).copied().unwrap_or(Decimal::ZERO);
        let credit = credits.get(&resource).copied().unwrap_or(Decimal::ZERO);
        if debit != credit {
            imbalances.insert(resource, (debit, credit));
        }
    }

    if imbalances.is_empty() {
        ConservationResult::Balanced
    } else {
        let count = imbalances.len();
        ConservationResult::Anomaly(LedgerAnomaly {
            tick,
            imbalances,
            message: format!(
                "LEDGER_ANOMALY at tick {tick}: internal movements unbalanced for {count} resource(s)",
            ),
        })
    }
}

/// Audit one resource's observed stock change against its net external flow.
///
/// `before` and `after` are the world's total stock of `resource` around the
/// tick; `net_flow` is produce minus deplete for the tick. Differences up to
/// `tolerance` are accepted to absorb float noise from the engine.
pub fn audit_stock(
    tick: u64,
    resource: ResourceId,
    before: Decimal,
    after: Decimal,
    net_flow: Decimal,
    tolerance: Decimal,
) -> ConservationResult {
    let Some(observed) = after.checked_sub(before) else {
        return overflow_anomaly(tick, resource);
    };
    let Some(drift) = observed.checked_sub(net_flow) else {
        return overflow_anomaly(tick, resource);
    };
    if drift.abs() <= tolerance {
        return ConservationResult::Balanced;
    }

    let mut imbalances = BTreeMap::new();
    imbalances.insert(resource, (net_flow, observed));
    ConservationResult::Anomaly(LedgerAnomaly {
        tick,
        imbalances,
        message: format!(
            "LEDGER_ANOMALY at tick {tick}: stock of {resource} drifted by {drift} from recorded flow",
        ),
    })
}

/// Construct an anomaly result for arithmetic overflow during summation.
fn overflow_anomaly(tick: u64, resource: ResourceId) -> ConservationResult {
    let mut imbalances = BTreeMap::new();
    imbalances.insert(resource, (Decimal::ZERO, Decimal::ZERO));
    ConservationResult::Anomaly(LedgerAnomaly {
        tick,
        imbalances,
        message: format!("LEDGER_ANOMALY at tick {tick}: arithmetic overflow while summing {resource}"),
    })
}
