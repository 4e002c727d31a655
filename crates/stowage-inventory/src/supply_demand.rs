//! Per-inventory supply and demand counters.
//!
//! An external pricing component reads these counters and periodically
//! calls [`SupplyDemandTracker::compact`] to turn the cumulative amounts into
//! a moving average. The engine itself never reads them. Every operation is
//! total: there are no failure modes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stowage_types::ResourceId;

/// Counters for one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandCounters {
    /// Number of demand requests recorded.
    pub total_requested: u64,
    /// Number of demand requests that were satisfied.
    pub total_satisfied: u64,
    /// Amount handed out to satisfied requests (kg or parts).
    pub cumulative_requested: f64,
    /// Amount supplied (kg or parts).
    pub cumulative_supplied: f64,
    /// Number of supply events recorded.
    pub supply_events: u64,
}

/// Additive supply/demand bookkeeping keyed by resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyDemandTracker {
    counters: BTreeMap<ResourceId, DemandCounters>,
}

impl SupplyDemandTracker {
    /// Create an empty tracker.
    pub const fn new() -> Self {
        Self {
            counters: BTreeMap::new(),
        }
    }

    /// Record that `amount` of a resource was supplied.
    pub fn record_supply(&mut self, resource: ResourceId, amount: f64) {
        let entry = self.counters.entry(resource).or_default();
        entry.cumulative_supplied += amount;
        entry.supply_events = entry.supply_events.saturating_add(1);
    }

    /// Record that a resource was requested.
    pub fn record_demand_request(&mut self, resource: ResourceId) {
        let entry = self.counters.entry(resource).or_default();
        entry.total_requested = entry.total_requested.saturating_add(1);
    }

    /// Record that a request was satisfied with `amount`.
    pub fn record_demand_satisfied(&mut self, resource: ResourceId, amount: f64) {
        let entry = self.counters.entry(resource).or_default();
        entry.total_satisfied = entry.total_satisfied.saturating_add(1);
        entry.cumulative_requested += amount;
    }

    /// Divide the cumulative amounts by `divisor` in place.
    ///
    /// A divisor of zero leaves the counters unchanged.
    pub fn compact(&mut self, divisor: u32) {
        if divisor == 0 {
            return;
        }
        let divisor = f64::from(divisor);
        for entry in self.counters.values_mut() {
            entry.cumulative_requested /= divisor;
            entry.cumulative_supplied /= divisor;
        }
    }

    /// Reset the request and satisfaction counts, keeping the amounts.
    pub fn clear_request_counters(&mut self) {
        for entry in self.counters.values_mut() {
            entry.total_requested = 0;
            entry.total_satisfied = 0;
        }
    }

    /// Counters for one resource (zeroes if never recorded).
    pub fn counters(&self, resource: ResourceId) -> DemandCounters {
        self.counters.get(&resource).copied().unwrap_or_default()
    }

    /// Every resource with recorded activity.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &DemandCounters)> {
        self.counters.iter().map(|(id, counters)| (*id, counters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATER: ResourceId = ResourceId(3);

    #[test]
    fn counters_accumulate() {
        let mut tracker = SupplyDemandTracker::new();
        tracker.record_supply(WATER, 10.0);
        tracker.record_supply(WATER, 5.0);
        tracker.record_demand_request(WATER);
        tracker.record_demand_request(WATER);
        tracker.record_demand_satisfied(WATER, 4.0);

        let c = tracker.counters(WATER);
        assert_eq!(c.supply_events, 2);
        assert_eq!(c.total_requested, 2);
        assert_eq!(c.total_satisfied, 1);
        assert!((c.cumulative_supplied - 15.0).abs() < 1e-9);
        assert!((c.cumulative_requested - 4.0).abs() < 1e-9);
    }

    #[test]
    fn compact_divides_amounts_only() {
        let mut tracker = SupplyDemandTracker::new();
        tracker.record_supply(WATER, 12.0);
        tracker.record_demand_request(WATER);
        tracker.compact(4);
        let c = tracker.counters(WATER);
        assert!((c.cumulative_supplied - 3.0).abs() < 1e-9);
        assert_eq!(c.total_requested, 1);
    }

    #[test]
    fn compact_by_zero_is_noop() {
        let mut tracker = SupplyDemandTracker::new();
        tracker.record_supply(WATER, 12.0);
        tracker.compact(0);
        assert!((tracker.counters(WATER).cumulative_supplied - 12.0).abs() < 1e-9);
    }

    #[test]
    fn clear_request_counters_keeps_amounts() {
        let mut tracker = SupplyDemandTracker::new();
        tracker.record_demand_request(WATER);
        tracker.record_demand_satisfied(WATER, 2.0);
        tracker.clear_request_counters();
        let c = tracker.counters(WATER);
        assert_eq!(c.total_requested, 0);
        assert_eq!(c.total_satisfied, 0);
        assert!((c.cumulative_requested - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_resource_reads_zero() {
        let tracker = SupplyDemandTracker::new();
        assert_eq!(tracker.counters(WATER), DemandCounters::default());
        assert_eq!(tracker.iter().count(), 0);
    }
}
