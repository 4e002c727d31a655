//! The tick loop.
//!
//! Each tick applies the scripted unit moves, then the flows that are due,
//! records every movement that actually happened in the ledger, and audits
//! the result: internal movements must balance, and the world's total stock
//! of every resource must have changed by exactly its net external flow.
//! Supply/demand counters are compacted on a fixed schedule.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use stowage_inventory::InventoryError;
use stowage_ledger::conservation::audit_stock;
use stowage_ledger::{ConservationResult, Ledger, quantity_from_f64};
use stowage_types::{Freshness, ResourceId, ResourceKind, Scope, UnitEvent, UnitId};
use tracing::{debug, error, info, trace, warn};

use crate::config::{FlowKind, RunConfig, SimConfig};
use crate::error::SimError;
use crate::scenario::{SETUP_TICK, Scenario};

/// A flow with every name resolved.
#[derive(Debug, Clone, Copy)]
struct Flow {
    kind: FlowKind,
    unit: UnitId,
    to: Option<UnitId>,
    resource: ResourceId,
    amount: f64,
    jitter: f64,
    every: u64,
    scope: Scope,
}

/// A move with every name resolved.
#[derive(Debug, Clone, Copy)]
struct Move {
    tick: u64,
    unit: UnitId,
    into: Option<UnitId>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks simulated, not counting setup.
    pub ticks: u64,
    /// Ledger entries recorded, setup included.
    pub entries: usize,
    /// Failed conservation checks.
    pub anomalies: usize,
    /// Scripted moves the engine rejected.
    pub failed_moves: usize,
}

/// A scenario in motion.
pub struct Simulation {
    scenario: Scenario,
    flows: Vec<Flow>,
    moves: Vec<Move>,
    ledger: Ledger,
    rng: StdRng,
    run: RunConfig,
    tolerance: Decimal,
    anomalies: usize,
    failed_moves: usize,
}

impl Simulation {
    /// Build the scenario, resolve its scripts, and audit the setup tick.
    pub fn new(config: &SimConfig) -> Result<Self, SimError> {
        let mut ledger = Ledger::new();
        let mut scenario = Scenario::build(config, &mut ledger)?;
        scenario.tree.subscribe(|event: &UnitEvent| {
            trace!(unit = %event.unit, kind = ?event.kind, "unit event");
        });

        let mut flows = Vec::with_capacity(config.flows.len());
        for def in &config.flows {
            let resource = scenario.tree.registry().resolve(&def.resource)?;
            scenario
                .tree
                .registry()
                .expect_kind(resource, ResourceKind::Bulk)?;
            flows.push(Flow {
                kind: def.kind,
                unit: scenario.unit_id(&def.unit)?,
                to: def.to.as_deref().map(|name| scenario.unit_id(name)).transpose()?,
                resource,
                amount: def.amount,
                jitter: def.jitter,
                every: def.every,
                scope: def.scope,
            });
        }

        let mut moves = Vec::with_capacity(config.moves.len());
        for def in &config.moves {
            moves.push(Move {
                tick: def.tick,
                unit: scenario.unit_id(&def.unit)?,
                into: def.into.as_deref().map(|name| scenario.unit_id(name)).transpose()?,
            });
        }

        let mut sim = Self {
            scenario,
            flows,
            moves,
            ledger,
            rng: StdRng::seed_from_u64(config.run.seed),
            run: config.run.clone(),
            tolerance: quantity_from_f64(config.run.audit_tolerance)?,
            anomalies: 0,
            failed_moves: 0,
        };
        let empty = BTreeMap::new();
        let after = sim.world_totals()?;
        sim.audit(SETUP_TICK, &empty, &after)?;
        Ok(sim)
    }

    /// Run every configured tick, then write the final snapshot if asked.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        info!(
            ticks = self.run.ticks,
            flows = self.flows.len(),
            moves = self.moves.len(),
            seed = self.run.seed,
            "simulation starting"
        );
        for tick in 1..=self.run.ticks {
            self.step(tick)?;
        }

        if let Some(path) = &self.run.snapshot {
            let snapshot = self.scenario.tree.snapshot();
            std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
            info!(path = %path.display(), units = snapshot.units.len(), "snapshot written");
        }

        let summary = RunSummary {
            ticks: self.run.ticks,
            entries: self.ledger.len(),
            anomalies: self.anomalies,
            failed_moves: self.failed_moves,
        };
        info!(
            ticks = summary.ticks,
            entries = summary.entries,
            anomalies = summary.anomalies,
            failed_moves = summary.failed_moves,
            "simulation finished"
        );
        Ok(summary)
    }

    /// Advance one tick.
    pub fn step(&mut self, tick: u64) -> Result<(), SimError> {
        let before = self.world_totals()?;

        let due_moves: Vec<Move> = self.moves.iter().filter(|m| m.tick == tick).copied().collect();
        for mv in due_moves {
            self.apply_move(tick, mv)?;
        }

        let due_flows: Vec<Flow> = self
            .flows
            .iter()
            .filter(|f| tick.checked_rem(f.every) == Some(0))
            .copied()
            .collect();
        for flow in due_flows {
            match flow.kind {
                FlowKind::Produce => self.produce(tick, flow)?,
                FlowKind::Deplete => self.deplete(tick, flow)?,
                FlowKind::Transfer => self.transfer(tick, flow)?,
            }
        }

        if tick.checked_rem(self.run.compact_every) == Some(0) {
            self.scenario.tree.compact_all_trackers(self.run.compact_divisor);
        }

        let after = self.world_totals()?;
        self.audit(tick, &before, &after)?;
        debug!(
            tick,
            entries = self.ledger.entries_for_tick(tick).len(),
            "tick complete"
        );
        Ok(())
    }

    fn jittered(&mut self, flow: Flow) -> f64 {
        if flow.jitter > 0.0 {
            flow.amount * (1.0 + self.rng.random_range(-flow.jitter..=flow.jitter))
        } else {
            flow.amount
        }
    }

    fn produce(&mut self, tick: u64, flow: Flow) -> Result<(), SimError> {
        let requested = self.jittered(flow);
        let tree = &mut self.scenario.tree;
        let room = tree.remaining_capacity(flow.unit, flow.resource, flow.scope, Freshness::Fresh)?;
        let amount = requested.min(room);
        if amount <= tree.config().epsilon {
            debug!(unit = %flow.unit, resource = %flow.resource, requested, "no room for production");
            return Ok(());
        }

        let stored = match tree.store(flow.unit, flow.resource, amount, flow.scope) {
            Ok(()) => amount,
            Err(err) => amount - partial_remainder(err)?,
        };
        tree.supply_demand_mut(flow.unit)?
            .record_supply(flow.resource, stored);
        if let Some(quantity) = ledger_quantity(stored)? {
            self.ledger
                .record_produce(tick, flow.resource, quantity, flow.unit)?;
        }
        Ok(())
    }

    fn deplete(&mut self, tick: u64, flow: Flow) -> Result<(), SimError> {
        let requested = self.jittered(flow);
        let tree = &mut self.scenario.tree;
        tree.supply_demand_mut(flow.unit)?
            .record_demand_request(flow.resource);
        let available = tree.stored_of(flow.unit, flow.resource, Scope::Nested, Freshness::Fresh)?;
        let amount = requested.min(available);
        if amount <= tree.config().epsilon {
            debug!(unit = %flow.unit, resource = %flow.resource, requested, "demand unmet");
            return Ok(());
        }

        let taken = match tree.retrieve(flow.unit, flow.resource, amount) {
            Ok(()) => amount,
            Err(err) => amount - partial_remainder(err)?,
        };
        tree.supply_demand_mut(flow.unit)?
            .record_demand_satisfied(flow.resource, taken);
        if let Some(quantity) = ledger_quantity(taken)? {
            self.ledger
                .record_deplete(tick, flow.resource, quantity, flow.unit)?;
        }
        Ok(())
    }

    fn transfer(&mut self, tick: u64, flow: Flow) -> Result<(), SimError> {
        let Some(to) = flow.to else {
            return Ok(());
        };
        let requested = self.jittered(flow);
        let tree = &mut self.scenario.tree;
        let available = tree.stored_of(flow.unit, flow.resource, Scope::Nested, Freshness::Fresh)?;
        let room = tree.remaining_capacity(to, flow.resource, Scope::Nested, Freshness::Fresh)?;
        let amount = requested.min(available).min(room);
        if amount <= tree.config().epsilon {
            debug!(from = %flow.unit, to = %to, resource = %flow.resource, requested, "nothing to transfer");
            return Ok(());
        }

        let (moved, stranded) = match tree.transfer(flow.unit, to, flow.resource, amount) {
            Ok(()) => (amount, 0.0),
            Err(InventoryError::StorageExceeded { remainder, .. }) => (amount - remainder, 0.0),
            Err(err @ InventoryError::TransferStranded { moved, stranded, .. }) => {
                warn!(from = %flow.unit, to = %to, error = %err, "transfer stranded part of its amount");
                (moved, stranded)
            }
            Err(
                err @ (InventoryError::RetrievalExceeded { .. }
                | InventoryError::CapacityExceeded { .. }
                | InventoryError::InsufficientStock { .. }),
            ) => {
                warn!(from = %flow.unit, to = %to, error = %err, "transfer did not move anything");
                (0.0, 0.0)
            }
            Err(err) => return Err(err.into()),
        };
        tree.supply_demand_mut(to)?.record_supply(flow.resource, moved);
        if let Some(quantity) = ledger_quantity(moved)? {
            self.ledger
                .record_transfer(tick, flow.resource, quantity, flow.unit, to)?;
        }
        // Stranded mass left the source without arriving anywhere.
        if let Some(quantity) = ledger_quantity(stranded)? {
            self.ledger
                .record_deplete(tick, flow.resource, quantity, flow.unit)?;
        }
        Ok(())
    }

    fn apply_move(&mut self, tick: u64, mv: Move) -> Result<(), SimError> {
        let previous = self.scenario.tree.container_of(mv.unit)?;
        if previous == mv.into {
            debug!(unit = %mv.unit, "move target is the current container");
            return Ok(());
        }
        if let Some(old) = previous {
            self.scenario.tree.retrieve_unit(old, mv.unit)?;
        }
        let Some(target) = mv.into else {
            info!(tick, unit = %self.scenario.name_of(mv.unit), "unit released");
            return Ok(());
        };

        match self.store_unit(tick, target, mv.unit) {
            Ok(()) => {
                info!(
                    tick,
                    unit = %self.scenario.name_of(mv.unit),
                    into = %self.scenario.name_of(target),
                    "unit moved"
                );
                Ok(())
            }
            Err(SimError::Inventory(err @ InventoryError::CycleOrCapacity { .. })) => {
                warn!(tick, unit = %self.scenario.name_of(mv.unit), error = %err, "move rejected");
                self.failed_moves = self.failed_moves.saturating_add(1);
                let Some(old) = previous else {
                    return Ok(());
                };
                match self.store_unit(tick, old, mv.unit) {
                    Err(SimError::Inventory(err)) => {
                        warn!(
                            tick,
                            unit = %self.scenario.name_of(mv.unit),
                            container = %self.scenario.name_of(old),
                            error = %err,
                            "could not return unit to its container, left free-standing"
                        );
                        Ok(())
                    }
                    other => other,
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Store a unit and record whatever its new container absorbed.
    fn store_unit(&mut self, tick: u64, container: UnitId, unit: UnitId) -> Result<(), SimError> {
        let absorbed = self.scenario.tree.store_unit(container, unit)?;
        for absorption in absorbed {
            if let Some(quantity) = ledger_quantity(absorption.amount)? {
                self.ledger
                    .record_absorb(tick, absorption.resource, quantity, unit, container)?;
            }
        }
        Ok(())
    }

    /// Total stock of every resource across all units' local stores.
    fn world_totals(&self) -> Result<BTreeMap<ResourceId, Decimal>, SimError> {
        let mut bulk: BTreeMap<ResourceId, f64> = BTreeMap::new();
        let mut parts: BTreeMap<ResourceId, u64> = BTreeMap::new();
        for unit in self.scenario.tree.units() {
            let store = self.scenario.tree.inventory(unit.id)?.store();
            for (resource, amount) in store.stored_amounts() {
                *bulk.entry(*resource).or_insert(0.0) += *amount;
            }
            for (resource, count) in store.item_counts() {
                let total = parts.entry(*resource).or_insert(0);
                *total = total.saturating_add(u64::from(*count));
            }
        }

        let mut totals = BTreeMap::new();
        for (resource, amount) in bulk {
            totals.insert(resource, quantity_from_f64(amount)?);
        }
        for (resource, count) in parts {
            totals.insert(resource, Decimal::from(count));
        }
        Ok(totals)
    }

    fn audit(
        &mut self,
        tick: u64,
        before: &BTreeMap<ResourceId, Decimal>,
        after: &BTreeMap<ResourceId, Decimal>,
    ) -> Result<(), SimError> {
        let mut results = vec![self.ledger.verify_conservation(tick)];
        let flows = self.ledger.net_external_flows(tick)?;
        for resource in self.scenario.tree.registry().ids() {
            results.push(audit_stock(
                tick,
                resource,
                before.get(&resource).copied().unwrap_or(Decimal::ZERO),
                after.get(&resource).copied().unwrap_or(Decimal::ZERO),
                flows.get(&resource).copied().unwrap_or(Decimal::ZERO),
                self.tolerance,
            ));
        }
        for result in results {
            if let ConservationResult::Anomaly(anomaly) = result {
                error!(tick, anomaly = %anomaly, "conservation audit failed");
                self.anomalies = self.anomalies.saturating_add(1);
            }
        }
        Ok(())
    }
}

/// The remainder of a partially applied store or retrieve.
///
/// Errors raised before any mutation are not expected here: the caller
/// clamps the amount to what the engine reported as available.
fn partial_remainder(err: InventoryError) -> Result<f64, SimError> {
    let Some(remainder) = err.remainder() else {
        return Err(err.into());
    };
    warn!(remainder, error = %err, "partial movement");
    Ok(remainder)
}

/// Convert an engine amount to a ledger quantity, or `None` if it rounds
/// to nothing.
fn ledger_quantity(amount: f64) -> Result<Option<Decimal>, SimError> {
    let quantity = quantity_from_f64(amount)?;
    Ok((quantity > Decimal::ZERO).then_some(quantity))
}
