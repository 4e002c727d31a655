//! Building a registry and containment tree from a scenario file.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use stowage_inventory::{ContainmentTree, ResourceRegistry, Unit};
use stowage_ledger::{Ledger, quantity_from_f64};
use stowage_types::{ResourceKind, Scope, UnitId};
use tracing::{debug, info};

use crate::config::{ConfigError, ResourceDef, SimConfig, UnitDef};
use crate::error::SimError;

/// Tick at which starting stock is recorded.
pub const SETUP_TICK: u64 = 0;

/// A built world: the tree plus the names the scenario refers to units by.
#[derive(Debug)]
pub struct Scenario {
    /// Every unit in the scenario.
    pub tree: ContainmentTree,
    names: BTreeMap<String, UnitId>,
}

impl Scenario {
    /// Register resources, create units, nest them, and load starting stock.
    ///
    /// Starting stock is recorded in `ledger` as production at
    /// [`SETUP_TICK`].
    pub fn build(config: &SimConfig, ledger: &mut Ledger) -> Result<Self, SimError> {
        let registry = build_registry(&config.resources)?;
        let tree = ContainmentTree::with_config(Arc::new(registry), config.engine)?;
        let mut scenario = Self {
            tree,
            names: BTreeMap::new(),
        };

        for def in &config.units {
            scenario.add_unit(def)?;
        }
        for def in &config.units {
            if let Some(parent) = &def.parent {
                let container = scenario.unit_id(parent)?;
                let unit = scenario.unit_id(&def.name)?;
                scenario.tree.store_unit(container, unit)?;
            }
        }
        for def in &config.units {
            scenario.load_stock(def, ledger)?;
        }

        info!(
            resources = scenario.tree.registry().len(),
            units = scenario.tree.len(),
            roots = scenario.tree.roots().count(),
            "scenario built"
        );
        Ok(scenario)
    }

    /// Look up a unit by its scenario name.
    pub fn unit_id(&self, name: &str) -> Result<UnitId, ConfigError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::Invalid(format!("unknown unit: {name}")))
    }

    /// The scenario name of a unit, for log output.
    pub fn name_of(&self, id: UnitId) -> &str {
        self.tree.unit(id).map_or("?", |unit| unit.name.as_str())
    }

    fn add_unit(&mut self, def: &UnitDef) -> Result<(), SimError> {
        if self.names.contains_key(&def.name) {
            return Err(ConfigError::Invalid(format!("duplicate unit name: {}", def.name)).into());
        }
        let mut unit = Unit::new(def.name.as_str(), def.kind, def.base_mass);
        if let Some(pass_through) = def.pass_through {
            unit = unit.with_pass_through(pass_through);
        }
        let id = self.tree.add_unit(unit)?;
        self.names.insert(def.name.clone(), id);

        if def.general_capacity > 0.0 {
            self.tree.add_general_capacity(id, def.general_capacity)?;
        }
        for (name, amount) in &def.type_capacity {
            let resource = self.tree.registry().resolve(name)?;
            self.tree.add_type_capacity(id, resource, *amount)?;
        }
        for (phase, amount) in &def.phase_capacity {
            self.tree.add_phase_capacity(id, *phase, *amount)?;
        }
        debug!(unit = %id, name = %def.name, kind = ?def.kind, "unit created");
        Ok(())
    }

    fn load_stock(&mut self, def: &UnitDef, ledger: &mut Ledger) -> Result<(), SimError> {
        let id = self.unit_id(&def.name)?;
        for (name, amount) in &def.stock {
            let resource = self.tree.registry().resolve(name)?;
            self.tree.store(id, resource, *amount, Scope::Local)?;
            let quantity = quantity_from_f64(*amount)?;
            if !quantity.is_zero() {
                ledger.record_produce(SETUP_TICK, resource, quantity, id)?;
            }
        }
        for (name, count) in &def.items {
            let resource = self.tree.registry().resolve(name)?;
            self.tree.store_items(id, resource, *count)?;
            if *count > 0 {
                ledger.record_produce(SETUP_TICK, resource, Decimal::from(*count), id)?;
            }
        }
        Ok(())
    }
}

fn build_registry(resources: &[ResourceDef]) -> Result<ResourceRegistry, SimError> {
    let mut builder = ResourceRegistry::builder();
    for def in resources {
        match (def.kind, def.phase, def.mass_per_unit) {
            (ResourceKind::Bulk, Some(phase), _) => {
                builder.bulk(&def.name, phase)?;
            }
            (ResourceKind::Discrete, _, Some(mass)) => {
                builder.discrete(&def.name, mass)?;
            }
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "resource {} is missing its phase or part mass",
                    def.name
                ))
                .into());
            }
        }
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use stowage_types::{Freshness, UnitKind};

    use super::*;

    const YAML: &str = r"
resources:
  - name: water
    kind: bulk
    phase: liquid
  - name: filter
    kind: discrete
    mass_per_unit: 0.5
units:
  - name: Habitat
    kind: building
    general_capacity: 500
    phase_capacity: { liquid: 200 }
    stock: { water: 120 }
    items: { filter: 4 }
  - name: Tank
    kind: container
    base_mass: 10
    type_capacity: { water: 50 }
    parent: Habitat
    stock: { water: 30 }
";

    fn build() -> (Scenario, Ledger) {
        let config = SimConfig::parse(YAML).ok().unwrap_or_default();
        let mut ledger = Ledger::new();
        let scenario = Scenario::build(&config, &mut ledger);
        assert!(scenario.is_ok(), "{scenario:?}");
        (scenario.ok().unwrap_or_else(|| panic!("scenario failed")), ledger)
    }

    #[test]
    fn units_are_nested_and_stocked() {
        let (scenario, ledger) = build();
        let habitat = scenario.unit_id("Habitat").unwrap_or_default();
        let tank = scenario.unit_id("Tank").unwrap_or_default();
        let water = scenario.tree.registry().find("water").unwrap_or(stowage_types::ResourceId(99));

        assert_eq!(scenario.tree.container_of(tank).ok(), Some(Some(habitat)));
        assert_eq!(scenario.tree.unit(tank).map(|u| u.kind).ok(), Some(UnitKind::Container));
        let nested = scenario
            .tree
            .stored_of(habitat, water, Scope::Nested, Freshness::Fresh)
            .unwrap_or_default();
        assert!((nested - 150.0).abs() < 1e-9);
        assert_eq!(scenario.name_of(tank), "Tank");

        // Two bulk loads and one part load, all at setup.
        assert_eq!(ledger.entries_for_tick(SETUP_TICK).len(), 3);
        assert_eq!(
            ledger.net_external_flow(SETUP_TICK, water).ok(),
            Some(Decimal::from(150))
        );
    }

    #[test]
    fn unknown_names_are_reported() {
        let (scenario, _) = build();
        assert!(matches!(scenario.unit_id("Airlock"), Err(ConfigError::Invalid(_))));

        let yaml = "units:\n  - name: A\n    kind: vehicle\n    parent: Nowhere\n";
        let config = SimConfig::parse(yaml).ok().unwrap_or_default();
        let result = Scenario::build(&config, &mut Ledger::new());
        assert!(matches!(result, Err(SimError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn duplicate_unit_names_are_rejected() {
        let yaml = "units:\n  - name: A\n    kind: vehicle\n  - name: A\n    kind: robot\n";
        let config = SimConfig::parse(yaml).ok().unwrap_or_default();
        let result = Scenario::build(&config, &mut Ledger::new());
        assert!(matches!(result, Err(SimError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn stock_beyond_capacity_fails_the_build() {
        let yaml = r"
resources:
  - name: water
    kind: bulk
    phase: liquid
units:
  - name: Jug
    kind: container
    type_capacity: { water: 1 }
    stock: { water: 5 }
";
        let config = SimConfig::parse(yaml).ok().unwrap_or_default();
        let result = Scenario::build(&config, &mut Ledger::new());
        assert!(matches!(result, Err(SimError::Inventory(_))));
    }
}
