//! Scenario configuration loaded from YAML.
//!
//! A scenario file describes the resources in play, the units and how they
//! nest, and the scripted flows and moves applied each tick. Every section
//! is optional; an empty file is a valid (if uneventful) scenario.
//!
//! The `STOWAGE_LOG` environment variable overrides `logging.level`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use stowage_inventory::InventoryConfig;
use stowage_types::{PhaseClass, ResourceKind, Scope, UnitKind};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The YAML parsed but describes an impossible scenario.
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level scenario configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimConfig {
    /// Engine tunables.
    #[serde(default)]
    pub engine: InventoryConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tick loop parameters.
    #[serde(default)]
    pub run: RunConfig,

    /// Resources to register, in id order.
    #[serde(default)]
    pub resources: Vec<ResourceDef>,

    /// Units to create, with their capacities, placement, and starting stock.
    #[serde(default)]
    pub units: Vec<UnitDef>,

    /// Scripted production, depletion, and transfers.
    #[serde(default)]
    pub flows: Vec<FlowDef>,

    /// Scripted unit moves.
    #[serde(default)]
    pub moves: Vec<MoveDef>,
}

impl SimConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.logging.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check ranges that serde cannot express.
    ///
    /// Name references between sections are resolved when the scenario is
    /// built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if !(self.run.audit_tolerance.is_finite() && self.run.audit_tolerance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "run.audit_tolerance must be a non-negative number, got {}",
                self.run.audit_tolerance
            )));
        }
        for resource in &self.resources {
            resource.validate()?;
        }
        for flow in &self.flows {
            flow.validate()?;
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(level) = std::env::var("STOWAGE_LOG")
            .ok()
            .filter(|level| !level.trim().is_empty())
        {
            self.level = level;
        }
    }
}

/// Tick loop parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Number of ticks to simulate.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Compact supply/demand counters every N ticks. Zero disables.
    #[serde(default = "default_compact_every")]
    pub compact_every: u64,

    /// Divisor applied to counters when compacting.
    #[serde(default = "default_compact_divisor")]
    pub compact_divisor: u32,

    /// Seed for flow jitter.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Largest stock drift (kg) the per-tick audit accepts.
    #[serde(default = "default_audit_tolerance")]
    pub audit_tolerance: f64,

    /// Where to write a JSON snapshot of the final tree, if anywhere.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            compact_every: default_compact_every(),
            compact_divisor: default_compact_divisor(),
            seed: default_seed(),
            audit_tolerance: default_audit_tolerance(),
            snapshot: None,
        }
    }
}

/// One resource to register.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceDef {
    /// Unique, case-insensitive name.
    pub name: String,

    /// Bulk (measured in kg) or discrete (counted parts).
    pub kind: ResourceKind,

    /// Phase class. Required for bulk resources.
    #[serde(default)]
    pub phase: Option<PhaseClass>,

    /// Mass of one part (kg). Required for discrete resources.
    #[serde(default)]
    pub mass_per_unit: Option<f64>,
}

impl ResourceDef {
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.kind, self.phase, self.mass_per_unit) {
            (ResourceKind::Bulk, Some(_), None) | (ResourceKind::Discrete, None, Some(_)) => Ok(()),
            (ResourceKind::Bulk, ..) => Err(ConfigError::Invalid(format!(
                "bulk resource {} needs a phase and no mass_per_unit",
                self.name
            ))),
            (ResourceKind::Discrete, ..) => Err(ConfigError::Invalid(format!(
                "discrete resource {} needs a mass_per_unit and no phase",
                self.name
            ))),
        }
    }
}

/// One unit to create.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnitDef {
    /// Unique name used to refer to the unit elsewhere in the file.
    pub name: String,

    /// What the unit is.
    pub kind: UnitKind,

    /// Empty mass (kg).
    #[serde(default)]
    pub base_mass: f64,

    /// General mass budget for parts and contained units (kg).
    #[serde(default)]
    pub general_capacity: f64,

    /// Override the kind's default pass-through behavior.
    #[serde(default)]
    pub pass_through: Option<bool>,

    /// Per-resource capacity (kg), keyed by resource name.
    #[serde(default)]
    pub type_capacity: BTreeMap<String, f64>,

    /// Per-phase capacity pools (kg).
    #[serde(default)]
    pub phase_capacity: BTreeMap<PhaseClass, f64>,

    /// Name of the unit this one starts inside.
    #[serde(default)]
    pub parent: Option<String>,

    /// Starting bulk stock (kg), keyed by resource name, stored locally.
    #[serde(default)]
    pub stock: BTreeMap<String, f64>,

    /// Starting part counts, keyed by resource name.
    #[serde(default)]
    pub items: BTreeMap<String, u32>,
}

/// What a scripted flow does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Mass enters the world into `unit`.
    Produce,
    /// Mass leaves the world from `unit`.
    Deplete,
    /// Mass moves from `unit` to `to`.
    Transfer,
}

/// A scripted bulk flow applied on a fixed schedule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlowDef {
    /// What the flow does.
    pub kind: FlowKind,

    /// The unit produced into, depleted from, or transferred from.
    pub unit: String,

    /// Destination unit for transfers.
    #[serde(default)]
    pub to: Option<String>,

    /// Bulk resource name.
    pub resource: String,

    /// Nominal amount per firing (kg).
    pub amount: f64,

    /// Relative random variation, in `[0, 1)`.
    #[serde(default)]
    pub jitter: f64,

    /// Fire on every Nth tick.
    #[serde(default = "default_every")]
    pub every: u64,

    /// Whether production may spill into contained units.
    #[serde(default = "default_scope")]
    pub scope: Scope,
}

impl FlowDef {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "flow on {} must move a positive amount, got {}",
                self.unit, self.amount
            )));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(format!(
                "flow on {} has jitter {} outside [0, 1)",
                self.unit, self.jitter
            )));
        }
        if self.every == 0 {
            return Err(ConfigError::Invalid(format!(
                "flow on {} must fire at least every tick (every >= 1)",
                self.unit
            )));
        }
        match (self.kind, &self.to) {
            (FlowKind::Transfer, None) => Err(ConfigError::Invalid(format!(
                "transfer from {} needs a destination",
                self.unit
            ))),
            (FlowKind::Produce | FlowKind::Deplete, Some(_)) => Err(ConfigError::Invalid(format!(
                "only transfers take a destination (flow on {})",
                self.unit
            ))),
            _ => Ok(()),
        }
    }
}

/// A scripted unit move.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MoveDef {
    /// Tick at which the move happens.
    pub tick: u64,

    /// The unit being moved.
    pub unit: String,

    /// The new container, or absent to release the unit as a root.
    #[serde(default)]
    pub into: Option<String>,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_ticks() -> u64 {
    24
}

const fn default_compact_every() -> u64 {
    12
}

const fn default_compact_divisor() -> u32 {
    2
}

const fn default_seed() -> u64 {
    42
}

const fn default_audit_tolerance() -> f64 {
    1e-6
}

const fn default_every() -> u64 {
    1
}

const fn default_scope() -> Scope {
    Scope::Nested
}
