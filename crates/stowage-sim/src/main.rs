//! Headless simulator for stowage containment scenarios.
//!
//! Loads a YAML scenario (first argument, else `stowage.yaml`), builds the
//! resource registry and containment tree it describes, and runs a tick
//! loop of scripted production, depletion, transfers, and unit moves.
//! Every movement is recorded in an exact-quantity ledger and audited each
//! tick against the stock the engine actually holds.
//!
//! ```text
//! scenario.yaml --> Scenario --> Simulation::step (moves, flows, compaction)
//!                                     |
//!                                     v
//!                          Ledger --> conservation audit
//! ```
//!
//! The process exits with an error if any audit fails.

mod config;
mod error;
mod scenario;
mod simulation;

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{LoggingConfig, SimConfig};
use crate::error::SimError;
use crate::simulation::Simulation;

/// Scenario file used when none is given on the command line.
const DEFAULT_SCENARIO: &str = "stowage.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the scenario cannot be loaded or built, if the tick
/// loop fails, or if the conservation audit found anomalies.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_SCENARIO), PathBuf::from);
    let config = SimConfig::from_file(&path)?;
    init_logging(&config.logging);

    info!(
        path = %path.display(),
        resources = config.resources.len(),
        units = config.units.len(),
        flows = config.flows.len(),
        moves = config.moves.len(),
        "scenario loaded"
    );

    let mut simulation = Simulation::new(&config)?;
    let summary = simulation.run()?;
    if summary.anomalies > 0 {
        return Err(SimError::ConservationViolated {
            anomalies: summary.anomalies,
        }
        .into());
    }
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
