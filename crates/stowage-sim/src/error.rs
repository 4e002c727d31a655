//! Error types for the simulator.
//!
//! Engine, ledger, and configuration failures all surface through
//! [`SimError`] so the tick loop can propagate them with `?`.

use stowage_inventory::InventoryError;
use stowage_ledger::LedgerError;

use crate::config::ConfigError;

/// Errors that can stop a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The scenario file could not be loaded or is inconsistent.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An engine operation failed in a way the tick loop does not absorb.
    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// A movement could not be recorded.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The final snapshot could not be serialized.
    #[error("snapshot serialization error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The final snapshot could not be written.
    #[error("snapshot write error: {0}")]
    Io(#[from] std::io::Error),

    /// The run finished but the audit found conservation failures.
    #[error("conservation violated in {anomalies} check(s)")]
    ConservationViolated {
        /// Number of failed checks.
        anomalies: usize,
    },
}
