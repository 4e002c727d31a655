//! Engine configuration.
//!
//! The engine has a single tunable: the floating-point tolerance used when
//! comparing bulk amounts against capacity and stock. It is embedded in the
//! simulation's YAML configuration under `engine:`.

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// Default tolerance absorbing floating-point drift in bulk amounts (kg).
pub const DEFAULT_EPSILON: f64 = 1e-7;

/// Tunables for a [`ContainmentTree`](crate::ContainmentTree).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Amounts within this tolerance of a bound are treated as on the bound,
    /// and stored amounts at or below it are treated as exactly zero.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
        }
    }
}

impl InventoryConfig {
    /// Check that the tolerance is finite, non-negative and small.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidConfig`] if `epsilon` is outside
    /// `[0, 1)`.
    pub fn validate(self) -> Result<(), InventoryError> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 || self.epsilon >= 1.0 {
            return Err(InventoryError::InvalidConfig {
                reason: format!("epsilon must be in [0, 1), got {}", self.epsilon),
            });
        }
        Ok(())
    }
}

const fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}
