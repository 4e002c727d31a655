//! Enumeration types shared across the stowage crates.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// How a resource is measured and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Fungible material measured by mass (kg) as a floating-point quantity.
    Bulk,
    /// Countable part with a fixed mass per unit, stored as an integer count.
    Discrete,
}

/// Grouping of bulk resources that share a common capacity pool.
///
/// A phase capacity grant on an inventory applies to every bulk resource
/// of that phase, e.g. all gases share pressurized-tank capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseClass {
    /// Gases (oxygen, nitrogen, carbon dioxide, methane).
    Gas,
    /// Liquids (water, brine).
    Liquid,
    /// Solids (regolith, ice, food).
    Solid,
}

impl core::fmt::Display for PhaseClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Gas => "gas",
            Self::Liquid => "liquid",
            Self::Solid => "solid",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// The category of a unit that owns an inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// A settlement: usually the root of a containment tree.
    Settlement,
    /// A building inside a settlement.
    Building,
    /// A rover or other ground vehicle.
    Vehicle,
    /// A person. Carries things but is not a resource container.
    Person,
    /// A robot. Carries things but is not a resource container.
    Robot,
    /// A bag, barrel, or gas canister.
    Container,
    /// An EVA suit with its own life-support tanks.
    EvaSuit,
}

impl UnitKind {
    /// Whether units of this kind take part in nested resource queries and
    /// distribution.
    ///
    /// Every contained unit contributes its mass to its container; only
    /// resource containers also contribute capacity and stored amounts.
    pub const fn is_container(self) -> bool {
        !matches!(self, Self::Person | Self::Robot)
    }

    /// Whether a unit of this kind empties its bulk resources into the
    /// inventory it is stored in by default.
    pub const fn default_pass_through(self) -> bool {
        matches!(self, Self::Container | Self::EvaSuit)
    }
}

impl core::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Settlement => "settlement",
            Self::Building => "building",
            Self::Vehicle => "vehicle",
            Self::Person => "person",
            Self::Robot => "robot",
            Self::Container => "container",
            Self::EvaSuit => "eva_suit",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Query selectors
// ---------------------------------------------------------------------------

/// Whether a query or mutation includes contained units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Only the inventory's own local store.
    Local,
    /// The local store plus every contained resource container, recursively.
    Nested,
}

/// Whether a read may return a cached value that is known to be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Recompute dirty cache entries before answering.
    #[default]
    Fresh,
    /// Return dirty entries as-is. Only for display-style callers that
    /// tolerate a value one tick old; never for "can I fit this" checks.
    AllowStale,
}
