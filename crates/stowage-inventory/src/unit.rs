//! The unit record that owns an inventory, and the event listener seam.

use serde::{Deserialize, Serialize};
use stowage_types::{UnitEvent, UnitId, UnitKind};

/// A physical thing that owns exactly one inventory.
///
/// The container reference is a plain [`UnitId`]: a non-owning back
/// reference maintained by the [`ContainmentTree`](crate::ContainmentTree).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier.
    pub id: UnitId,
    /// Display name.
    pub name: String,
    /// What sort of unit this is.
    pub kind: UnitKind,
    /// Mass of the unit itself, excluding its inventory (kg).
    pub base_mass: f64,
    /// Whether bulk resources this unit holds are absorbed into the
    /// container it is stored in.
    pub pass_through: bool,
    container: Option<UnitId>,
}

impl Unit {
    /// Create a free-standing unit with a fresh id.
    pub fn new(name: impl Into<String>, kind: UnitKind, base_mass: f64) -> Self {
        Self::with_id(UnitId::new(), name, kind, base_mass)
    }

    /// Create a free-standing unit with a known id.
    pub fn with_id(id: UnitId, name: impl Into<String>, kind: UnitKind, base_mass: f64) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            base_mass,
            pass_through: kind.default_pass_through(),
            container: None,
        }
    }

    /// Override the pass-through flag.
    #[must_use]
    pub const fn with_pass_through(mut self, pass_through: bool) -> Self {
        self.pass_through = pass_through;
        self
    }

    /// The unit directly holding this one, if any.
    pub const fn container(&self) -> Option<UnitId> {
        self.container
    }

    pub(crate) const fn set_container(&mut self, container: Option<UnitId>) {
        self.container = container;
    }
}

/// Observer notified after every successful inventory mutation.
///
/// Notifications are fire-and-forget. Closures taking `&UnitEvent` implement
/// this trait.
pub trait UnitListener {
    /// Handle one event.
    fn on_event(&mut self, event: &UnitEvent);
}

impl<F> UnitListener for F
where
    F: FnMut(&UnitEvent),
{
    fn on_event(&mut self, event: &UnitEvent) {
        self(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_follows_kind() {
        assert!(Unit::new("suit", UnitKind::EvaSuit, 40.0).pass_through);
        assert!(!Unit::new("rover", UnitKind::Vehicle, 800.0).pass_through);
        assert!(Unit::new("rover", UnitKind::Vehicle, 800.0).with_pass_through(true).pass_through);
    }

    #[test]
    fn new_units_are_free_standing() {
        let unit = Unit::new("crate", UnitKind::Container, 5.0);
        assert!(unit.container().is_none());
    }

    #[test]
    fn closures_are_listeners() {
        let mut seen = 0_u32;
        {
            let mut listener = |_: &UnitEvent| seen = seen.saturating_add(1);
            let event = UnitEvent {
                unit: UnitId::new(),
                kind: stowage_types::UnitEventKind::CapacityChanged { resource: None },
            };
            listener.on_event(&event);
            listener.on_event(&event);
        }
        assert_eq!(seen, 2);
    }
}
