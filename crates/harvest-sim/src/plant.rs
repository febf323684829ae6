//! Plant entities.

use harvest_ledger::{
    Cell, EntityId, EntityTypeId, MassBody, MassTracker, SiteId, YieldModifier,
};
use serde::{Deserialize, Serialize};

/// The physical side of a growable entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    /// Instance id.
    pub id: EntityId,
    /// Type used for the yield lookup.
    pub entity_type: EntityTypeId,
    /// Planting site the plant occupies, if any.
    pub site: Option<SiteId>,
    /// Grid cell.
    pub cell: Cell,
    /// Physical mass (kg), writable by any subsystem.
    pub physical_mass_kg: f64,
    /// Body temperature (K).
    pub temperature_k: f64,
}

impl MassBody for Plant {
    fn physical_mass_kg(&self) -> f64 {
        self.physical_mass_kg
    }

    fn set_physical_mass_kg(&mut self, mass_kg: f64) {
        self.physical_mass_kg = mass_kg;
    }

    fn temperature_k(&self) -> f64 {
        self.temperature_k
    }

    fn cell(&self) -> Cell {
        self.cell
    }
}

/// A live plant together with its accounting state.
#[derive(Debug, Clone)]
pub struct Occupant {
    /// Physical view.
    pub plant: Plant,
    /// Mass accounting.
    pub tracker: MassTracker,
    /// Optional yield supplement.
    pub modifier: Option<YieldModifier>,
}
