//! Host-side capabilities the ledger consumes.
//!
//! The ledger does not own entities or spawn anything itself. The host
//! implements [`MassBody`] for whatever carries the physical mass, and
//! [`MaterialSpawner`] for turning distributed mass into world output.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::ids::{cell_center, Cell};
use crate::material::MaterialId;

/// The physical side of a tracked entity.
///
/// Physical mass is independently mutable: other subsystems may write it at
/// any time. The tracker reconciles it with tracked mass once per tick.
pub trait MassBody {
    /// Current physical mass (kg).
    fn physical_mass_kg(&self) -> f64;

    /// Overwrites the physical mass (kg).
    fn set_physical_mass_kg(&mut self, mass_kg: f64);

    /// Current temperature (K), used for spawned outputs.
    fn temperature_k(&self) -> f64;

    /// Grid cell the entity occupies.
    fn cell(&self) -> Cell;

    /// World-space location for spawned outputs. Defaults to the cell centre.
    fn location(&self) -> Vec2 {
        cell_center(self.cell())
    }
}

/// A request to materialize `mass_kg` of `material`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    /// Output material.
    pub material: MaterialId,
    /// Mass to materialize (kg).
    pub mass_kg: f64,
    /// Temperature of the output (K).
    pub temperature_k: f64,
    /// World-space location.
    pub location: Vec2,
}

/// Spawning primitive supplied by the host.
///
/// Implementations pick the phase-appropriate form (dispersed gas or liquid,
/// solid debris, discrete prefab). Unknown materials should be skipped.
pub trait MaterialSpawner {
    /// Materializes the requested output.
    fn spawn(&mut self, request: &SpawnRequest);
}

impl MaterialSpawner for Vec<SpawnRequest> {
    fn spawn(&mut self, request: &SpawnRequest) {
        self.push(request.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub;

    impl MassBody for Stub {
        fn physical_mass_kg(&self) -> f64 {
            1.0
        }
        fn set_physical_mass_kg(&mut self, _mass_kg: f64) {}
        fn temperature_k(&self) -> f64 {
            293.15
        }
        fn cell(&self) -> Cell {
            Cell::new(3, 4)
        }
    }

    #[test]
    fn default_location_is_cell_center() {
        assert_eq!(Stub.location(), Vec2::new(3.5, 4.5));
    }

    #[test]
    fn vec_spawner_records_requests() {
        let mut out: Vec<SpawnRequest> = Vec::new();
        out.spawn(&SpawnRequest {
            material: MaterialId::new("Dirt"),
            mass_kg: 2.0,
            temperature_k: 300.0,
            location: Vec2::ZERO,
        });
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].material.as_str(), "Dirt");
    }
}
