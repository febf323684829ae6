//! Phase-aware output spawner.
//!
//! Implements the ledger's [`MaterialSpawner`] seam. Gas and liquid outputs
//! are dispersed into the environment cell under the spawn location, solids
//! drop as debris and discrete materials become prefab instances. Unknown
//! materials are skipped with a warning.

use std::collections::BTreeMap;

use glam::Vec2;
use harvest_ledger::{Cell, MaterialId, MaterialSpawner, SpawnRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::material::{MaterialCatalog, Phase};

/// How an output was materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputForm {
    /// Added to the environment of a cell.
    Dispersed {
        /// Receiving cell.
        cell: Cell,
    },
    /// A loose debris chunk.
    Debris,
    /// A discrete prefab instance.
    Prefab,
}

impl OutputForm {
    fn for_phase(phase: Phase, location: Vec2) -> Self {
        match phase {
            Phase::Gas | Phase::Liquid => Self::Dispersed {
                cell: location.floor().as_ivec2(),
            },
            Phase::Solid => Self::Debris,
            Phase::Discrete => Self::Prefab,
        }
    }
}

/// One materialized output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnedOutput {
    /// Output material.
    pub material: MaterialId,
    /// Mass (kg).
    pub mass_kg: f64,
    /// Temperature after clamping into the material's range (K).
    pub temperature_k: f64,
    /// World-space location.
    pub location: Vec2,
    /// Phase-dependent form.
    pub form: OutputForm,
}

/// Records every output it materializes.
#[derive(Debug, Clone, Default)]
pub struct OutputSpawner {
    catalog: MaterialCatalog,
    outputs: Vec<SpawnedOutput>,
    environment: BTreeMap<(i32, i32), BTreeMap<MaterialId, f64>>,
    skipped: Vec<MaterialId>,
}

impl OutputSpawner {
    /// Creates a spawner over `catalog`.
    #[must_use]
    pub fn new(catalog: MaterialCatalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    /// The material catalog.
    #[must_use]
    pub fn catalog(&self) -> &MaterialCatalog {
        &self.catalog
    }

    /// Mutable access to the material catalog.
    pub fn catalog_mut(&mut self) -> &mut MaterialCatalog {
        &mut self.catalog
    }

    /// Every output materialized so far, in spawn order.
    #[must_use]
    pub fn outputs(&self) -> &[SpawnedOutput] {
        &self.outputs
    }

    /// Takes the recorded outputs, leaving the environment untouched.
    pub fn drain(&mut self) -> Vec<SpawnedOutput> {
        std::mem::take(&mut self.outputs)
    }

    /// Total mass of `material` materialized so far (kg).
    #[must_use]
    pub fn total_mass_of(&self, material: &str) -> f64 {
        self.outputs
            .iter()
            .filter(|o| o.material.as_str() == material)
            .map(|o| o.mass_kg)
            .sum()
    }

    /// Dispersed mass of `material` in `cell` (kg).
    #[must_use]
    pub fn environment_mass(&self, cell: Cell, material: &str) -> f64 {
        self.environment
            .get(&(cell.x, cell.y))
            .and_then(|contents| contents.get(material))
            .copied()
            .unwrap_or(0.0)
    }

    /// Materials that were requested but are not in the catalog.
    #[must_use]
    pub fn skipped(&self) -> &[MaterialId] {
        &self.skipped
    }
}

impl MaterialSpawner for OutputSpawner {
    fn spawn(&mut self, request: &SpawnRequest) {
        let Some(def) = self.catalog.get(request.material.as_str()) else {
            warn!(material = %request.material, mass_kg = request.mass_kg, "unknown material, output skipped");
            self.skipped.push(request.material.clone());
            return;
        };
        if !request.mass_kg.is_finite() || request.mass_kg <= 0.0 {
            return;
        }

        let temperature_k = def.clamp_temperature(request.temperature_k);
        let form = OutputForm::for_phase(def.phase, request.location);
        if let OutputForm::Dispersed { cell } = form {
            *self
                .environment
                .entry((cell.x, cell.y))
                .or_default()
                .entry(request.material.clone())
                .or_insert(0.0) += request.mass_kg;
        }

        debug!(
            material = %request.material,
            mass_kg = request.mass_kg,
            temperature_k,
            form = ?form,
            "output spawned"
        );
        self.outputs.push(SpawnedOutput {
            material: request.material.clone(),
            mass_kg: request.mass_kg,
            temperature_k,
            location: request.location,
            form,
        });
    }
}
