//! Material catalog.
//!
//! The ledger only knows material ids. The host decides what a material *is*:
//! its phase (which picks how output is materialized) and the temperature
//! range it can exist at.
//!
//! # Example
//!
//! ```
//! use harvest_sim::material::{MaterialCatalog, Phase};
//!
//! let catalog = MaterialCatalog::from_json(
//!     r#"[{"id": "Oxygen", "phase": "gas", "min_temperature_k": 60.0, "max_temperature_k": 1000.0}]"#,
//! )
//! .unwrap();
//! assert_eq!(catalog.get("Oxygen").unwrap().phase, Phase::Gas);
//! ```

use std::collections::BTreeMap;

use harvest_ledger::MaterialId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SimError};

/// Physical phase of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Dispersed into the environment cell.
    Gas,
    /// Dispersed into the environment cell.
    Liquid,
    /// Dropped as a debris chunk.
    Solid,
    /// Spawned as a discrete prefab instance.
    Discrete,
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDef {
    /// Material id.
    pub id: MaterialId,
    /// Phase at spawn.
    pub phase: Phase,
    /// Lowest temperature the material can spawn at (K).
    #[serde(default)]
    pub min_temperature_k: f64,
    /// Highest temperature the material can spawn at (K).
    #[serde(default = "default_max_temperature")]
    pub max_temperature_k: f64,
}

fn default_max_temperature() -> f64 {
    10_000.0
}

impl MaterialDef {
    /// Creates a definition.
    #[must_use]
    pub fn new(id: &str, phase: Phase, min_temperature_k: f64, max_temperature_k: f64) -> Self {
        Self {
            id: MaterialId::new(id),
            phase,
            min_temperature_k,
            max_temperature_k,
        }
    }

    /// Clamps `temperature_k` into this material's range.
    #[must_use]
    pub fn clamp_temperature(&self, temperature_k: f64) -> f64 {
        if temperature_k.is_nan() {
            return self.min_temperature_k;
        }
        temperature_k.clamp(self.min_temperature_k, self.max_temperature_k)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| SimError::InvalidMaterial {
            material: self.id.to_string(),
            reason: reason.to_string(),
        };
        if self.id.is_empty() {
            return Err(invalid("empty id"));
        }
        if !self.min_temperature_k.is_finite() || !self.max_temperature_k.is_finite() {
            return Err(invalid("temperature bounds must be finite"));
        }
        if self.min_temperature_k < 0.0 || self.min_temperature_k > self.max_temperature_k {
            return Err(invalid("temperature bounds out of order"));
        }
        Ok(())
    }
}

/// Every known material, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MaterialCatalog {
    materials: BTreeMap<MaterialId, MaterialDef>,
}

impl MaterialCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON array of definitions.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or on any invalid definition.
    pub fn from_json(json: &str) -> Result<Self> {
        let defs: Vec<MaterialDef> = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for def in defs {
            catalog.insert(def)?;
        }
        debug!(materials = catalog.len(), "material catalog loaded");
        Ok(catalog)
    }

    /// Adds or replaces a definition.
    ///
    /// # Errors
    ///
    /// Rejects empty ids and inverted or non-finite temperature bounds.
    pub fn insert(&mut self, def: MaterialDef) -> Result<()> {
        def.validate()?;
        self.materials.insert(def.id.clone(), def);
        Ok(())
    }

    /// Looks up a material.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&MaterialDef> {
        self.materials.get(id)
    }

    /// Number of materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Returns true if no material is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
