//! Yield registry: entity type → yield configuration.
//!
//! The registry is an explicit service owned by the host. Registration is an
//! upsert keyed by entity type (last writer wins); trackers copy the config
//! once at initialization, so later re-registration only affects trackers
//! initialized afterwards.
//!
//! The first registration also installs the plot sidecar hook: from then on
//! every planting site the host creates gets a
//! [`PlotMassStore`](crate::plot_store::PlotMassStore) attached through
//! [`YieldRegistry::attach_sidecar`], before any tracker binds to it.
//!
//! # Example
//!
//! ```
//! use harvest_ledger::{MaterialYield, YieldRegistry};
//!
//! let mut registry = YieldRegistry::new();
//! registry
//!     .register("fern", vec![MaterialYield::new("Fibre", 0.5)], 2.0, None)
//!     .unwrap();
//!
//! let config = registry.lookup("fern").unwrap();
//! assert_eq!(config.yields.len(), 1);
//! assert!(registry.lookup("cactus").is_none());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::ids::SiteId;
use crate::material::{EntityTypeId, MaterialYield};
use crate::plot_store::PlotMassStores;

// =============================================================================
// Yield Config
// =============================================================================

/// Yield configuration for one entity type. Immutable once looked up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldConfig {
    /// Entity type this config applies to.
    pub entity_type: EntityTypeId,
    /// Base yield list.
    #[serde(default)]
    pub yields: Vec<MaterialYield>,
    /// Mass withheld from every harvest (kg, opaque per-type constant).
    #[serde(default)]
    pub harvest_mass_subtract_kg: f64,
    /// Effect the host applies after a paying harvest.
    #[serde(default)]
    pub bonus_effect: Option<String>,
}

impl YieldConfig {
    /// Checks ids and numeric ranges.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.entity_type.is_empty() {
            return Err(LedgerError::EmptyEntityType);
        }
        if !self.harvest_mass_subtract_kg.is_finite() || self.harvest_mass_subtract_kg < 0.0 {
            return Err(LedgerError::InvalidHarvestSubtract {
                entity_type: self.entity_type.to_string(),
                value: self.harvest_mass_subtract_kg,
            });
        }
        for entry in &self.yields {
            if entry.material.is_empty() {
                return Err(LedgerError::EmptyMaterial {
                    entity_type: self.entity_type.to_string(),
                });
            }
            if !entry.multiplier.is_finite() || entry.multiplier < 0.0 {
                return Err(LedgerError::InvalidMultiplier {
                    material: entry.material.to_string(),
                    value: entry.multiplier,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Yield Registry
// =============================================================================

/// Table of yield configurations keyed by entity type.
#[derive(Debug, Clone, Default)]
pub struct YieldRegistry {
    configs: BTreeMap<EntityTypeId, YieldConfig>,
    sidecar_hook_installed: bool,
}

impl YieldRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the config for `entity_type`.
    ///
    /// # Errors
    ///
    /// Rejects empty ids and negative or non-finite numbers; the previous
    /// config, if any, is kept on error.
    pub fn register(
        &mut self,
        entity_type: &str,
        yields: Vec<MaterialYield>,
        harvest_mass_subtract_kg: f64,
        bonus_effect: Option<String>,
    ) -> Result<()> {
        self.insert(YieldConfig {
            entity_type: EntityTypeId::new(entity_type),
            yields,
            harvest_mass_subtract_kg,
            bonus_effect,
        })
    }

    /// Registers a prebuilt config (upsert).
    ///
    /// # Errors
    ///
    /// See [`YieldConfig::validate`].
    pub fn insert(&mut self, config: YieldConfig) -> Result<()> {
        config.validate()?;
        self.install_sidecar_hook();
        debug!(
            entity_type = %config.entity_type,
            yields = config.yields.len(),
            subtract_kg = config.harvest_mass_subtract_kg,
            "registered yield config"
        );
        self.configs.insert(config.entity_type.clone(), config);
        Ok(())
    }

    /// Registers every config in a JSON array. Returns how many were loaded.
    ///
    /// The whole document is validated before anything is registered.
    ///
    /// # Errors
    ///
    /// Returns a parse error or the first validation failure.
    pub fn load_json(&mut self, json: &str) -> Result<usize> {
        let configs: Vec<YieldConfig> = serde_json::from_str(json)?;
        for config in &configs {
            config.validate()?;
        }
        let count = configs.len();
        for config in configs {
            self.insert(config)?;
        }
        Ok(count)
    }

    /// Looks up the config for `entity_type`.
    #[must_use]
    pub fn lookup(&self, entity_type: &str) -> Option<&YieldConfig> {
        self.configs.get(entity_type)
    }

    /// Number of registered entity types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Drops every config and uninstalls the sidecar hook.
    pub fn clear(&mut self) {
        self.configs.clear();
        self.sidecar_hook_installed = false;
    }

    /// Returns true once a registration has installed the sidecar hook.
    #[must_use]
    pub fn sidecars_installed(&self) -> bool {
        self.sidecar_hook_installed
    }

    /// Attaches a plot sidecar to a newly created site if the hook is installed.
    ///
    /// Returns true if the site has a sidecar afterwards.
    pub fn attach_sidecar(&self, site: SiteId, stores: &mut PlotMassStores) -> bool {
        if !self.sidecar_hook_installed {
            return false;
        }
        stores.attach(site);
        true
    }

    fn install_sidecar_hook(&mut self) {
        if !self.sidecar_hook_installed {
            self.sidecar_hook_installed = true;
            debug!("installed plot sidecar hook");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod register_tests {
        use super::*;

        #[test]
        fn re_registration_replaces_wholesale() {
            let mut registry = YieldRegistry::new();
            registry
                .register("fern", vec![MaterialYield::new("A", 1.0)], 2.0, Some("glow".into()))
                .unwrap();
            registry
                .register("fern", vec![MaterialYield::new("B", 0.5)], 0.0, None)
                .unwrap();

            let config = registry.lookup("fern").unwrap();
            assert_eq!(registry.len(), 1);
            assert_eq!(config.yields, vec![MaterialYield::new("B", 0.5)]);
            assert!(config.bonus_effect.is_none());
            assert!(config.harvest_mass_subtract_kg.abs() < f64::EPSILON);
        }

        #[test]
        fn repeated_identical_registration_is_idempotent() {
            let mut registry = YieldRegistry::new();
            for _ in 0..3 {
                registry
                    .register("fern", vec![MaterialYield::new("A", 1.0)], 1.0, None)
                    .unwrap();
            }
            assert_eq!(registry.len(), 1);
        }

        #[test]
        fn invalid_config_keeps_previous() {
            let mut registry = YieldRegistry::new();
            registry
                .register("fern", vec![MaterialYield::new("A", 1.0)], 1.0, None)
                .unwrap();
            let err = registry
                .register("fern", vec![MaterialYield::new("A", -0.5)], 1.0, None)
                .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidMultiplier { .. }));
            assert_eq!(
                registry.lookup("fern").unwrap().yields,
                vec![MaterialYield::new("A", 1.0)]
            );
        }

        #[test]
        fn rejects_bad_fields() {
            let mut registry = YieldRegistry::new();
            assert!(matches!(
                registry.register("", vec![], 0.0, None),
                Err(LedgerError::EmptyEntityType)
            ));
            assert!(matches!(
                registry.register("x", vec![], f64::NAN, None),
                Err(LedgerError::InvalidHarvestSubtract { .. })
            ));
            assert!(matches!(
                registry.register("x", vec![MaterialYield::new("", 1.0)], 0.0, None),
                Err(LedgerError::EmptyMaterial { .. })
            ));
            assert!(registry.is_empty());
        }
    }

    mod json_tests {
        use super::*;

        #[test]
        fn loads_array_of_configs() {
            let mut registry = YieldRegistry::new();
            let count = registry
                .load_json(
                    r#"[
                        {"entity_type": "fern",
                         "yields": [{"material": "Fibre", "multiplier": 0.5}],
                         "harvest_mass_subtract_kg": 2.0,
                         "bonus_effect": "calm"},
                        {"entity_type": "moss"}
                    ]"#,
                )
                .unwrap();
            assert_eq!(count, 2);
            assert_eq!(
                registry.lookup("fern").unwrap().bonus_effect.as_deref(),
                Some("calm")
            );
            assert!(registry.lookup("moss").unwrap().yields.is_empty());
        }

        #[test]
        fn invalid_entry_registers_nothing() {
            let mut registry = YieldRegistry::new();
            let result = registry.load_json(
                r#"[{"entity_type": "fern"},
                    {"entity_type": "bad", "harvest_mass_subtract_kg": -1.0}]"#,
            );
            assert!(result.is_err());
            assert!(registry.is_empty());
        }

        #[test]
        fn malformed_json_is_an_error() {
            let mut registry = YieldRegistry::new();
            assert!(matches!(
                registry.load_json("{not json"),
                Err(LedgerError::Json(_))
            ));
        }
    }

    mod sidecar_tests {
        use super::*;

        #[test]
        fn sidecars_attach_only_after_first_registration() {
            let mut registry = YieldRegistry::new();
            let mut stores = PlotMassStores::new();
            assert!(!registry.attach_sidecar(SiteId::new(1), &mut stores));
            assert!(stores.get(SiteId::new(1)).is_none());

            registry.register("fern", vec![], 0.0, None).unwrap();
            assert!(registry.attach_sidecar(SiteId::new(1), &mut stores));
            assert!(stores.get(SiteId::new(1)).is_some());
        }

        #[test]
        fn clear_uninstalls_hook() {
            let mut registry = YieldRegistry::new();
            registry.register("fern", vec![], 0.0, None).unwrap();
            registry.clear();
            assert!(!registry.sidecars_installed());
            assert!(registry.lookup("fern").is_none());
        }
    }
}
