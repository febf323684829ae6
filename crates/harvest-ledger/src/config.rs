//! Ledger tunables.
//!
//! The defaults reproduce the observed host behaviour: a 1 kg baseline, a
//! 1e-4 comparison epsilon, a two-tick uproot cooldown after harvest and a
//! carryover window of 2 s with a 0.1 s dedupe.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Timing of the [`CarryoverBuffer`](crate::carryover::CarryoverBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarryoverConfig {
    /// Entries older than this are discarded instead of applied (seconds).
    pub ttl_secs: f64,
    /// Repeated saves for the same cell within this window collapse into one.
    pub dedupe_secs: f64,
}

impl Default for CarryoverConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 2.0,
            dedupe_secs: 0.1,
        }
    }
}

/// Configuration shared by every tracker and service.
///
/// # Example
///
/// ```
/// use harvest_ledger::config::LedgerConfig;
///
/// let config: LedgerConfig = serde_json::from_str(r#"{"uproot_cooldown_ticks": 4}"#).unwrap();
/// assert_eq!(config.uproot_cooldown_ticks, 4);
/// assert!((config.baseline_mass_kg - 1.0).abs() < f64::EPSILON);
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Resting mass an entity is reset to after distribution (kg).
    pub baseline_mass_kg: f64,
    /// Deltas at or below this magnitude are treated as zero (kg).
    pub mass_epsilon: f64,
    /// Ticks after a harvest during which an uproot is ignored.
    pub uproot_cooldown_ticks: u32,
    /// Carryover timing.
    pub carryover: CarryoverConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            baseline_mass_kg: 1.0,
            mass_epsilon: 1e-4,
            uproot_cooldown_ticks: 2,
            carryover: CarryoverConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Checks that every tunable is in range.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if !(self.baseline_mass_kg.is_finite() && self.baseline_mass_kg > 0.0) {
            return Err(LedgerError::InvalidConfig(format!(
                "baseline_mass_kg must be positive, got {}",
                self.baseline_mass_kg
            )));
        }
        if !(self.mass_epsilon.is_finite() && self.mass_epsilon > 0.0) {
            return Err(LedgerError::InvalidConfig(format!(
                "mass_epsilon must be positive, got {}",
                self.mass_epsilon
            )));
        }
        let carry = self.carryover;
        if !(carry.dedupe_secs.is_finite() && carry.dedupe_secs >= 0.0) {
            return Err(LedgerError::InvalidConfig(format!(
                "carryover.dedupe_secs must be non-negative, got {}",
                carry.dedupe_secs
            )));
        }
        if !(carry.ttl_secs.is_finite() && carry.ttl_secs >= carry.dedupe_secs) {
            return Err(LedgerError::InvalidConfig(format!(
                "carryover.ttl_secs ({}) must be at least dedupe_secs ({})",
                carry.ttl_secs, carry.dedupe_secs
            )));
        }
        Ok(())
    }

    /// Parses and validates a config from JSON.
    ///
    /// # Errors
    ///
    /// Returns a parse error or the first validation failure.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
