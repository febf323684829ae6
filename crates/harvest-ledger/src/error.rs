//! Error types for configuration and registration.
//!
//! Steady-state operations (ticks, storage events, harvests, carryover) do not
//! fail: missing collaborators degrade to no-ops and report an outcome instead.
//! Errors are reserved for rejecting bad configuration up front.

use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Convenience alias for ledger results.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised while configuring the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An entity type was registered with an empty identifier.
    #[error("entity type id must not be empty")]
    EmptyEntityType,

    /// A yield entry named an empty material.
    #[error("yield for entity type `{entity_type}` has an empty material id")]
    EmptyMaterial {
        /// The entity type being registered.
        entity_type: String,
    },

    /// A multiplier was negative, NaN or infinite.
    #[error("yield multiplier for `{material}` must be finite and non-negative, got {value}")]
    InvalidMultiplier {
        /// Offending material.
        material: String,
        /// Offending value.
        value: f64,
    },

    /// `harvest_mass_subtract_kg` was negative, NaN or infinite.
    #[error("harvest mass subtraction for `{entity_type}` must be finite and non-negative, got {value}")]
    InvalidHarvestSubtract {
        /// The entity type being registered.
        entity_type: String,
        /// Offending value.
        value: f64,
    },

    /// A tunable in [`LedgerConfig`](crate::config::LedgerConfig) is out of range.
    #[error("invalid ledger config: {0}")]
    InvalidConfig(String),

    /// A lifecycle transition other than the forward edges was requested.
    #[error("lifecycle transition {from} -> {to} is not allowed")]
    InvalidTransition {
        /// Current state.
        from: LifecycleState,
        /// Requested state.
        to: LifecycleState,
    },

    /// A JSON document could not be parsed.
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
}
