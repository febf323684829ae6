//! Error types for host-level misuse.

use harvest_ledger::{EntityId, LedgerError, SiteId, StorageId};
use thiserror::Error;

/// Convenience alias for simulation results.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised by [`World`](crate::world::World) operations.
#[derive(Debug, Error)]
pub enum SimError {
    /// No plant with this id is alive.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// No storage with this id exists.
    #[error("unknown storage {0}")]
    UnknownStorage(StorageId),

    /// No planting site with this id exists.
    #[error("unknown planting site {0}")]
    UnknownSite(SiteId),

    /// A material definition is malformed.
    #[error("invalid material `{material}`: {reason}")]
    InvalidMaterial {
        /// Offending material id.
        material: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The ledger rejected a configuration or a lifecycle transition.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A JSON document could not be parsed.
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
}
