//! Identifier newtypes shared by every ledger service.
//!
//! - [`EntityId`]: a tracked entity instance (one tracker per entity)
//! - [`SiteId`]: a planting site, which outlives the entities occupying it
//! - [`StorageId`]: an external storage container
//! - [`Cell`]: a spatial grid cell, used to key carryover entries
//!
//! All identifiers are ordered by their numeric value so registries keyed by
//! them (`BTreeMap`) iterate deterministically.
//!
//! # Example
//!
//! ```
//! use harvest_ledger::ids::{EntityId, SiteId};
//!
//! let a = EntityId::new(1);
//! let b = EntityId::new(2);
//! assert!(a < b);
//! assert_eq!(SiteId::new(7).as_u64(), 7);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Spatial grid cell.
pub type Cell = glam::IVec2;

/// Returns the world-space centre of a grid cell.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cell_center(cell: Cell) -> glam::Vec2 {
    glam::Vec2::new(cell.x as f32 + 0.5, cell.y as f32 + 0.5)
}

macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates an identifier from a raw `u64` value.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw `u64` value of this identifier.
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self::new(id)
            }
        }
    };
}

ledger_id!(
    /// Unique identifier of a tracked entity instance.
    ///
    /// A destroyed-and-replaced entity gets a new `EntityId`, even when the
    /// replacement occupies the same cell and site.
    EntityId
);

ledger_id!(
    /// Identifier of a planting site (plot).
    SiteId
);

ledger_id!(
    /// Identifier of an external storage container.
    StorageId
);
