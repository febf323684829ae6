//! String identifiers for the externally supplied taxonomy, and yield entries.
//!
//! The ledger never interprets these names: which materials exist, their phase
//! and temperature bounds belong to the host. The ledger only moves mass
//! between them.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! name_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from a string.
            #[must_use]
            pub fn new(id: &str) -> Self {
                Self(id.to_string())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

name_id!(
    /// Item type tag inside a storage (e.g. `"Water"`, `"Fertilizer"`).
    Tag
);

name_id!(
    /// Output material identifier (e.g. `"Dirt"`, `"Oxygen"`).
    MaterialId
);

name_id!(
    /// Entity type identifier used to look up a [`YieldConfig`](crate::registry::YieldConfig).
    EntityTypeId
);

/// One entry of a yield list.
///
/// `multiplier` is the fraction of distributable net mass that materializes as
/// `material`. Multipliers across a list are not required to sum to 1.
///
/// # Example
///
/// ```
/// use harvest_ledger::material::MaterialYield;
///
/// let dirt = MaterialYield::new("Dirt", 0.5);
/// assert!((dirt.mass_for(8.0) - 4.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialYield {
    /// Output material.
    pub material: MaterialId,
    /// Fraction of the net distributable mass.
    pub multiplier: f64,
}

impl MaterialYield {
    /// Creates a yield entry.
    #[must_use]
    pub fn new(material: &str, multiplier: f64) -> Self {
        Self {
            material: MaterialId::new(material),
            multiplier,
        }
    }

    /// Mass of this material produced from `net_kg` of distributable mass.
    #[must_use]
    pub fn mass_for(&self, net_kg: f64) -> f64 {
        net_kg * self.multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn names_borrow_as_str_for_lookups() {
        let mut map = BTreeMap::new();
        map.insert(Tag::new("Water"), 1);
        assert_eq!(map.get("Water"), Some(&1));
    }

    #[test]
    fn names_serialize_transparently() {
        let json = serde_json::to_string(&MaterialId::new("Dirt")).unwrap();
        assert_eq!(json, "\"Dirt\"");
    }

    #[test]
    fn yield_deserializes_from_plain_fields() {
        let y: MaterialYield =
            serde_json::from_str(r#"{"material":"Oxygen","multiplier":0.25}"#).unwrap();
        assert_eq!(y.material.as_str(), "Oxygen");
        assert!((y.multiplier - 0.25).abs() < f64::EPSILON);
    }
}
