//! Plot-level mass mirror.
//!
//! A [`PlotMassStore`] is bound to the planting site, not to the entity
//! instance, so tracked mass survives destruction and recreation of the
//! entity object occupying the site.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::SiteId;

/// Persisted mass scalar for one planting site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotMassStore {
    mass_kg: f64,
}

impl PlotMassStore {
    /// Creates a store holding `mass_kg` (floored at 0).
    #[must_use]
    pub fn new(mass_kg: f64) -> Self {
        let mut store = Self::default();
        store.set(mass_kg);
        store
    }

    /// Stored mass (kg).
    #[must_use]
    pub fn mass_kg(&self) -> f64 {
        self.mass_kg
    }

    /// Overwrites the stored mass, flooring at 0. Non-finite values store 0.
    pub fn set(&mut self, mass_kg: f64) {
        self.mass_kg = if mass_kg.is_finite() {
            mass_kg.max(0.0)
        } else {
            0.0
        };
    }

    /// Returns true if nothing meaningful is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mass_kg <= 0.0
    }
}

/// Every site's sidecar, keyed by site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlotMassStores {
    stores: BTreeMap<SiteId, PlotMassStore>,
}

impl PlotMassStores {
    /// Creates an empty set of sidecars.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches an empty sidecar to `site` unless one already exists.
    pub fn attach(&mut self, site: SiteId) -> &mut PlotMassStore {
        self.stores.entry(site).or_default()
    }

    /// Looks up a site's sidecar.
    #[must_use]
    pub fn get(&self, site: SiteId) -> Option<&PlotMassStore> {
        self.stores.get(&site)
    }

    /// Mutable lookup of a site's sidecar.
    pub fn get_mut(&mut self, site: SiteId) -> Option<&mut PlotMassStore> {
        self.stores.get_mut(&site)
    }

    /// Detaches a site's sidecar (the site itself was destroyed).
    pub fn detach(&mut self, site: SiteId) -> Option<PlotMassStore> {
        self.stores.remove(&site)
    }

    /// Number of attached sidecars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Returns true if no sidecar is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_floors_at_zero() {
        let mut store = PlotMassStore::new(-3.0);
        assert!(store.is_empty());
        store.set(f64::INFINITY);
        assert!(store.mass_kg().abs() < f64::EPSILON);
        store.set(7.5);
        assert!((store.mass_kg() - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn attach_is_install_once() {
        let mut stores = PlotMassStores::new();
        stores.attach(SiteId::new(1)).set(4.0);
        stores.attach(SiteId::new(1));
        assert_eq!(stores.len(), 1);
        assert!((stores.get(SiteId::new(1)).unwrap().mass_kg() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn store_persists_as_plain_scalar() {
        let json = serde_json::to_string(&PlotMassStore::new(2.5)).unwrap();
        assert_eq!(json, r#"{"mass_kg":2.5}"#);
        let back: PlotMassStore = serde_json::from_str(&json).unwrap();
        assert!((back.mass_kg() - 2.5).abs() < f64::EPSILON);
    }
}
