//! Teardown coordination for planting-site deconstruction.
//!
//! While a site is being deconstructed its storages are *suppressed*: trackers
//! skip them entirely, without even updating their snapshots. The coordinator
//! also remembers which trackers are bound to each site's plot store so that a
//! deconstruction can force them into final teardown before a harvest and the
//! deconstruction both try to pay out the same mass.
//!
//! # Example
//!
//! ```
//! use harvest_ledger::{EntityId, SiteId, StorageArena, TeardownCoordinator};
//!
//! let site = SiteId::new(1);
//! let mut storages = StorageArena::new();
//! let soil = storages.create(Some(site));
//!
//! let mut teardown = TeardownCoordinator::new();
//! teardown.bind_plot(site, EntityId::new(9));
//!
//! let doomed = teardown.begin_deconstruction(site, &storages);
//! assert_eq!(doomed, vec![EntityId::new(9)]);
//! assert!(teardown.is_suppressed(soil));
//!
//! // The caller resumes every observer of the returned storages.
//! assert_eq!(teardown.end_deconstruction(site), vec![soil]);
//! assert!(!teardown.is_suppressed(soil));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::ids::{EntityId, SiteId, StorageId};
use crate::storage::StorageArena;

/// Suppression registry and plot binding table.
#[derive(Debug, Clone, Default)]
pub struct TeardownCoordinator {
    /// Suppressed storages, grouped by the site that suppressed them.
    suppressed: BTreeMap<SiteId, BTreeSet<StorageId>>,
    /// Trackers bound to each site's plot store.
    plot_bindings: BTreeMap<SiteId, BTreeSet<EntityId>>,
    /// Sites with a deconstruction in progress.
    deconstructing: BTreeSet<SiteId>,
}

impl TeardownCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Storage Suppression
    // =========================================================================

    /// Suppresses every storage directly owned by `site`. Returns how many.
    pub fn suppress_storages_of(&mut self, site: SiteId, storages: &StorageArena) -> usize {
        let owned = storages.owned_by(site);
        let count = owned.len();
        self.suppressed.entry(site).or_default().extend(owned);
        debug!(site = %site, count, "suppressed site storages");
        count
    }

    /// Lifts the suppression placed by `site`.
    ///
    /// Returns the storages that are no longer suppressed by any site. Every
    /// observer of them must be resumed (see
    /// [`MassTracker::resume_storage`](crate::tracker::MassTracker::resume_storage))
    /// before the next mutation, or the suppressed changes would be counted.
    pub fn clear_suppression_of(&mut self, site: SiteId) -> Vec<StorageId> {
        let Some(cleared) = self.suppressed.remove(&site) else {
            return Vec::new();
        };
        debug!(site = %site, count = cleared.len(), "cleared site suppression");
        cleared
            .into_iter()
            .filter(|storage| !self.is_suppressed(*storage))
            .collect()
    }

    /// Returns true if any site currently suppresses `storage`.
    #[must_use]
    pub fn is_suppressed(&self, storage: StorageId) -> bool {
        self.suppressed.values().any(|set| set.contains(&storage))
    }

    // =========================================================================
    // Plot Bindings
    // =========================================================================

    /// Records that `tracker` persists into `site`'s plot store.
    pub fn bind_plot(&mut self, site: SiteId, tracker: EntityId) {
        self.plot_bindings.entry(site).or_default().insert(tracker);
    }

    /// Removes a binding (tracker cleaned up).
    pub fn unbind_plot(&mut self, site: SiteId, tracker: EntityId) {
        if let Some(bound) = self.plot_bindings.get_mut(&site) {
            bound.remove(&tracker);
            if bound.is_empty() {
                self.plot_bindings.remove(&site);
            }
        }
    }

    /// Trackers bound to `site`, in id order.
    #[must_use]
    pub fn trackers_bound_to(&self, site: SiteId) -> Vec<EntityId> {
        self.plot_bindings
            .get(&site)
            .map(|bound| bound.iter().copied().collect())
            .unwrap_or_default()
    }

    // =========================================================================
    // Deconstruction
    // =========================================================================

    /// Starts deconstructing `site`.
    ///
    /// Suppresses the site's storages and returns every tracker bound to the
    /// site's plot store. The caller must force each of them into final
    /// teardown.
    pub fn begin_deconstruction(&mut self, site: SiteId, storages: &StorageArena) -> Vec<EntityId> {
        self.deconstructing.insert(site);
        self.suppress_storages_of(site, storages);
        let doomed = self.trackers_bound_to(site);
        debug!(site = %site, trackers = doomed.len(), "deconstruction started");
        doomed
    }

    /// Ends (or cancels) a deconstruction and lifts its suppression.
    ///
    /// Returns the storages to resume, as [`Self::clear_suppression_of`].
    pub fn end_deconstruction(&mut self, site: SiteId) -> Vec<StorageId> {
        self.deconstructing.remove(&site);
        self.clear_suppression_of(site)
    }

    /// Returns true while `site` is being deconstructed.
    #[must_use]
    pub fn is_deconstructing(&self, site: SiteId) -> bool {
        self.deconstructing.contains(&site)
    }
}
