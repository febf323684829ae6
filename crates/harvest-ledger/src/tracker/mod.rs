//! Per-entity mass tracker.
//!
//! The [`MassTracker`] is the core accounting engine. It keeps the
//! authoritative *tracked mass* of one entity and updates it from three
//! directions:
//!
//! 1. **Storage consumption**: mass that leaves a watched `(storage, tag)`
//!    pair is credited. The tick sweep and the mutation event path share one
//!    snapshot per pair, so whichever runs first claims the delta and the
//!    other sees no change.
//! 2. **Visual reconciliation**: once per tick the tracker folds changes other
//!    subsystems made to the physical mass into tracked mass, and pushes its
//!    own changes into the physical mass. Physical mass lags tracked mass by
//!    one tick.
//! 3. **Distribution**: harvest and uproot convert the excess over baseline
//!    into material outputs and reset both views to baseline.
//!
//! # Lifecycle
//!
//! `Active → Suppressed → FinalTeardown`, forward only. Only an active
//! tracker counts or distributes. `FinalTeardown` unsubscribes from every
//! storage and is terminal.
//!
//! # Example
//!
//! ```
//! use harvest_ledger::{
//!     Binding, EntityId, LedgerConfig, MassTracker, StorageArena, Tag, TeardownCoordinator,
//!     TickContext,
//! };
//!
//! let mut storages = StorageArena::new();
//! let tank = storages.create(None);
//! storages.deposit(tank, Tag::new("Water"), 10.0);
//!
//! let mut tracker = MassTracker::new(EntityId::new(1), None, LedgerConfig::default());
//! tracker.register_storage(&mut storages, tank, &[Tag::new("Water")]);
//! storages.withdraw(tank, &Tag::new("Water"), 4.0);
//!
//! let teardown = TeardownCoordinator::new();
//! let ctx = TickContext { storages: &storages, teardown: &teardown };
//!
//! // The event path claims the delta; the following sweep sees nothing new.
//! assert!((tracker.on_storage_mutated(&ctx, tank) - 4.0).abs() < 1e-9);
//! tracker.tick(&ctx, &mut Binding::none());
//! assert!((tracker.tracked_mass_kg() - 5.0).abs() < 1e-9);
//! ```

mod distribute;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::body::{MassBody, MaterialSpawner, SpawnRequest};
use crate::carryover::{resync_target, MassSyncTarget};
use crate::config::LedgerConfig;
use crate::error::Result;
use crate::ids::{EntityId, SiteId, StorageId};
use crate::lifecycle::LifecycleState;
use crate::material::{MaterialYield, Tag};
use crate::modifier::{DistributionKind, YieldModifier};
use crate::plot_store::PlotMassStore;
use crate::registry::YieldConfig;
use crate::storage::StorageArena;
use crate::teardown::TeardownCoordinator;

// =============================================================================
// Call Contexts
// =============================================================================

/// Read-only services consulted on every accumulation attempt.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Every storage in the host.
    pub storages: &'a StorageArena,
    /// Suppression and deconstruction state.
    pub teardown: &'a TeardownCoordinator,
}

/// The entity-side collaborators a tracker is bound to.
///
/// Either may be absent (entity not bound yet, or not on a planting site);
/// the affected steps then become no-ops.
#[derive(Default)]
pub struct Binding<'a> {
    /// Physical mass view.
    pub body: Option<&'a mut dyn MassBody>,
    /// Plot-level persisted mirror.
    pub plot: Option<&'a mut PlotMassStore>,
}

impl<'a> Binding<'a> {
    /// No collaborators bound.
    #[must_use]
    pub fn none() -> Self {
        Self {
            body: None,
            plot: None,
        }
    }

    /// Bound to a physical body only.
    #[must_use]
    pub fn body(body: &'a mut dyn MassBody) -> Self {
        Self {
            body: Some(body),
            plot: None,
        }
    }

    /// Adds a plot mirror.
    #[must_use]
    pub fn with_plot(mut self, plot: Option<&'a mut PlotMassStore>) -> Self {
        self.plot = plot;
        self
    }
}

/// Collaborators used only by distribution.
pub struct HarvestContext<'a> {
    /// Per-entity yield supplement.
    pub modifier: Option<&'a YieldModifier>,
    /// Spawning primitive.
    pub spawner: &'a mut dyn MaterialSpawner,
}

// =============================================================================
// Reports
// =============================================================================

/// What a distribution computed and spawned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionReport {
    /// Harvest or uproot.
    pub kind: DistributionKind,
    /// Tracked mass above baseline before the reset (kg).
    pub tracked_excess_kg: f64,
    /// Physical mass above baseline before the reset (kg).
    pub physical_excess_kg: f64,
    /// Distributable mass after subtractions (kg).
    pub net_kg: f64,
    /// Every output handed to the spawner.
    pub outputs: Vec<SpawnRequest>,
    /// Bonus effect to apply, set only for a paying harvest.
    pub bonus_effect: Option<String>,
}

impl DistributionReport {
    /// Total mass handed to the spawner (kg).
    #[must_use]
    pub fn spawned_mass_kg(&self) -> f64 {
        self.outputs.iter().map(|o| o.mass_kg).sum()
    }
}

/// Result of a harvest or uproot notification.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Distribution ran (possibly spawning nothing).
    Distributed(DistributionReport),
    /// An uproot arrived within the post-harvest cooldown and was ignored.
    CooledDown,
    /// The site is being deconstructed; the deconstruction owns the payout.
    Deconstructing,
    /// The tracker is no longer active.
    Inactive(LifecycleState),
}

impl EventOutcome {
    /// The report, if distribution ran.
    #[must_use]
    pub fn report(&self) -> Option<&DistributionReport> {
        match self {
            Self::Distributed(report) => Some(report),
            _ => None,
        }
    }
}

/// Persisted tracker state: a plain scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    /// Tracked mass (kg).
    pub tracked_mass_kg: f64,
}

// =============================================================================
// Mass Tracker
// =============================================================================

/// Mass accounting state for one entity instance.
#[derive(Debug, Clone)]
pub struct MassTracker {
    entity: EntityId,
    site: Option<SiteId>,
    config: LedgerConfig,

    // Copied from the registry at init.
    yields: Vec<MaterialYield>,
    harvest_subtract_kg: f64,
    bonus_effect: Option<String>,

    tracked_mass_kg: f64,
    watched_tags: BTreeSet<Tag>,
    /// One previous-total snapshot per `(storage, tag)`.
    observed: BTreeMap<StorageId, BTreeMap<Tag, f64>>,
    ignored: BTreeSet<StorageId>,
    pending_extra_subtract_kg: f64,

    last_observed_physical_kg: f64,
    last_applied_tracked_kg: f64,
    awaiting_first_reconcile: bool,

    uproot_cooldown: u32,
    lifecycle: LifecycleState,
}

impl MassTracker {
    /// Creates an active tracker at baseline mass.
    #[must_use]
    pub fn new(entity: EntityId, site: Option<SiteId>, config: LedgerConfig) -> Self {
        let baseline = config.baseline_mass_kg;
        Self {
            entity,
            site,
            config,
            yields: Vec::new(),
            harvest_subtract_kg: 0.0,
            bonus_effect: None,
            tracked_mass_kg: baseline,
            watched_tags: BTreeSet::new(),
            observed: BTreeMap::new(),
            ignored: BTreeSet::new(),
            pending_extra_subtract_kg: 0.0,
            last_observed_physical_kg: baseline,
            last_applied_tracked_kg: baseline,
            awaiting_first_reconcile: true,
            uproot_cooldown: 0,
            lifecycle: LifecycleState::Active,
        }
    }

    /// Copies yields, harvest subtraction and bonus effect. Last call wins.
    pub fn initialize_from_config(&mut self, config: &YieldConfig) {
        self.yields.clone_from(&config.yields);
        self.harvest_subtract_kg = config.harvest_mass_subtract_kg;
        self.bonus_effect.clone_from(&config.bonus_effect);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Entity this tracker accounts for.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Planting site whose plot store mirrors this tracker, if any.
    #[must_use]
    pub fn site(&self) -> Option<SiteId> {
        self.site
    }

    /// Authoritative tracked mass (kg). Never negative.
    #[must_use]
    pub fn tracked_mass_kg(&self) -> f64 {
        self.tracked_mass_kg
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    /// Tags explicitly opted into.
    #[must_use]
    pub fn watched_tags(&self) -> &BTreeSet<Tag> {
        &self.watched_tags
    }

    /// Registered storages, in id order.
    #[must_use]
    pub fn observed_storages(&self) -> Vec<StorageId> {
        self.observed.keys().copied().collect()
    }

    /// Snapshot for a `(storage, tag)` pair.
    #[must_use]
    pub fn snapshot_of(&self, storage: StorageId, tag: &Tag) -> Option<f64> {
        self.observed.get(&storage)?.get(tag).copied()
    }

    /// Returns true if `storage` is on the ignore list.
    #[must_use]
    pub fn is_ignored(&self, storage: StorageId) -> bool {
        self.ignored.contains(&storage)
    }

    /// Base yield list copied from the registry.
    #[must_use]
    pub fn yields(&self) -> &[MaterialYield] {
        &self.yields
    }

    /// Configured per-harvest subtraction (kg).
    #[must_use]
    pub fn harvest_subtract_kg(&self) -> f64 {
        self.harvest_subtract_kg
    }

    /// Configured bonus effect.
    #[must_use]
    pub fn bonus_effect(&self) -> Option<&str> {
        self.bonus_effect.as_deref()
    }

    /// Extra subtraction waiting for the next harvest (kg).
    #[must_use]
    pub fn pending_extra_subtract_kg(&self) -> f64 {
        self.pending_extra_subtract_kg
    }

    /// Physical mass observed at the end of the last reconciliation (kg).
    #[must_use]
    pub fn last_observed_physical_kg(&self) -> f64 {
        self.last_observed_physical_kg
    }

    /// Tracked mass already pushed into the physical view (kg).
    #[must_use]
    pub fn last_applied_tracked_kg(&self) -> f64 {
        self.last_applied_tracked_kg
    }

    /// Remaining ticks during which an uproot is ignored.
    #[must_use]
    pub fn uproot_cooldown(&self) -> u32 {
        self.uproot_cooldown
    }

    // =========================================================================
    // Storage Registration
    // =========================================================================

    /// Watches `tags` on `storage`.
    ///
    /// Only the given tags are added to the watched set. Every watched tag
    /// without a snapshot is seeded with its current total, on this storage
    /// and on every other observed storage, so contents that already exist
    /// are never counted as consumed. The tracker subscribes at most once per
    /// storage. Returns true if this call created the subscription.
    pub fn register_storage(
        &mut self,
        storages: &mut StorageArena,
        storage: StorageId,
        tags: &[Tag],
    ) -> bool {
        if self.lifecycle.is_terminal() || self.ignored.contains(&storage) {
            return false;
        }
        if storages.get(storage).is_none() {
            warn!(entity = %self.entity, storage = %storage, "register_storage: unknown storage");
            return false;
        }

        for tag in tags {
            self.watched_tags.insert(tag.clone());
        }
        self.observed.entry(storage).or_default();
        self.seed_missing(storages);

        let subscribed = storages.subscribe(storage, self.entity);
        if subscribed {
            debug!(entity = %self.entity, storage = %storage, tags = tags.len(), "storage registered");
        }
        subscribed
    }

    /// Excludes `storage` from accumulation while keeping its registration.
    pub fn ignore_storage(&mut self, storage: StorageId) {
        self.ignored.insert(storage);
    }

    /// Excludes `storage` and drops its subscription and snapshots.
    pub fn ignore_and_unregister(&mut self, storages: &mut StorageArena, storage: StorageId) {
        self.ignored.insert(storage);
        self.unregister_storage(storages, storage);
    }

    /// Drops the subscription and snapshots of `storage`.
    pub fn unregister_storage(&mut self, storages: &mut StorageArena, storage: StorageId) {
        storages.unsubscribe(storage, self.entity);
        if self.observed.remove(&storage).is_some() {
            debug!(entity = %self.entity, storage = %storage, "storage unregistered");
        }
    }

    fn seed_missing(&mut self, storages: &StorageArena) {
        for (id, snapshots) in &mut self.observed {
            let Some(storage) = storages.get(*id) else {
                continue;
            };
            for tag in &self.watched_tags {
                snapshots
                    .entry(tag.clone())
                    .or_insert_with(|| storage.mass_of(tag));
            }
        }
    }

    // =========================================================================
    // Accumulation
    // =========================================================================

    /// Event path: a storage notified a mutation. Returns the credited mass.
    pub fn on_storage_mutated(&mut self, ctx: &TickContext<'_>, storage: StorageId) -> f64 {
        self.accumulate(ctx, storage)
    }

    /// Sweeps every observed storage. Returns the credited mass.
    fn sweep(&mut self, ctx: &TickContext<'_>) -> f64 {
        let ids: Vec<StorageId> = self.observed.keys().copied().collect();
        ids.into_iter().map(|id| self.accumulate(ctx, id)).sum()
    }

    /// Shared delta computation for both paths.
    ///
    /// Suppressed storages are skipped before anything is read, so their
    /// snapshots stay untouched. A decrease at or below the epsilon leaves
    /// the snapshot where it is, so a slow drip is credited once its
    /// cumulative total crosses the epsilon.
    fn accumulate(&mut self, ctx: &TickContext<'_>, storage_id: StorageId) -> f64 {
        if !self.lifecycle.accepts_accumulation() || self.ignored.contains(&storage_id) {
            return 0.0;
        }
        if ctx.teardown.is_suppressed(storage_id) {
            return 0.0;
        }
        let (Some(snapshots), Some(storage)) =
            (self.observed.get_mut(&storage_id), ctx.storages.get(storage_id))
        else {
            return 0.0;
        };

        let eps = self.config.mass_epsilon;
        let mut gained = 0.0;
        for tag in &self.watched_tags {
            let current = storage.mass_of(tag);
            match snapshots.get_mut(tag) {
                Some(previous) => {
                    let delta = *previous - current;
                    if delta > eps {
                        gained += delta;
                        *previous = current;
                    } else if delta <= 0.0 {
                        *previous = current;
                    }
                }
                None => {
                    snapshots.insert(tag.clone(), current);
                }
            }
        }

        if gained > 0.0 {
            self.tracked_mass_kg += gained;
            debug!(
                entity = %self.entity,
                storage = %storage_id,
                gained_kg = gained,
                tracked_kg = self.tracked_mass_kg,
                "consumption credited"
            );
        }
        gained
    }

    /// Reseeds every snapshot of `storage` to its current totals without
    /// crediting anything.
    ///
    /// Call this for every observer of a storage the moment its suppression
    /// lifts, so changes made while suppressed are never counted and changes
    /// made afterwards are.
    pub fn resume_storage(&mut self, storages: &StorageArena, storage: StorageId) {
        if self.lifecycle.is_terminal() {
            return;
        }
        let (Some(snapshots), Some(contents)) =
            (self.observed.get_mut(&storage), storages.get(storage))
        else {
            return;
        };
        for tag in &self.watched_tags {
            snapshots.insert(tag.clone(), contents.mass_of(tag));
        }
        debug!(entity = %self.entity, storage = %storage, "snapshots reseeded after suppression");
    }

    /// Periodic tick: sweep, reconcile, then persist to the plot mirror.
    pub fn tick(&mut self, ctx: &TickContext<'_>, binding: &mut Binding<'_>) {
        if self.lifecycle.is_terminal() {
            return;
        }
        self.uproot_cooldown = self.uproot_cooldown.saturating_sub(1);
        if !self.lifecycle.accepts_accumulation() {
            return;
        }
        self.sweep(ctx);
        self.reconcile(binding.body.as_deref_mut());
        if let Some(plot) = binding.plot.as_deref_mut() {
            self.persist_to_plot(plot);
        }
    }

    /// Folds external physical-mass changes into tracked mass and pushes the
    /// tracker's own changes into physical mass.
    ///
    /// On the first reconciliation after spawn the physical mass is taken as
    /// ground truth rather than as a gain.
    pub fn reconcile(&mut self, body: Option<&mut (dyn MassBody + '_)>) {
        if !self.lifecycle.accepts_accumulation() {
            return;
        }
        let Some(body) = body else {
            return;
        };
        let eps = self.config.mass_epsilon;
        let physical_now = body.physical_mass_kg();

        let external_delta = if self.awaiting_first_reconcile {
            0.0
        } else {
            physical_now - self.last_observed_physical_kg
        };
        let mut tracker_delta = self.tracked_mass_kg - self.last_applied_tracked_kg;
        if tracker_delta.abs() < eps {
            tracker_delta = 0.0;
        }

        let new_physical = (physical_now + tracker_delta).max(self.config.baseline_mass_kg);
        self.last_applied_tracked_kg =
            (self.last_applied_tracked_kg + external_delta + tracker_delta).max(0.0);
        self.tracked_mass_kg = self.last_applied_tracked_kg;

        if (new_physical - physical_now).abs() > eps {
            body.set_physical_mass_kg(new_physical);
        }
        self.last_observed_physical_kg = new_physical;
        self.awaiting_first_reconcile = false;

        trace!(
            entity = %self.entity,
            external_delta,
            tracker_delta,
            physical_kg = new_physical,
            tracked_kg = self.tracked_mass_kg,
            "reconciled"
        );
    }

    /// Adjusts tracked mass immediately (floored at 0) and, when a body is
    /// bound, pushes the same delta into physical mass without waiting for the
    /// next reconciliation. Returns the delta actually applied.
    pub fn add_mass_delta(
        &mut self,
        delta_kg: f64,
        body: Option<&mut (dyn MassBody + '_)>,
    ) -> f64 {
        if !self.lifecycle.accepts_accumulation() || !delta_kg.is_finite() {
            return 0.0;
        }
        let before = self.tracked_mass_kg;
        self.tracked_mass_kg = (before + delta_kg).max(0.0);
        let applied = self.tracked_mass_kg - before;

        if let Some(body) = body {
            let new_physical =
                (body.physical_mass_kg() + applied).max(self.config.baseline_mass_kg);
            body.set_physical_mass_kg(new_physical);
            self.last_applied_tracked_kg = (self.last_applied_tracked_kg + applied).max(0.0);
            self.last_observed_physical_kg = new_physical;
        }
        debug!(entity = %self.entity, applied_kg = applied, tracked_kg = self.tracked_mass_kg, "mass delta applied");
        applied
    }

    /// Withholds `kg` from the next harvest only.
    pub fn add_harvest_subtract(&mut self, kg: f64) {
        if kg.is_finite() && kg > 0.0 {
            self.pending_extra_subtract_kg += kg;
        }
    }

    // =========================================================================
    // Harvest / Uproot
    // =========================================================================

    /// Harvest notification: flush, reconcile, distribute, reset to baseline.
    pub fn on_harvest(
        &mut self,
        ctx: &TickContext<'_>,
        binding: &mut Binding<'_>,
        harvest: HarvestContext<'_>,
    ) -> EventOutcome {
        if let Some(outcome) = self.event_gate(ctx) {
            return outcome;
        }
        let report = self.flush_and_distribute(ctx, binding, harvest, DistributionKind::Harvest);
        self.uproot_cooldown = self.config.uproot_cooldown_ticks;
        EventOutcome::Distributed(report)
    }

    /// Uproot notification. Ignored within the post-harvest cooldown.
    pub fn on_uproot(
        &mut self,
        ctx: &TickContext<'_>,
        binding: &mut Binding<'_>,
        harvest: HarvestContext<'_>,
    ) -> EventOutcome {
        if let Some(outcome) = self.event_gate(ctx) {
            return outcome;
        }
        if self.uproot_cooldown > 0 {
            debug!(entity = %self.entity, remaining = self.uproot_cooldown, "uproot within harvest cooldown ignored");
            return EventOutcome::CooledDown;
        }
        let report = self.flush_and_distribute(ctx, binding, harvest, DistributionKind::Uproot);
        EventOutcome::Distributed(report)
    }

    fn event_gate(&self, ctx: &TickContext<'_>) -> Option<EventOutcome> {
        if !self.lifecycle.accepts_events() {
            return Some(EventOutcome::Inactive(self.lifecycle));
        }
        if self
            .site
            .is_some_and(|site| ctx.teardown.is_deconstructing(site))
        {
            return Some(EventOutcome::Deconstructing);
        }
        None
    }

    fn flush_and_distribute(
        &mut self,
        ctx: &TickContext<'_>,
        binding: &mut Binding<'_>,
        harvest: HarvestContext<'_>,
        kind: DistributionKind,
    ) -> DistributionReport {
        self.sweep(ctx);
        self.reconcile(binding.body.as_deref_mut());
        let report = self.distribute(kind, binding.body.as_deref_mut(), harvest);
        if let Some(plot) = binding.plot.as_deref_mut() {
            self.persist_to_plot(plot);
        }
        report
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Moves to `Suppressed`: nothing is counted or paid out any more.
    ///
    /// # Errors
    ///
    /// Fails if the tracker is already in final teardown.
    pub fn suppress(&mut self) -> Result<()> {
        self.lifecycle = self.lifecycle.transition(LifecycleState::Suppressed)?;
        Ok(())
    }

    /// Unsubscribes from every storage, reseeds every snapshot to the current
    /// totals and latches `FinalTeardown`. Repeat calls are no-ops.
    ///
    /// Works from a copy of the storage list, so it is safe to call while a
    /// notification for one of those storages is being dispatched.
    pub fn begin_final_teardown(&mut self, storages: &mut StorageArena) {
        if self.lifecycle.is_terminal() {
            return;
        }
        let ids: Vec<StorageId> = self.observed.keys().copied().collect();
        for id in ids {
            storages.unsubscribe(id, self.entity);
            let (Some(storage), Some(snapshots)) = (storages.get(id), self.observed.get_mut(&id))
            else {
                continue;
            };
            for (tag, previous) in snapshots.iter_mut() {
                *previous = storage.mass_of(tag);
            }
        }
        self.lifecycle = LifecycleState::FinalTeardown;
        debug!(entity = %self.entity, "final teardown latched");
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Writes tracked mass into the plot mirror.
    pub fn persist_to_plot(&self, plot: &mut PlotMassStore) {
        plot.set(self.tracked_mass_kg);
    }

    /// Restores tracked mass from the plot mirror and resyncs the body.
    ///
    /// Returns false if the store is empty or the tracker is terminal.
    pub fn restore_from_plot(
        &mut self,
        plot: &PlotMassStore,
        body: Option<&mut (dyn MassBody + '_)>,
    ) -> bool {
        if self.lifecycle.is_terminal() || plot.is_empty() {
            return false;
        }
        let mass_kg = plot.mass_kg();
        match body {
            Some(body) => {
                let target: &mut dyn MassSyncTarget = &mut *self;
                resync_target(body, Some(target), None, mass_kg);
            }
            None => {
                self.tracked_mass_kg = mass_kg;
                self.last_applied_tracked_kg = mass_kg;
            }
        }
        debug!(entity = %self.entity, mass_kg, "restored from plot");
        true
    }

    /// Persisted state.
    #[must_use]
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            tracked_mass_kg: self.tracked_mass_kg,
        }
    }

    /// Loads persisted state, flooring at 0.
    pub fn restore_snapshot(&mut self, snapshot: TrackerSnapshot) {
        let mass_kg = if snapshot.tracked_mass_kg.is_finite() {
            snapshot.tracked_mass_kg.max(0.0)
        } else {
            0.0
        };
        self.tracked_mass_kg = mass_kg;
        self.last_applied_tracked_kg = mass_kg;
    }
}

impl MassSyncTarget for MassTracker {
    fn resync_mass(&mut self, mass_kg: f64) {
        if self.lifecycle.is_terminal() {
            return;
        }
        let mass_kg = mass_kg.max(0.0);
        self.tracked_mass_kg = mass_kg;
        self.last_applied_tracked_kg = mass_kg;
        self.last_observed_physical_kg = mass_kg;
        self.awaiting_first_reconcile = false;
    }
}
