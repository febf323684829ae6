//! Carryover of mass across an entity destroy/replace transition.
//!
//! Some entities are destroyed and immediately replaced by a different entity
//! in the same cell (a *transform*). The two halves can arrive in either order:
//!
//! - **Save first**: [`CarryoverBuffer::save_mass`] stores a [`SaveEntry`];
//!   the replacement's [`CarryoverBuffer::try_apply_mass`] consumes it.
//! - **Spawn first**: `try_apply_mass` finds nothing and leaves a
//!   [`PendingEntry`]; the later `save_mass` applies straight to it.
//!
//! Either way the mass is applied exactly once. Entries expire after the TTL
//! so a stale save is never applied to an unrelated later occupant of the
//! cell, and repeated saves of the same transition within the dedupe window
//! collapse into one.
//!
//! Applying goes through [`CarryoverHost`], which the host implements by
//! locating the target and calling [`resync_target`].

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::body::MassBody;
use crate::config::CarryoverConfig;
use crate::ids::{Cell, EntityId};
use crate::plot_store::PlotMassStore;

// =============================================================================
// Capabilities
// =============================================================================

/// Narrow resync surface a tracker exposes to the carryover path.
pub trait MassSyncTarget {
    /// Adopts `mass_kg` as tracked mass *and* as the reconciliation snapshots,
    /// so the next tick does not see the carried mass as an external delta.
    fn resync_mass(&mut self, mass_kg: f64);
}

/// Host-side application of carried mass to a target entity.
pub trait CarryoverHost {
    /// Applies `mass_kg` to `target`. Returns false if the target is gone.
    fn apply_carryover(&mut self, target: EntityId, mass_kg: f64) -> bool;
}

/// Writes carried mass into every view of the target: physical mass, tracker
/// state and the plot-level mirror.
pub fn resync_target(
    body: &mut dyn MassBody,
    tracker: Option<&mut dyn MassSyncTarget>,
    plot: Option<&mut PlotMassStore>,
    mass_kg: f64,
) {
    let mass_kg = mass_kg.max(0.0);
    body.set_physical_mass_kg(mass_kg);
    if let Some(tracker) = tracker {
        tracker.resync_mass(mass_kg);
    }
    if let Some(plot) = plot {
        plot.set(mass_kg);
    }
}

// =============================================================================
// Entries and Outcomes
// =============================================================================

/// Mass saved from a destroyed source, waiting for its replacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaveEntry {
    /// Carried mass (kg).
    pub mass_kg: f64,
    /// Simulation time of the save (s).
    pub saved_at: f64,
}

/// A replacement that spawned before its source was saved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingEntry {
    /// The replacement entity.
    pub target: EntityId,
    /// Simulation time of the spawn (s).
    pub spawned_at: f64,
}

/// The last save seen in a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LastSave {
    source: EntityId,
    at: f64,
}

/// Map key for a cell. `IVec2` is not `Ord`.
type CellKey = (i32, i32);

fn key(cell: Cell) -> CellKey {
    (cell.x, cell.y)
}

/// Result of [`CarryoverBuffer::save_mass`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SaveOutcome {
    /// A pending replacement received the mass immediately.
    Applied {
        /// The replacement.
        target: EntityId,
        /// Mass applied (kg).
        mass_kg: f64,
    },
    /// Stored for a replacement that has not spawned yet.
    Stored,
    /// Collapsed into an earlier save from the same source.
    Deduped,
}

/// Result of [`CarryoverBuffer::try_apply_mass`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyOutcome {
    /// A fresh save was applied to the target.
    Applied {
        /// Mass applied (kg).
        mass_kg: f64,
    },
    /// Nothing to apply yet; the target now waits for a save.
    Pending,
    /// A save existed but the host could not locate the target.
    TargetMissing,
}

// =============================================================================
// Carryover Buffer
// =============================================================================

/// Cell-keyed, time-bounded carryover table.
///
/// # Example
///
/// ```
/// use harvest_ledger::{ApplyOutcome, CarryoverBuffer, CarryoverConfig, CarryoverHost, EntityId};
/// use harvest_ledger::{Cell, MassBody};
///
/// struct Source(f64);
/// impl MassBody for Source {
///     fn physical_mass_kg(&self) -> f64 { self.0 }
///     fn set_physical_mass_kg(&mut self, m: f64) { self.0 = m; }
///     fn temperature_k(&self) -> f64 { 300.0 }
///     fn cell(&self) -> Cell { Cell::new(1, 1) }
/// }
///
/// struct Host(Vec<(EntityId, f64)>);
/// impl CarryoverHost for Host {
///     fn apply_carryover(&mut self, target: EntityId, mass_kg: f64) -> bool {
///         self.0.push((target, mass_kg));
///         true
///     }
/// }
///
/// let mut buffer = CarryoverBuffer::new(CarryoverConfig::default());
/// let mut host = Host(Vec::new());
/// buffer.save_mass(EntityId::new(1), &Source(6.0), 10.0, &mut host);
/// let outcome = buffer.try_apply_mass(EntityId::new(2), Cell::new(1, 1), 10.5, &mut host);
/// assert_eq!(outcome, ApplyOutcome::Applied { mass_kg: 6.0 });
/// assert_eq!(host.0, vec![(EntityId::new(2), 6.0)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CarryoverBuffer {
    config: CarryoverConfig,
    saves: BTreeMap<CellKey, SaveEntry>,
    pending: BTreeMap<CellKey, PendingEntry>,
    /// Source and time of the last save per cell, kept after the save is
    /// consumed so a duplicate save of an already-applied transition is still
    /// collapsed. A different source is a new transition and never collapses.
    last_save: BTreeMap<CellKey, LastSave>,
}

impl CarryoverBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new(config: CarryoverConfig) -> Self {
        Self {
            config,
            saves: BTreeMap::new(),
            pending: BTreeMap::new(),
            last_save: BTreeMap::new(),
        }
    }

    /// Timing in use.
    #[must_use]
    pub fn config(&self) -> CarryoverConfig {
        self.config
    }

    /// Saves the physical mass of `source` (entity `source_id`) for its cell.
    ///
    /// A repeated save from the same source within the dedupe window is
    /// collapsed. Saves from different sources are distinct transitions, even
    /// in the same cell and the same instant.
    pub fn save_mass(
        &mut self,
        source_id: EntityId,
        source: &dyn MassBody,
        now: f64,
        host: &mut dyn CarryoverHost,
    ) -> SaveOutcome {
        let cell = source.cell();
        let mass_kg = source.physical_mass_kg().max(0.0);
        self.purge_cell(cell, now);

        if let Some(last) = self.last_save.get(&key(cell)) {
            if last.source == source_id && now - last.at < self.config.dedupe_secs {
                debug!(cell = ?cell, source = %source_id, mass_kg, "carryover save deduped");
                return SaveOutcome::Deduped;
            }
        }
        self.last_save.insert(
            key(cell),
            LastSave {
                source: source_id,
                at: now,
            },
        );

        if let Some(pending) = self.pending.remove(&key(cell)) {
            if host.apply_carryover(pending.target, mass_kg) {
                self.saves.remove(&key(cell));
                debug!(cell = ?cell, target = %pending.target, mass_kg, "carryover applied to pending target");
                return SaveOutcome::Applied {
                    target: pending.target,
                    mass_kg,
                };
            }
            warn!(cell = ?cell, target = %pending.target, "pending carryover target vanished");
        }

        self.saves.insert(key(cell), SaveEntry { mass_kg, saved_at: now });
        debug!(cell = ?cell, mass_kg, "carryover saved");
        SaveOutcome::Stored
    }

    /// Offers a freshly spawned `target` in `cell` any saved mass.
    pub fn try_apply_mass(
        &mut self,
        target: EntityId,
        cell: Cell,
        now: f64,
        host: &mut dyn CarryoverHost,
    ) -> ApplyOutcome {
        self.purge_cell(cell, now);

        if let Some(save) = self.saves.remove(&key(cell)) {
            if host.apply_carryover(target, save.mass_kg) {
                debug!(cell = ?cell, target = %target, mass_kg = save.mass_kg, "carryover applied");
                return ApplyOutcome::Applied {
                    mass_kg: save.mass_kg,
                };
            }
            // Keep the save for a replacement the host can actually locate.
            self.saves.insert(key(cell), save);
            warn!(cell = ?cell, target = %target, "carryover target not found");
            return ApplyOutcome::TargetMissing;
        }

        self.pending.insert(
            key(cell),
            PendingEntry {
                target,
                spawned_at: now,
            },
        );
        debug!(cell = ?cell, target = %target, "carryover pending");
        ApplyOutcome::Pending
    }

    /// Drops any pending entry for `target` (it was cleaned up).
    pub fn cancel_pending(&mut self, target: EntityId) {
        self.pending.retain(|_, pending| pending.target != target);
    }

    /// Discards every expired entry. Returns how many entries were dropped.
    pub fn expire(&mut self, now: f64) -> usize {
        let ttl = self.config.ttl_secs;
        let before = self.saves.len() + self.pending.len();
        self.saves.retain(|_, save| now - save.saved_at <= ttl);
        self.pending.retain(|_, pending| now - pending.spawned_at <= ttl);
        self.last_save.retain(|_, last| now - last.at <= ttl);
        before - (self.saves.len() + self.pending.len())
    }

    /// The unexpired save for `cell`, if any.
    #[must_use]
    pub fn save_at(&self, cell: Cell) -> Option<&SaveEntry> {
        self.saves.get(&key(cell))
    }

    /// The pending replacement for `cell`, if any.
    #[must_use]
    pub fn pending_at(&self, cell: Cell) -> Option<&PendingEntry> {
        self.pending.get(&key(cell))
    }

    /// Number of stored saves.
    #[must_use]
    pub fn saved_count(&self) -> usize {
        self.saves.len()
    }

    /// Number of pending replacements.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn purge_cell(&mut self, cell: Cell, now: f64) {
        let ttl = self.config.ttl_secs;
        if self
            .saves
            .get(&key(cell))
            .is_some_and(|save| now - save.saved_at > ttl)
        {
            self.saves.remove(&key(cell));
            debug!(cell = ?cell, "expired carryover save discarded");
        }
        if self
            .pending
            .get(&key(cell))
            .is_some_and(|pending| now - pending.spawned_at > ttl)
        {
            self.pending.remove(&key(cell));
        }
        if self
            .last_save
            .get(&key(cell))
            .is_some_and(|last| now - last.at > ttl)
        {
            self.last_save.remove(&key(cell));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Source {
        mass: f64,
        cell: Cell,
    }

    impl MassBody for Source {
        fn physical_mass_kg(&self) -> f64 {
            self.mass
        }
        fn set_physical_mass_kg(&mut self, mass_kg: f64) {
            self.mass = mass_kg;
        }
        fn temperature_k(&self) -> f64 {
            293.0
        }
        fn cell(&self) -> Cell {
            self.cell
        }
    }

    #[derive(Default)]
    struct Host {
        applied: Vec<(EntityId, f64)>,
        missing: Vec<EntityId>,
    }

    impl CarryoverHost for Host {
        fn apply_carryover(&mut self, target: EntityId, mass_kg: f64) -> bool {
            if self.missing.contains(&target) {
                return false;
            }
            self.applied.push((target, mass_kg));
            true
        }
    }

    const SOURCE: EntityId = EntityId::new(1);

    fn source(mass: f64) -> Source {
        Source {
            mass,
            cell: Cell::new(4, 2),
        }
    }

    fn buffer() -> CarryoverBuffer {
        CarryoverBuffer::new(CarryoverConfig::default())
    }

    mod ordering_tests {
        use super::*;

        #[test]
        fn save_then_spawn_applies_once() {
            let mut buffer = buffer();
            let mut host = Host::default();
            assert_eq!(buffer.save_mass(SOURCE, &source(8.0), 1.0, &mut host), SaveOutcome::Stored);

            let first = buffer.try_apply_mass(EntityId::new(2), Cell::new(4, 2), 1.2, &mut host);
            assert_eq!(first, ApplyOutcome::Applied { mass_kg: 8.0 });
            let second = buffer.try_apply_mass(EntityId::new(3), Cell::new(4, 2), 1.3, &mut host);
            assert_eq!(second, ApplyOutcome::Pending);
            assert_eq!(host.applied, vec![(EntityId::new(2), 8.0)]);
        }

        #[test]
        fn spawn_then_save_applies_to_pending() {
            let mut buffer = buffer();
            let mut host = Host::default();
            let outcome = buffer.try_apply_mass(EntityId::new(2), Cell::new(4, 2), 1.0, &mut host);
            assert_eq!(outcome, ApplyOutcome::Pending);

            let saved = buffer.save_mass(SOURCE, &source(5.0), 1.1, &mut host);
            assert_eq!(
                saved,
                SaveOutcome::Applied {
                    target: EntityId::new(2),
                    mass_kg: 5.0
                }
            );
            assert_eq!(buffer.saved_count(), 0);
            assert_eq!(buffer.pending_count(), 0);
        }

        #[test]
        fn duplicate_save_after_pending_apply_is_collapsed() {
            let mut buffer = buffer();
            let mut host = Host::default();
            buffer.try_apply_mass(EntityId::new(2), Cell::new(4, 2), 1.0, &mut host);
            buffer.save_mass(SOURCE, &source(5.0), 1.0, &mut host);
            assert_eq!(buffer.save_mass(SOURCE, &source(5.0), 1.05, &mut host), SaveOutcome::Deduped);
            assert_eq!(buffer.saved_count(), 0);
        }

        #[test]
        fn chained_transitions_in_one_instant_each_carry() {
            let mut buffer = buffer();
            let mut host = Host::default();
            assert_eq!(buffer.save_mass(SOURCE, &source(6.0), 1.0, &mut host), SaveOutcome::Stored);
            let first = buffer.try_apply_mass(EntityId::new(2), Cell::new(4, 2), 1.0, &mut host);
            assert_eq!(first, ApplyOutcome::Applied { mass_kg: 6.0 });

            // The replacement is itself replaced before the window closes.
            let second = buffer.save_mass(EntityId::new(2), &source(6.0), 1.0, &mut host);
            assert_eq!(second, SaveOutcome::Stored);
            let third = buffer.try_apply_mass(EntityId::new(3), Cell::new(4, 2), 1.0, &mut host);
            assert_eq!(third, ApplyOutcome::Applied { mass_kg: 6.0 });
            assert_eq!(buffer.saved_count() + buffer.pending_count(), 0);
        }

        #[test]
        fn vanished_pending_target_stores_the_save() {
            let mut buffer = buffer();
            let mut host = Host::default();
            buffer.try_apply_mass(EntityId::new(2), Cell::new(4, 2), 1.0, &mut host);
            host.missing.push(EntityId::new(2));

            assert_eq!(buffer.save_mass(SOURCE, &source(5.0), 1.1, &mut host), SaveOutcome::Stored);
            assert_eq!(buffer.saved_count(), 1);
        }
    }

    mod expiry_tests {
        use super::*;

        #[test]
        fn dedupe_then_expired_apply_registers_pending() {
            let mut buffer = buffer();
            let mut host = Host::default();
            assert_eq!(buffer.save_mass(SOURCE, &source(5.0), 10.0, &mut host), SaveOutcome::Stored);
            assert_eq!(buffer.save_mass(SOURCE, &source(5.0), 10.05, &mut host), SaveOutcome::Deduped);
            assert_eq!(buffer.saved_count(), 1);

            let outcome = buffer.try_apply_mass(EntityId::new(7), Cell::new(4, 2), 13.0, &mut host);
            assert_eq!(outcome, ApplyOutcome::Pending);
            assert!(host.applied.is_empty());
            assert_eq!(buffer.pending_at(Cell::new(4, 2)).unwrap().target, EntityId::new(7));
        }

        #[test]
        fn save_after_dedupe_window_replaces_entry() {
            let mut buffer = buffer();
            let mut host = Host::default();
            buffer.save_mass(SOURCE, &source(5.0), 10.0, &mut host);
            buffer.save_mass(SOURCE, &source(9.0), 10.5, &mut host);
            assert!((buffer.save_at(Cell::new(4, 2)).unwrap().mass_kg - 9.0).abs() < f64::EPSILON);
        }

        #[test]
        fn expired_pending_is_not_fed_by_late_save() {
            let mut buffer = buffer();
            let mut host = Host::default();
            buffer.try_apply_mass(EntityId::new(2), Cell::new(4, 2), 0.0, &mut host);
            assert_eq!(buffer.save_mass(SOURCE, &source(5.0), 5.0, &mut host), SaveOutcome::Stored);
            assert!(host.applied.is_empty());
        }

        #[test]
        fn expire_drops_stale_entries_everywhere() {
            let mut buffer = buffer();
            let mut host = Host::default();
            buffer.save_mass(SOURCE, &source(5.0), 0.0, &mut host);
            buffer.try_apply_mass(EntityId::new(2), Cell::new(9, 9), 0.5, &mut host);
            assert_eq!(buffer.expire(1.0), 0);
            assert_eq!(buffer.expire(3.0), 2);
            assert_eq!(buffer.saved_count() + buffer.pending_count(), 0);
        }

        #[test]
        fn cancel_pending_removes_target() {
            let mut buffer = buffer();
            let mut host = Host::default();
            buffer.try_apply_mass(EntityId::new(2), Cell::new(1, 1), 0.0, &mut host);
            buffer.cancel_pending(EntityId::new(2));
            assert_eq!(buffer.pending_count(), 0);
        }
    }

    mod resync_tests {
        use super::*;

        struct Sync(f64);

        impl MassSyncTarget for Sync {
            fn resync_mass(&mut self, mass_kg: f64) {
                self.0 = mass_kg;
            }
        }

        #[test]
        fn resync_writes_every_view() {
            let mut body = source(1.0);
            let mut tracker = Sync(0.0);
            let mut plot = PlotMassStore::default();
            resync_target(&mut body, Some(&mut tracker), Some(&mut plot), 6.5);
            assert!((body.mass - 6.5).abs() < f64::EPSILON);
            assert!((tracker.0 - 6.5).abs() < f64::EPSILON);
            assert!((plot.mass_kg() - 6.5).abs() < f64::EPSILON);
        }
    }
}
