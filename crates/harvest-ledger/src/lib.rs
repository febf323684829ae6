//! # Harvest Ledger
//!
//! Mass-conservation accounting and yield distribution for growable entities.
//!
//! Every tracked entity carries an authoritative *tracked mass* that reconciles
//! three sources of change:
//!
//! - **Consumption**: mass that disappears from watched storages is credited
//!   to the entity (see [`MassTracker`](tracker::MassTracker)).
//! - **Physical mass**: an independently mutable mirror on the entity that other
//!   subsystems may write; both views are reconciled once per tick.
//! - **Harvest / uproot**: accumulated mass is converted into discrete material
//!   outputs and the entity is reset to the baseline mass.
//!
//! ## Services
//!
//! The process-wide tables are explicit services owned by the host and passed
//! into each tracker call:
//!
//! - [`YieldRegistry`](registry::YieldRegistry): entity type → yield config
//! - [`TeardownCoordinator`](teardown::TeardownCoordinator): storage suppression
//!   and deconstruction guards
//! - [`CarryoverBuffer`](carryover::CarryoverBuffer): carries mass across an
//!   entity destroy/replace transition exactly once
//! - [`PlotMassStores`](plot_store::PlotMassStores): per-site persisted mass
//!
//! ## Usage
//!
//! ```
//! use harvest_ledger::{
//!     Binding, EntityId, LedgerConfig, MassTracker, MaterialYield, StorageArena, Tag,
//!     TeardownCoordinator, TickContext, YieldRegistry,
//! };
//!
//! let mut registry = YieldRegistry::new();
//! registry
//!     .register("fern", vec![MaterialYield::new("fibre", 1.0)], 0.0, None)
//!     .unwrap();
//!
//! let mut storages = StorageArena::new();
//! let soil = storages.create(None);
//! storages.deposit(soil, Tag::new("water"), 10.0);
//!
//! let mut tracker = MassTracker::new(EntityId::new(1), None, LedgerConfig::default());
//! tracker.initialize_from_config(registry.lookup("fern").unwrap());
//! tracker.register_storage(&mut storages, soil, &[Tag::new("water")]);
//!
//! storages.withdraw(soil, &Tag::new("water"), 4.0);
//!
//! let teardown = TeardownCoordinator::new();
//! let ctx = TickContext { storages: &storages, teardown: &teardown };
//! tracker.tick(&ctx, &mut Binding::none());
//! assert!((tracker.tracked_mass_kg() - 5.0).abs() < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod body;
pub mod carryover;
pub mod config;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod material;
pub mod modifier;
pub mod plot_store;
pub mod registry;
pub mod storage;
pub mod teardown;
pub mod tracker;

// Re-exports for convenience
pub use body::{MassBody, MaterialSpawner, SpawnRequest};
pub use carryover::{
    resync_target, ApplyOutcome, CarryoverBuffer, CarryoverHost, MassSyncTarget, SaveOutcome,
};
pub use config::{CarryoverConfig, LedgerConfig};
pub use error::{LedgerError, Result};
pub use ids::{Cell, EntityId, SiteId, StorageId};
pub use lifecycle::LifecycleState;
pub use material::{EntityTypeId, MaterialId, MaterialYield, Tag};
pub use modifier::{DistributionKind, YieldModifier};
pub use plot_store::{PlotMassStore, PlotMassStores};
pub use registry::{YieldConfig, YieldRegistry};
pub use storage::{Item, Mutation, Storage, StorageArena};
pub use teardown::TeardownCoordinator;
pub use tracker::{
    Binding, DistributionReport, EventOutcome, HarvestContext, MassTracker, TickContext,
    TrackerSnapshot,
};
