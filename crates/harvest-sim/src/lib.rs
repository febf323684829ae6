//! # Harvest Sim
//!
//! Reference host simulation for the harvest mass ledger.
//!
//! The ledger treats the host as a set of external collaborators. This crate
//! provides one concrete host that the scenario tests and benchmarks drive:
//!
//! - **Plants**: entities with an independently writable physical mass
//! - **Planting sites**: fixed cells whose plot sidecar outlives the plant
//! - **Storages**: tagged item containers that notify their observers
//! - **Spawner**: phase-aware materialization of distributed yields
//! - **Lifecycle**: spawn, cleanup, tick, harvest, uproot, transform and
//!   deconstruction dispatch
//!
//! ## Usage
//!
//! See [`World`](world::World) for a complete walkthrough.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod material;
pub mod plant;
pub mod spawner;
pub mod world;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use error::{Result, SimError};
pub use material::{MaterialCatalog, MaterialDef, Phase};
pub use plant::{Occupant, Plant};
pub use spawner::{OutputForm, OutputSpawner, SpawnedOutput};
pub use world::{AppliedEffect, PlantSpec, Population, Site, TransformOrder, World};
