//! Scenario tests for the host world.
//!
//! - `determinism.rs`: seeded soak runs reproduce the same state
//! - `integration.rs`: end-to-end lifecycle scenarios
//! - `helpers.rs`: world and garden setup utilities

mod determinism;
mod helpers;

pub use helpers::*;
