//! Tracker lifecycle state machine.
//!
//! ```text
//! Active ──▶ Suppressed ──▶ FinalTeardown
//!    └──────────────────────────▲
//! ```
//!
//! Transitions only move forward. `FinalTeardown` is terminal; re-requesting
//! the current state is accepted as a no-op so teardown stays idempotent.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Lifecycle of a [`MassTracker`](crate::tracker::MassTracker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Accumulating, reconciling and distributing normally.
    Active,
    /// The entity is being taken down; nothing is counted or paid out.
    Suppressed,
    /// Unsubscribed and latched. Terminal.
    FinalTeardown,
}

impl LifecycleState {
    /// Returns true if `self -> to` is an edge of the transition table.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Active, Self::Suppressed | Self::FinalTeardown)
                | (Self::Suppressed, Self::FinalTeardown)
        )
    }

    /// Returns the next state, rejecting backward edges.
    ///
    /// Requesting the current state returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransition`] for any non-forward edge.
    pub fn transition(self, to: Self) -> Result<Self> {
        if self == to || self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(LedgerError::InvalidTransition { from: self, to })
        }
    }

    /// Storage deltas and direct mass adjustments are only counted while active.
    #[must_use]
    pub const fn accepts_accumulation(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Harvest and uproot events are only processed while active.
    #[must_use]
    pub const fn accepts_events(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns true once the state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::FinalTeardown)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Suppressed => write!(f, "Suppressed"),
            Self::FinalTeardown => write!(f, "FinalTeardown"),
        }
    }
}
