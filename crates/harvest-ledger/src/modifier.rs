//! Per-entity yield supplement.
//!
//! A [`YieldModifier`] is attached to a single entity and consulted during
//! distribution. For each event kind it either replaces the base yield list
//! (`override = true` with a non-empty list) or merges into it additively,
//! keyed by material.

use serde::{Deserialize, Serialize};

use crate::material::MaterialYield;

/// What triggered a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionKind {
    /// Harvest: subject to the configured and pending subtractions.
    Harvest,
    /// Uproot / dig: the whole net mass is distributed.
    Uproot,
}

/// Optional override/merge supplement for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YieldModifier {
    /// Yields applied on harvest.
    pub harvest_yields: Vec<MaterialYield>,
    /// Replace rather than merge on harvest.
    pub override_harvest_yields: bool,
    /// Yields applied on uproot / dig.
    pub dig_yields: Vec<MaterialYield>,
    /// Replace rather than merge on uproot / dig.
    pub override_dig_yields: bool,
}

impl YieldModifier {
    /// Returns the supplement list and override flag for `kind`.
    #[must_use]
    pub fn for_kind(&self, kind: DistributionKind) -> (&[MaterialYield], bool) {
        match kind {
            DistributionKind::Harvest => (&self.harvest_yields, self.override_harvest_yields),
            DistributionKind::Uproot => (&self.dig_yields, self.override_dig_yields),
        }
    }

    /// Computes the effective yield list for `kind` from a base list.
    ///
    /// # Example
    ///
    /// ```
    /// use harvest_ledger::{DistributionKind, MaterialYield, YieldModifier};
    ///
    /// let modifier = YieldModifier {
    ///     harvest_yields: vec![MaterialYield::new("A", 0.25), MaterialYield::new("C", 0.1)],
    ///     ..YieldModifier::default()
    /// };
    /// let base = [MaterialYield::new("A", 0.5)];
    /// let effective = modifier.apply(&base, DistributionKind::Harvest);
    /// assert_eq!(effective, vec![MaterialYield::new("A", 0.75), MaterialYield::new("C", 0.1)]);
    /// ```
    #[must_use]
    pub fn apply(&self, base: &[MaterialYield], kind: DistributionKind) -> Vec<MaterialYield> {
        let (extra, replace) = self.for_kind(kind);
        if extra.is_empty() {
            return base.to_vec();
        }
        if replace {
            return extra.to_vec();
        }
        let mut merged = base.to_vec();
        for entry in extra {
            match merged.iter_mut().find(|m| m.material == entry.material) {
                Some(existing) => existing.multiplier += entry.multiplier,
                None => merged.push(entry.clone()),
            }
        }
        merged
    }
}

/// Effective yield list for an optional modifier.
#[must_use]
pub fn effective_yields(
    base: &[MaterialYield],
    modifier: Option<&YieldModifier>,
    kind: DistributionKind,
) -> Vec<MaterialYield> {
    match modifier {
        Some(modifier) => modifier.apply(base, kind),
        None => base.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Vec<MaterialYield> {
        vec![MaterialYield::new("A", 0.5), MaterialYield::new("B", 0.5)]
    }

    #[test]
    fn no_modifier_clones_base() {
        assert_eq!(effective_yields(&base(), None, DistributionKind::Harvest), base());
    }

    #[test]
    fn override_replaces_base() {
        let modifier = YieldModifier {
            harvest_yields: vec![MaterialYield::new("C", 1.0)],
            override_harvest_yields: true,
            ..YieldModifier::default()
        };
        assert_eq!(
            modifier.apply(&base(), DistributionKind::Harvest),
            vec![MaterialYield::new("C", 1.0)]
        );
        // Dig list is empty, so uproot keeps the base.
        assert_eq!(modifier.apply(&base(), DistributionKind::Uproot), base());
    }

    #[test]
    fn override_with_empty_list_keeps_base() {
        let modifier = YieldModifier {
            override_dig_yields: true,
            ..YieldModifier::default()
        };
        assert_eq!(modifier.apply(&base(), DistributionKind::Uproot), base());
    }

    #[test]
    fn merge_sums_existing_and_appends_new() {
        let modifier = YieldModifier {
            dig_yields: vec![MaterialYield::new("B", 0.25), MaterialYield::new("D", 0.1)],
            ..YieldModifier::default()
        };
        assert_eq!(
            modifier.apply(&base(), DistributionKind::Uproot),
            vec![
                MaterialYield::new("A", 0.5),
                MaterialYield::new("B", 0.75),
                MaterialYield::new("D", 0.1),
            ]
        );
    }
}
