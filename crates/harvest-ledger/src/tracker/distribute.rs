//! Yield distribution.
//!
//! Converts the mass an entity accumulated above baseline into material
//! outputs, then resets both mass views to baseline. The distributable amount
//! is the smaller of the tracked and physical excess, so mass present in only
//! one view is never paid out.
//!
//! A harvest additionally withholds the configured per-type subtraction and
//! any pending extra subtraction (which is cleared). An uproot distributes the
//! whole net mass.

use tracing::{debug, info};

use super::{DistributionReport, HarvestContext, MassTracker};
use crate::body::{MassBody, SpawnRequest};
use crate::modifier::{effective_yields, DistributionKind};

impl MassTracker {
    /// Runs one distribution and resets to baseline.
    ///
    /// The reset happens unconditionally, even when nothing was spawned.
    /// Without a bound body the physical excess is zero, so nothing is paid
    /// out.
    pub(super) fn distribute(
        &mut self,
        kind: DistributionKind,
        mut body: Option<&mut (dyn MassBody + '_)>,
        harvest: HarvestContext<'_>,
    ) -> DistributionReport {
        let baseline = self.config.baseline_mass_kg;
        let eps = self.config.mass_epsilon;

        let tracked_excess_kg = (self.tracked_mass_kg - baseline).max(0.0);
        let physical_excess_kg = body
            .as_deref()
            .map_or(0.0, |b| (b.physical_mass_kg() - baseline).max(0.0));
        let net0 = tracked_excess_kg.min(physical_excess_kg);

        let net_kg = match kind {
            DistributionKind::Harvest => {
                let net1 = (net0 - self.harvest_subtract_kg).max(0.0);
                let net = (net1 - self.pending_extra_subtract_kg).max(0.0);
                self.pending_extra_subtract_kg = 0.0;
                net
            }
            DistributionKind::Uproot => net0,
        };

        let mut outputs = Vec::new();
        let mut bonus_effect = None;
        if net_kg > eps {
            if let Some(body) = body.as_deref() {
                let temperature_k = body.temperature_k();
                let location = body.location();
                for entry in effective_yields(&self.yields, harvest.modifier, kind) {
                    let mass_kg = entry.mass_for(net_kg);
                    if mass_kg <= eps {
                        continue;
                    }
                    let request = SpawnRequest {
                        material: entry.material,
                        mass_kg,
                        temperature_k,
                        location,
                    };
                    harvest.spawner.spawn(&request);
                    outputs.push(request);
                }
            }
            if kind == DistributionKind::Harvest {
                bonus_effect.clone_from(&self.bonus_effect);
            }
            info!(
                entity = %self.entity,
                kind = ?kind,
                net_kg,
                outputs = outputs.len(),
                "yield distributed"
            );
        } else {
            debug!(
                entity = %self.entity,
                kind = ?kind,
                tracked_excess_kg,
                physical_excess_kg,
                "nothing to distribute"
            );
        }

        self.tracked_mass_kg = baseline;
        self.last_applied_tracked_kg = baseline;
        if let Some(body) = body.as_deref_mut() {
            body.set_physical_mass_kg(baseline);
            self.last_observed_physical_kg = baseline;
        }

        DistributionReport {
            kind,
            tracked_excess_kg,
            physical_excess_kg,
            net_kg,
            outputs,
            bonus_effect,
        }
    }
}
