//! The host world.
//!
//! `World` owns every service the ledger needs and drives the trackers from
//! the host lifecycle:
//!
//! - **spawn / removal / cleanup**: create a tracker (restored from the
//!   site's plot sidecar when there is one), suppress it while the plant is
//!   being taken down, and tear it down
//! - **storage mutation**: every deposit or withdrawal notifies the storage's
//!   observers immediately, iterating over a copy of the observer list
//! - **step**: the periodic tick for every tracker, then carryover expiry
//! - **harvest / uproot**: distribution through the phase-aware spawner
//! - **transform**: destroy and replace a plant in either order, carrying its
//!   mass over exactly once
//! - **deconstruct**: suppress a site's storages and force its trackers into
//!   final teardown; resume every observer when the suppression lifts
//!
//! Plants are processed in id order (`BTreeMap`), so a run is reproducible.
//!
//! # Example
//!
//! ```
//! use harvest_ledger::{Cell, LedgerConfig, MaterialYield, Tag};
//! use harvest_sim::material::{MaterialCatalog, MaterialDef, Phase};
//! use harvest_sim::world::{PlantSpec, World};
//!
//! let mut catalog = MaterialCatalog::new();
//! catalog.insert(MaterialDef::new("Fibre", Phase::Solid, 0.0, 500.0)).unwrap();
//!
//! let mut world = World::new(LedgerConfig::default(), catalog).unwrap();
//! world
//!     .registry_mut()
//!     .register("reed", vec![MaterialYield::new("Fibre", 1.0)], 0.0, None)
//!     .unwrap();
//!
//! let site = world.create_site(Cell::new(0, 0));
//! let reed = world
//!     .spawn_plant(PlantSpec::new("reed", Cell::new(0, 0)).on_site(site))
//!     .unwrap();
//! let water = world.add_storage(Some(site)).unwrap();
//! world.deposit(water, Tag::new("Water"), 10.0).unwrap();
//! world.register_storage(reed, water, &[Tag::new("Water")]).unwrap();
//!
//! world.withdraw(water, &Tag::new("Water"), 6.0).unwrap();
//! world.step(1.0);
//! world.step(1.0);
//!
//! let outcome = world.harvest(reed).unwrap();
//! assert!((outcome.report().unwrap().net_kg - 6.0).abs() < 1e-9);
//! assert!((world.spawner().total_mass_of("Fibre") - 6.0).abs() < 1e-9);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use harvest_ledger::{
    resync_target, ApplyOutcome, Binding, CarryoverBuffer, CarryoverHost, Cell, DistributionKind,
    EntityId, EntityTypeId, EventOutcome, HarvestContext, LedgerConfig, MassSyncTarget,
    MassTracker, Mutation, PlotMassStore, PlotMassStores, SaveOutcome, SiteId, StorageArena,
    StorageId, Tag, TeardownCoordinator, TickContext, YieldModifier, YieldRegistry,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SimError};
use crate::material::MaterialCatalog;
use crate::plant::{Occupant, Plant};
use crate::spawner::OutputSpawner;

/// Default body temperature for new plants (K).
pub const DEFAULT_TEMPERATURE_K: f64 = 293.15;

// =============================================================================
// Host Records
// =============================================================================

/// A planting site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Grid cell of the site.
    pub cell: Cell,
    /// Plant currently bound to the site.
    pub occupant: Option<EntityId>,
}

/// Which half of a transform happens first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOrder {
    /// The old plant is destroyed, then the replacement spawns.
    DestroyFirst,
    /// The replacement spawns while the old plant still exists.
    SpawnFirst,
}

/// A bonus effect applied after a paying harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEffect {
    /// Harvested plant.
    pub entity: EntityId,
    /// Effect id from the yield config.
    pub effect: String,
    /// World tick at which it was applied.
    pub tick: u64,
}

/// Parameters for [`World::spawn_plant`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlantSpec {
    /// Type used for the yield lookup.
    pub entity_type: EntityTypeId,
    /// Grid cell.
    pub cell: Cell,
    /// Planting site, if any.
    pub site: Option<SiteId>,
    /// Physical mass at spawn (kg).
    pub physical_mass_kg: f64,
    /// Body temperature (K).
    pub temperature_k: f64,
}

impl PlantSpec {
    /// A baseline-mass plant at room temperature, not on a site.
    #[must_use]
    pub fn new(entity_type: &str, cell: Cell) -> Self {
        Self {
            entity_type: EntityTypeId::new(entity_type),
            cell,
            site: None,
            physical_mass_kg: 1.0,
            temperature_k: DEFAULT_TEMPERATURE_K,
        }
    }

    /// Places the plant on `site`.
    #[must_use]
    pub fn on_site(mut self, site: SiteId) -> Self {
        self.site = Some(site);
        self
    }

    /// Overrides the physical mass at spawn.
    #[must_use]
    pub fn with_mass(mut self, physical_mass_kg: f64) -> Self {
        self.physical_mass_kg = physical_mass_kg;
        self
    }

    /// Overrides the body temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature_k: f64) -> Self {
        self.temperature_k = temperature_k;
        self
    }
}

// =============================================================================
// Population
// =============================================================================

/// Live plants, planting sites and their plot sidecars.
#[derive(Debug, Clone, Default)]
pub struct Population {
    next_entity: u64,
    next_site: u64,
    occupants: BTreeMap<EntityId, Occupant>,
    sites: BTreeMap<SiteId, Site>,
    plots: PlotMassStores,
}

impl Population {
    /// Looks up a live plant.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Occupant> {
        self.occupants.get(&id)
    }

    /// Live plant ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.occupants.keys().copied().collect()
    }

    /// Number of live plants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    /// Returns true if no plant is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// Looks up a planting site.
    #[must_use]
    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.sites.get(&id)
    }

    /// The plot sidecar of a site.
    #[must_use]
    pub fn plot(&self, site: SiteId) -> Option<&PlotMassStore> {
        self.plots.get(site)
    }
}

impl CarryoverHost for Population {
    fn apply_carryover(&mut self, target: EntityId, mass_kg: f64) -> bool {
        let Some(occupant) = self.occupants.get_mut(&target) else {
            return false;
        };
        let plot = occupant.plant.site.and_then(|site| self.plots.get_mut(site));
        let tracker: &mut dyn MassSyncTarget = &mut occupant.tracker;
        resync_target(&mut occupant.plant, Some(tracker), plot, mass_kg);
        true
    }
}

// =============================================================================
// World
// =============================================================================

/// Host simulation that owns the ledger services.
#[derive(Debug)]
pub struct World {
    config: LedgerConfig,
    registry: YieldRegistry,
    teardown: TeardownCoordinator,
    carryover: CarryoverBuffer,
    storages: StorageArena,
    population: Population,
    spawner: OutputSpawner,
    effects: Vec<AppliedEffect>,
    time_secs: f64,
    tick: u64,
}

impl World {
    /// Creates an empty world.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn new(config: LedgerConfig, catalog: MaterialCatalog) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: YieldRegistry::new(),
            teardown: TeardownCoordinator::new(),
            carryover: CarryoverBuffer::new(config.carryover),
            storages: StorageArena::new(),
            population: Population::default(),
            spawner: OutputSpawner::new(catalog),
            effects: Vec::new(),
            time_secs: 0.0,
            tick: 0,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Ledger tunables.
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The yield table.
    #[must_use]
    pub fn registry(&self) -> &YieldRegistry {
        &self.registry
    }

    /// Mutable access to the yield table.
    pub fn registry_mut(&mut self) -> &mut YieldRegistry {
        &mut self.registry
    }

    /// Suppression and deconstruction state.
    #[must_use]
    pub fn teardown(&self) -> &TeardownCoordinator {
        &self.teardown
    }

    /// The transform carryover buffer.
    #[must_use]
    pub fn carryover(&self) -> &CarryoverBuffer {
        &self.carryover
    }

    /// Every storage.
    #[must_use]
    pub fn storages(&self) -> &StorageArena {
        &self.storages
    }

    /// Plants and sites.
    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// The output spawner.
    #[must_use]
    pub fn spawner(&self) -> &OutputSpawner {
        &self.spawner
    }

    /// Mutable access to the output spawner.
    pub fn spawner_mut(&mut self) -> &mut OutputSpawner {
        &mut self.spawner
    }

    /// Bonus effects applied so far.
    #[must_use]
    pub fn effects(&self) -> &[AppliedEffect] {
        &self.effects
    }

    /// Simulated time (s).
    #[must_use]
    pub fn time_secs(&self) -> f64 {
        self.time_secs
    }

    /// Number of completed steps.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Tracker of a live plant.
    #[must_use]
    pub fn tracker(&self, id: EntityId) -> Option<&MassTracker> {
        self.population.get(id).map(|o| &o.tracker)
    }

    /// Physical side of a live plant.
    #[must_use]
    pub fn plant(&self, id: EntityId) -> Option<&Plant> {
        self.population.get(id).map(|o| &o.plant)
    }

    fn occupant_mut(&mut self, id: EntityId) -> Result<&mut Occupant> {
        self.population
            .occupants
            .get_mut(&id)
            .ok_or(SimError::UnknownEntity(id))
    }

    // =========================================================================
    // Sites and Storages
    // =========================================================================

    /// Creates a planting site at `cell` and attaches its plot sidecar.
    pub fn create_site(&mut self, cell: Cell) -> SiteId {
        let site = SiteId::new(self.population.next_site);
        self.population.next_site += 1;
        self.population.sites.insert(
            site,
            Site {
                cell,
                occupant: None,
            },
        );
        if !self.registry.attach_sidecar(site, &mut self.population.plots) {
            debug!(site = %site, "site created before any yield config; no plot sidecar");
        }
        site
    }

    /// Destroys a site, cleaning up its occupant and its owned storages.
    ///
    /// # Errors
    ///
    /// Fails if the site does not exist.
    pub fn destroy_site(&mut self, site: SiteId) -> Result<()> {
        let Some(entry) = self.population.sites.get(&site) else {
            return Err(SimError::UnknownSite(site));
        };
        if let Some(occupant) = entry.occupant {
            self.cleanup(occupant)?;
        }
        // The storages are destroyed below, so nothing needs resuming.
        let _ = self.teardown.end_deconstruction(site);
        for storage in self.storages.owned_by(site) {
            self.storages.destroy(storage);
        }
        self.population.plots.detach(site);
        self.population.sites.remove(&site);
        debug!(site = %site, "site destroyed");
        Ok(())
    }

    /// Creates a storage, optionally owned by a planting site.
    ///
    /// # Errors
    ///
    /// Fails if `owner` names an unknown site.
    pub fn add_storage(&mut self, owner: Option<SiteId>) -> Result<StorageId> {
        if let Some(site) = owner {
            if !self.population.sites.contains_key(&site) {
                return Err(SimError::UnknownSite(site));
            }
        }
        Ok(self.storages.create(owner))
    }

    /// Adds mass to a storage and notifies its observers.
    ///
    /// Returns the mass credited to trackers (deposits credit nothing).
    ///
    /// # Errors
    ///
    /// Fails if the storage does not exist.
    pub fn deposit(&mut self, storage: StorageId, tag: Tag, mass_kg: f64) -> Result<f64> {
        if self.storages.get(storage).is_none() {
            return Err(SimError::UnknownStorage(storage));
        }
        match self.storages.deposit(storage, tag, mass_kg) {
            Some(mutation) => Ok(self.dispatch(&mutation)),
            None => Ok(0.0),
        }
    }

    /// Removes mass from a storage and notifies its observers.
    ///
    /// Returns the mass actually removed.
    ///
    /// # Errors
    ///
    /// Fails if the storage does not exist.
    pub fn withdraw(&mut self, storage: StorageId, tag: &Tag, mass_kg: f64) -> Result<f64> {
        if self.storages.get(storage).is_none() {
            return Err(SimError::UnknownStorage(storage));
        }
        let Some(mutation) = self.storages.withdraw(storage, tag, mass_kg) else {
            return Ok(0.0);
        };
        self.dispatch(&mutation);
        Ok(mutation.moved_kg)
    }

    /// Delivers a mutation to the observers captured when it happened.
    fn dispatch(&mut self, mutation: &Mutation) -> f64 {
        let ctx = TickContext {
            storages: &self.storages,
            teardown: &self.teardown,
        };
        let mut credited = 0.0;
        for observer in &mutation.observers {
            if let Some(occupant) = self.population.occupants.get_mut(observer) {
                credited += occupant.tracker.on_storage_mutated(&ctx, mutation.storage);
            }
        }
        credited
    }

    // =========================================================================
    // Plant Lifecycle
    // =========================================================================

    /// Spawns a plant and its tracker.
    ///
    /// The tracker copies the registry's yield config for the plant's type.
    /// A plant on a site binds to the site's plot sidecar and restores its
    /// tracked mass from it.
    ///
    /// # Errors
    ///
    /// Fails if `spec.site` names an unknown site.
    pub fn spawn_plant(&mut self, spec: PlantSpec) -> Result<EntityId> {
        if let Some(site) = spec.site {
            if !self.population.sites.contains_key(&site) {
                return Err(SimError::UnknownSite(site));
            }
        }
        let id = EntityId::new(self.population.next_entity);
        self.population.next_entity += 1;

        let mut tracker = MassTracker::new(id, spec.site, self.config);
        match self.registry.lookup(spec.entity_type.as_str()) {
            Some(config) => tracker.initialize_from_config(config),
            None => warn!(
                entity = %id,
                entity_type = %spec.entity_type,
                "no yield config registered; nothing will be distributed"
            ),
        }

        let mut plant = Plant {
            id,
            entity_type: spec.entity_type,
            site: spec.site,
            cell: spec.cell,
            physical_mass_kg: spec.physical_mass_kg,
            temperature_k: spec.temperature_k,
        };

        if let Some(site) = spec.site {
            self.teardown.bind_plot(site, id);
            if let Some(entry) = self.population.sites.get_mut(&site) {
                entry.occupant = Some(id);
            }
            if let Some(plot) = self.population.plots.get(site) {
                tracker.restore_from_plot(plot, Some(&mut plant));
            }
        }

        debug!(entity = %id, entity_type = %plant.entity_type, "plant spawned");
        self.population.occupants.insert(
            id,
            Occupant {
                plant,
                tracker,
                modifier: None,
            },
        );
        Ok(id)
    }

    /// Removes a plant: persists its mass to its plot (when it still owns
    /// the site), unbinds it, suppresses it and latches final teardown.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn cleanup(&mut self, id: EntityId) -> Result<()> {
        let Some(mut occupant) = self.population.occupants.remove(&id) else {
            return Err(SimError::UnknownEntity(id));
        };

        if let Some(site) = occupant.plant.site {
            let owns_site = self
                .population
                .sites
                .get(&site)
                .is_some_and(|entry| entry.occupant == Some(id));
            if owns_site {
                if !occupant.tracker.lifecycle().is_terminal() {
                    if let Some(plot) = self.population.plots.get_mut(site) {
                        occupant.tracker.persist_to_plot(plot);
                    }
                }
                if let Some(entry) = self.population.sites.get_mut(&site) {
                    entry.occupant = None;
                }
            }
            self.teardown.unbind_plot(site, id);
        }

        suppress_tracker(&mut occupant.tracker);
        occupant.tracker.begin_final_teardown(&mut self.storages);
        self.carryover.cancel_pending(id);
        debug!(entity = %id, "plant cleaned up");
        Ok(())
    }

    /// Marks a plant as being taken down.
    ///
    /// Its tracker moves to `Suppressed`: nothing is counted, reconciled or
    /// paid out any more, and harvest or uproot report it as inactive. The
    /// plant stays alive until [`World::cleanup`].
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist or its tracker is already in final
    /// teardown.
    pub fn begin_removal(&mut self, entity: EntityId) -> Result<()> {
        let occupant = self.occupant_mut(entity)?;
        occupant.tracker.suppress()?;
        debug!(entity = %entity, "plant removal started");
        Ok(())
    }

    /// Watches `tags` on `storage` for a plant.
    ///
    /// Returns true if the plant newly subscribed.
    ///
    /// # Errors
    ///
    /// Fails if the plant or the storage does not exist.
    pub fn register_storage(
        &mut self,
        entity: EntityId,
        storage: StorageId,
        tags: &[Tag],
    ) -> Result<bool> {
        if self.storages.get(storage).is_none() {
            return Err(SimError::UnknownStorage(storage));
        }
        let occupant = self
            .population
            .occupants
            .get_mut(&entity)
            .ok_or(SimError::UnknownEntity(entity))?;
        Ok(occupant
            .tracker
            .register_storage(&mut self.storages, storage, tags))
    }

    /// Excludes a storage from a plant's accounting.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn ignore_storage(&mut self, entity: EntityId, storage: StorageId) -> Result<()> {
        self.occupant_mut(entity)?.tracker.ignore_storage(storage);
        Ok(())
    }

    /// Excludes a storage and drops the plant's subscription to it.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn ignore_and_unregister(&mut self, entity: EntityId, storage: StorageId) -> Result<()> {
        let occupant = self
            .population
            .occupants
            .get_mut(&entity)
            .ok_or(SimError::UnknownEntity(entity))?;
        occupant
            .tracker
            .ignore_and_unregister(&mut self.storages, storage);
        Ok(())
    }

    /// Attaches or removes a plant's yield supplement.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn set_modifier(&mut self, entity: EntityId, modifier: Option<YieldModifier>) -> Result<()> {
        self.occupant_mut(entity)?.modifier = modifier;
        Ok(())
    }

    // =========================================================================
    // Direct Mass Changes
    // =========================================================================

    /// Writes a plant's physical mass the way an unrelated subsystem would.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn set_physical_mass(&mut self, entity: EntityId, mass_kg: f64) -> Result<()> {
        self.occupant_mut(entity)?.plant.physical_mass_kg = mass_kg;
        Ok(())
    }

    /// Feeds (or drains) a plant with instant physical feedback.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn add_mass_delta(&mut self, entity: EntityId, delta_kg: f64) -> Result<f64> {
        let occupant = self.occupant_mut(entity)?;
        Ok(occupant
            .tracker
            .add_mass_delta(delta_kg, Some(&mut occupant.plant)))
    }

    /// Withholds extra mass from a plant's next harvest.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn add_harvest_subtract(&mut self, entity: EntityId, kg: f64) -> Result<()> {
        self.occupant_mut(entity)?.tracker.add_harvest_subtract(kg);
        Ok(())
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advances the world by one tick of `dt_secs`.
    pub fn step(&mut self, dt_secs: f64) {
        if dt_secs.is_finite() && dt_secs > 0.0 {
            self.time_secs += dt_secs;
        }
        self.tick += 1;

        let ctx = TickContext {
            storages: &self.storages,
            teardown: &self.teardown,
        };
        let Population {
            occupants, plots, ..
        } = &mut self.population;
        for occupant in occupants.values_mut() {
            let plot = occupant.plant.site.and_then(|site| plots.get_mut(site));
            let mut binding = Binding::body(&mut occupant.plant).with_plot(plot);
            occupant.tracker.tick(&ctx, &mut binding);
        }

        let expired = self.carryover.expire(self.time_secs);
        if expired > 0 {
            debug!(expired, "carryover entries expired");
        }
    }

    // =========================================================================
    // Harvest / Uproot
    // =========================================================================

    /// Harvests a plant. A paying harvest applies the configured bonus effect.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn harvest(&mut self, entity: EntityId) -> Result<EventOutcome> {
        let outcome = self.distribute(entity, DistributionKind::Harvest)?;
        if let Some(effect) = outcome.report().and_then(|r| r.bonus_effect.clone()) {
            info!(entity = %entity, effect = %effect, "bonus effect applied");
            self.effects.push(AppliedEffect {
                entity,
                effect,
                tick: self.tick,
            });
        }
        Ok(outcome)
    }

    /// Uproots a plant. The plant stays alive until [`World::cleanup`].
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn uproot(&mut self, entity: EntityId) -> Result<EventOutcome> {
        self.distribute(entity, DistributionKind::Uproot)
    }

    fn distribute(&mut self, entity: EntityId, kind: DistributionKind) -> Result<EventOutcome> {
        let ctx = TickContext {
            storages: &self.storages,
            teardown: &self.teardown,
        };
        let Population {
            occupants, plots, ..
        } = &mut self.population;
        let occupant = occupants
            .get_mut(&entity)
            .ok_or(SimError::UnknownEntity(entity))?;

        let plot = occupant.plant.site.and_then(|site| plots.get_mut(site));
        let mut binding = Binding::body(&mut occupant.plant).with_plot(plot);
        let harvest = HarvestContext {
            modifier: occupant.modifier.as_ref(),
            spawner: &mut self.spawner,
        };
        let outcome = match kind {
            DistributionKind::Harvest => occupant.tracker.on_harvest(&ctx, &mut binding, harvest),
            DistributionKind::Uproot => occupant.tracker.on_uproot(&ctx, &mut binding, harvest),
        };
        Ok(outcome)
    }

    // =========================================================================
    // Transform
    // =========================================================================

    /// Saves a plant's physical mass for a replacement in the same cell.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn save_mass(&mut self, entity: EntityId) -> Result<SaveOutcome> {
        let source = self
            .population
            .get(entity)
            .ok_or(SimError::UnknownEntity(entity))?
            .plant
            .clone();
        Ok(self
            .carryover
            .save_mass(entity, &source, self.time_secs, &mut self.population))
    }

    /// Applies a saved mass to a freshly spawned replacement, or waits for one.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn try_apply_mass(&mut self, entity: EntityId) -> Result<ApplyOutcome> {
        let cell = self
            .population
            .get(entity)
            .ok_or(SimError::UnknownEntity(entity))?
            .plant
            .cell;
        Ok(self
            .carryover
            .try_apply_mass(entity, cell, self.time_secs, &mut self.population))
    }

    /// Replaces a plant with one of `entity_type` in the same cell and site.
    ///
    /// The old plant's physical mass moves to the replacement exactly once,
    /// whichever half runs first. Returns the replacement's id.
    ///
    /// # Errors
    ///
    /// Fails if the plant does not exist.
    pub fn transform(
        &mut self,
        entity: EntityId,
        entity_type: &str,
        order: TransformOrder,
    ) -> Result<EntityId> {
        let old = self
            .population
            .get(entity)
            .ok_or(SimError::UnknownEntity(entity))?;
        let mut spec = PlantSpec::new(entity_type, old.plant.cell)
            .with_mass(self.config.baseline_mass_kg)
            .with_temperature(old.plant.temperature_k);
        spec.site = old.plant.site;

        let replacement = match order {
            TransformOrder::DestroyFirst => {
                self.save_mass(entity)?;
                self.cleanup(entity)?;
                let replacement = self.spawn_plant(spec)?;
                self.try_apply_mass(replacement)?;
                replacement
            }
            TransformOrder::SpawnFirst => {
                let replacement = self.spawn_plant(spec)?;
                self.try_apply_mass(replacement)?;
                self.save_mass(entity)?;
                self.cleanup(entity)?;
                replacement
            }
        };
        info!(from = %entity, to = %replacement, order = ?order, "plant transformed");
        Ok(replacement)
    }

    // =========================================================================
    // Deconstruction
    // =========================================================================

    /// Starts deconstructing a site and forces its bound trackers into final
    /// teardown. Returns the trackers that were torn down.
    ///
    /// # Errors
    ///
    /// Fails if the site does not exist.
    pub fn begin_deconstruction(&mut self, site: SiteId) -> Result<Vec<EntityId>> {
        if !self.population.sites.contains_key(&site) {
            return Err(SimError::UnknownSite(site));
        }
        let doomed = self.teardown.begin_deconstruction(site, &self.storages);
        for id in &doomed {
            if let Some(occupant) = self.population.occupants.get_mut(id) {
                suppress_tracker(&mut occupant.tracker);
                occupant.tracker.begin_final_teardown(&mut self.storages);
            }
        }
        info!(site = %site, trackers = doomed.len(), "deconstruction started");
        Ok(doomed)
    }

    /// Ends or cancels a site's deconstruction.
    ///
    /// Every plant watching one of the site's storages is resumed right away,
    /// so what changed while suppressed is never counted and the very next
    /// mutation is.
    pub fn end_deconstruction(&mut self, site: SiteId) {
        let resumed = self.teardown.end_deconstruction(site);
        if resumed.is_empty() {
            return;
        }
        for occupant in self.population.occupants.values_mut() {
            for &storage in &resumed {
                occupant.tracker.resume_storage(&self.storages, storage);
            }
        }
        debug!(site = %site, storages = resumed.len(), "site storages resumed");
    }

    // =========================================================================
    // Determinism
    // =========================================================================

    /// Hash of every plant's mass state and every spawned output.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        for (id, occupant) in &self.population.occupants {
            id.hash(&mut hasher);
            occupant.tracker.tracked_mass_kg().to_bits().hash(&mut hasher);
            occupant.plant.physical_mass_kg.to_bits().hash(&mut hasher);
            occupant.tracker.lifecycle().hash(&mut hasher);
        }
        for output in self.spawner.outputs() {
            output.material.hash(&mut hasher);
            output.mass_kg.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Moves a live tracker to `Suppressed` ahead of its final teardown.
fn suppress_tracker(tracker: &mut MassTracker) {
    if tracker.lifecycle().is_terminal() {
        return;
    }
    if let Err(err) = tracker.suppress() {
        warn!(entity = %tracker.entity(), error = %err, "could not suppress tracker");
    }
}
