//! Test helper functions for building worlds and gardens.

use harvest_ledger::{Cell, EntityId, LedgerConfig, MaterialYield, SiteId, StorageId, Tag};

use crate::material::{MaterialCatalog, MaterialDef, Phase};
use crate::world::{PlantSpec, World};

// =============================================================================
// Setup
// =============================================================================

/// Installs a test-writer subscriber once. Later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Catalog covering every phase.
pub fn test_catalog() -> MaterialCatalog {
    let mut catalog = MaterialCatalog::new();
    for def in [
        MaterialDef::new("Oxygen", Phase::Gas, 60.0, 1000.0),
        MaterialDef::new("Water", Phase::Liquid, 273.0, 373.0),
        MaterialDef::new("Dirt", Phase::Solid, 0.0, 600.0),
        MaterialDef::new("Fibre", Phase::Solid, 0.0, 500.0),
        MaterialDef::new("Seed", Phase::Discrete, 0.0, 400.0),
    ] {
        catalog.insert(def).unwrap();
    }
    catalog
}

/// A world with three registered plant types.
///
/// - `fern`: half `Dirt`, half `Oxygen`, 2 kg withheld per harvest, bonus
///   effect `fertilized`
/// - `moss`: all `Fibre`
/// - `sapling`: all `Seed`
pub fn test_world() -> World {
    init_tracing();
    let mut world = World::new(LedgerConfig::default(), test_catalog()).unwrap();
    let registry = world.registry_mut();
    registry
        .register(
            "fern",
            vec![MaterialYield::new("Dirt", 0.5), MaterialYield::new("Oxygen", 0.5)],
            2.0,
            Some("fertilized".to_string()),
        )
        .unwrap();
    registry
        .register("moss", vec![MaterialYield::new("Fibre", 1.0)], 0.0, None)
        .unwrap();
    registry
        .register("sapling", vec![MaterialYield::new("Seed", 1.0)], 0.0, None)
        .unwrap();
    world
}

/// The watched tag used throughout.
pub fn water() -> Tag {
    Tag::new("Water")
}

/// A planted site with one watered storage.
#[derive(Debug, Clone, Copy)]
pub struct Garden {
    /// The planting site.
    pub site: SiteId,
    /// The plant on it.
    pub plant: EntityId,
    /// Site-owned storage holding water, watched by the plant.
    pub tank: StorageId,
}

/// Creates a site at `cell`, plants `entity_type` on it and gives it a tank
/// holding `water_kg` of water.
pub fn plant_garden(world: &mut World, entity_type: &str, cell: Cell, water_kg: f64) -> Garden {
    let site = world.create_site(cell);
    let plant = world
        .spawn_plant(PlantSpec::new(entity_type, cell).on_site(site))
        .unwrap();
    let tank = world.add_storage(Some(site)).unwrap();
    world.deposit(tank, water(), water_kg).unwrap();
    world.register_storage(plant, tank, &[water()]).unwrap();
    Garden { site, plant, tank }
}

// =============================================================================
// Queries
// =============================================================================

/// Tracked mass of a live plant.
pub fn tracked(world: &World, id: EntityId) -> f64 {
    world.tracker(id).unwrap().tracked_mass_kg()
}

/// Physical mass of a live plant.
pub fn physical(world: &World, id: EntityId) -> f64 {
    world.plant(id).unwrap().physical_mass_kg
}

/// Float comparison for test assertions.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
