use criterion::{black_box, criterion_group, criterion_main, Criterion};
use harvest_ledger::{Cell, LedgerConfig, MaterialYield, StorageId, Tag};
use harvest_sim::material::{MaterialCatalog, MaterialDef, Phase};
use harvest_sim::world::{PlantSpec, World};

const TAGS: [&str; 4] = ["Water", "Nutrient", "Dirt", "Phosphorite"];

/// A grid of plants, each on its own site with one tank holding every tag.
fn build_world(side: i32) -> (World, Vec<StorageId>) {
    let mut catalog = MaterialCatalog::new();
    catalog
        .insert(MaterialDef::new("Fibre", Phase::Solid, 0.0, 500.0))
        .unwrap();
    let mut world = World::new(LedgerConfig::default(), catalog).unwrap();
    world
        .registry_mut()
        .register("reed", vec![MaterialYield::new("Fibre", 1.0)], 0.0, None)
        .unwrap();

    let tags: Vec<Tag> = TAGS.iter().map(|t| Tag::new(t)).collect();
    let mut tanks = Vec::new();
    for x in 0..side {
        for y in 0..side {
            let cell = Cell::new(x, y);
            let site = world.create_site(cell);
            let plant = world
                .spawn_plant(PlantSpec::new("reed", cell).on_site(site))
                .unwrap();
            let tank = world.add_storage(Some(site)).unwrap();
            for tag in &tags {
                world.deposit(tank, tag.clone(), 1_000.0).unwrap();
            }
            world.register_storage(plant, tank, &tags).unwrap();
            tanks.push(tank);
        }
    }
    (world, tanks)
}

fn bench_world_step(c: &mut Criterion) {
    // 32 x 32 plants, four watched tags each
    let (mut world, _) = build_world(32);

    c.bench_function("world_step", |b| {
        b.iter(|| {
            world.step(black_box(1.0));
        })
    });
}

fn bench_world_step_consuming(c: &mut Criterion) {
    // Every tank loses a little water between ticks so the sweep credits
    let (mut world, tanks) = build_world(16);
    let water = Tag::new("Water");

    c.bench_function("world_step_consuming", |b| {
        b.iter(|| {
            for &tank in &tanks {
                world.deposit(tank, water.clone(), 0.5).unwrap();
                world.withdraw(tank, &water, black_box(0.5)).unwrap();
            }
            world.step(black_box(1.0));
        })
    });
}

fn bench_withdraw_dispatch(c: &mut Criterion) {
    let (mut world, tanks) = build_world(8);
    let water = Tag::new("Water");
    let tank = tanks[0];

    c.bench_function("withdraw_dispatch", |b| {
        b.iter(|| {
            world.deposit(tank, water.clone(), 1.0).unwrap();
            black_box(world.withdraw(tank, &water, 1.0).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_world_step,
    bench_world_step_consuming,
    bench_withdraw_dispatch
);
criterion_main!(benches);
