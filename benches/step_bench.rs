use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use mossvale_sim::{PlantSpecies, SimWorld};

fn player_frames() -> Vec<(i32, i32)> {
    let mut frames = vec![(50, 80), (50, 40)];
    frames.extend(std::iter::repeat((50, 80)).take(4));
    frames.extend(std::iter::repeat((50, 40)).take(2));
    frames.extend(std::iter::repeat((50, 80)).take(4));
    frames
}

/// A 40x10 tile arena: solid floor, solid end walls, a water pool in the
/// middle, populated with a running player, patrolling flocked creatures and
/// a row of plants.
fn populated_world() -> SimWorld {
    let mut codes = vec![0i32; 400];
    for tx in 0..40 {
        codes[tx] = 1;
    }
    for ty in 1..4 {
        codes[ty * 40] = 1;
        codes[ty * 40 + 39] = 1;
    }
    for tx in 18..22 {
        codes[40 + tx] = 2;
    }
    let mut sim = SimWorld::new(100, 40, 10, (38, 1), (800, 600), &codes)
        .expect("arena construction");

    sim.add_player(2.0, 1.0, player_frames()).expect("player");
    sim.start_move(1).expect("player move");

    let flock_a = sim.create_flock().expect("flock");
    let flock_b = sim.create_flock().expect("flock");
    for i in 0..30u64 {
        let flock = if i % 2 == 0 { flock_a } else { flock_b };
        let x = 3.0 + i as f32;
        let c = sim
            .add_creature(i, Some(flock), x, 1.0, vec![(40, 40); 2])
            .expect("creature");
        sim.start_patrol(c).expect("patrol");
    }

    for i in 0..10 {
        let species = if i % 2 == 0 {
            PlantSpecies::Creeper
        } else {
            PlantSpecies::Hoverbud
        };
        sim.add_plant(species, 3.5 + i as f32 * 3.0, 2.5, vec![(8, 8); 2])
            .expect("plant");
    }

    sim.start_game().expect("start");
    sim
}

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");

    group.bench_function("one_second_41_actors", |b| {
        b.iter_batched(
            populated_world,
            |mut sim| {
                for _ in 0..5 {
                    sim.advance_time(0.2).expect("advance");
                }
                sim
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("snapshot_json", |b| {
        let mut sim = populated_world();
        sim.advance_time(0.2).expect("advance");
        b.iter(|| sim.snapshot().to_json().expect("serialize"));
    });

    group.finish();
}

criterion_group!(benches, bench_advance);
criterion_main!(benches);
