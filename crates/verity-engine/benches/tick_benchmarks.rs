//! Tick and checksum throughput.
//!
//! Measures the per-tick cost a server pays for one client: advance the
//! engine by one input, then recompute the checksum the client claimed.
//!
//! Run with: `cargo bench --bench tick_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use verity_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A wide level with `platforms` moving platforms and a V2 boss fight that
/// starts on the first tick.
fn level(width: usize, platforms: usize) -> LevelDef {
    let floor = (0..width).fold(TileLayer::empty("ground", width, 4, true), |l, c| l.with_tile(width, c, 3, 1));
    let mut level = LevelDef::new("bench", 32.0, 32.0, width, 4)
        .with_layer(floor)
        .with_object(ObjectDef::new("player_spawn", "", 32.0, 64.0, 0.0, 0.0))
        .with_object(ObjectDef::new("item", "key", 32.0 * width as f64 - 64.0, 64.0, 16.0, 16.0).with_property("important", true))
        .with_object(ObjectDef::new("item", "crown", 64.0, -500.0, 16.0, 16.0).with_property("boss", true))
        .with_object(ObjectDef::new("portal", "gate", 32.0, 64.0, 16.0, 32.0).with_property("boss", "v2"))
        .with_object(ObjectDef::new("boss-win", "", 64.0, -500.0, 0.0, 0.0))
        .with_object(ObjectDef::new("boss", "boss", 600.0, -40.0, 64.0, 64.0).with_property("variant", "v2"));
    for i in 0..platforms {
        level = level.with_object(
            ObjectDef::new("platform", format!("boss-{i}"), 96.0 * i as f64, 0.0, 64.0, 8.0)
                .with_property("path", "horizontal")
                .with_property("distance", 64)
                .with_property("speed", 2),
        );
    }
    level
}

fn engine(width: usize, platforms: usize) -> Engine {
    Engine::new(EngineConfig::default(), &level(width, platforms), &RemoteProvider).expect("bench level is valid")
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    for platforms in [0usize, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(platforms), &platforms, |b, &platforms| {
            let mut engine = engine(128, platforms);
            let inputs = [InputSample::held([Key::D]), InputSample::held([Key::A])];
            let mut i = 0usize;
            b.iter(|| {
                i += 1;
                engine.update(black_box(&inputs[(i / 30) % 2])).expect("tick");
            });
        });
    }
    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");
    for platforms in [0usize, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(platforms), &platforms, |b, &platforms| {
            let mut engine = engine(128, platforms);
            for _ in 0..120 {
                engine.update(&InputSample::held([Key::D])).expect("tick");
            }
            b.iter(|| black_box(engine.checksum().expect("checksum")));
        });
    }
    group.finish();
}

fn bench_server_step(c: &mut Criterion) {
    let mut client = engine(128, 16);
    let mut server = engine(128, 16);
    let input = InputSample::held([Key::D]);
    c.bench_function("server_step", |b| {
        b.iter(|| {
            client.update(&input).expect("tick");
            let claimed = client.checksum().expect("checksum");
            server.update(&input).expect("tick");
            server.validate_checksum(black_box(&claimed)).expect("in sync");
        });
    });
}

criterion_group!(benches, bench_update, bench_checksum, bench_server_step);
criterion_main!(benches);
