use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::DVec3;
use icoplanet_config::{Config, PlanetConfig, scaled_lod_distances};
use icoplanet_planet::{Planet, SphereSurface};

const RADIUS: f64 = 10_000.0;

fn config() -> Config {
    let mut config = Config::default();
    config.planet = PlanetConfig {
        radius_m: RADIUS,
        min_height_m: 0.0,
        max_height_m: 0.0,
        scale_shift: 10,
    };
    config.terrain.chunk_width = 9;
    config.terrain.max_depth = 6;
    let (subdivide, unsubdivide) = scaled_lod_distances(RADIUS, 6);
    config.terrain.subdivide_distances_m = subdivide;
    config.terrain.unsubdivide_distances_m = unsubdivide;
    config
}

fn planet() -> Planet {
    Planet::new(&config(), Box::new(SphereSurface { radius_m: RADIUS })).unwrap()
}

fn bench_initial_chunking(c: &mut Criterion) {
    c.bench_function("planet_new", |bencher| bencher.iter(|| black_box(planet())));
}

fn bench_static_viewer(c: &mut Criterion) {
    let mut planet = planet();
    let viewer = DVec3::new(0.0, RADIUS + 50.0, 0.0);
    let _ = planet.update(viewer);
    c.bench_function("update_static_viewer", |bencher| {
        bencher.iter(|| black_box(planet.update(black_box(viewer)).is_ok()))
    });
}

fn bench_moving_viewer(c: &mut Criterion) {
    let mut planet = planet();
    let mut step = 0u32;
    c.bench_function("update_moving_viewer", |bencher| {
        bencher.iter(|| {
            step += 1;
            let angle = f64::from(step % 360).to_radians();
            let viewer = DVec3::new(angle.cos(), 0.2, angle.sin()).normalize() * (RADIUS + 50.0);
            black_box(planet.update(viewer).is_ok())
        })
    });
}

criterion_group!(
    benches,
    bench_initial_chunking,
    bench_static_viewer,
    bench_moving_viewer
);
criterion_main!(benches);
