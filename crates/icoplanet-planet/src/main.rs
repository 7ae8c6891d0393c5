//! Fly-in demo: a viewer descends from orbit toward the surface while
//! circling the planet, and every tick's subdivision and chunk traffic is
//! logged.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p icoplanet-planet -- --steps 200 --obj planet.obj`.

use clap::Parser;
use glam::{DQuat, DVec3};
use icoplanet_config::{CliArgs, Config};
use icoplanet_planet::{Planet, Surface};
use tracing::{error, info};

/// Rolling hills: a few low-frequency ripples scaled into the height range.
fn ripple_surface(config: &Config) -> impl Surface + 'static {
    let radius = config.planet.radius_m;
    let (low, high) = (config.planet.min_height_m, config.planet.max_height_m);
    move |direction: DVec3| {
        let wave = (direction.x * 7.0).sin() * (direction.y * 5.0).cos()
            + 0.5 * (direction.z * 13.0 + direction.x * 3.0).sin();
        let t = (wave / 1.5 + 1.0) * 0.5;
        Some(radius + low + (high - low) * t.clamp(0.0, 1.0))
    }
}

/// Viewer position for tick `step`: altitude interpolated geometrically
/// from start to end, longitude advancing by the orbit rate.
fn viewer_position(config: &Config, step: u32) -> DVec3 {
    let demo = &config.demo;
    let t = if demo.steps > 1 {
        f64::from(step) / f64::from(demo.steps - 1)
    } else {
        1.0
    };
    let start = demo.start_altitude_m.max(1.0);
    let end = demo.end_altitude_m.max(1.0);
    let altitude = start * (end / start).powf(t);
    let angle = (demo.orbit_deg_per_step * f64::from(step)).to_radians();
    let direction = DQuat::from_rotation_y(angle) * DVec3::new(0.3, 0.8, 0.5).normalize();
    direction * (config.planet.radius_m + config.planet.max_height_m + altitude)
}

fn run(config: &Config) -> Result<(), icoplanet_planet::PlanetError> {
    let mut planet = Planet::new(config, Box::new(ripple_surface(config)))?;
    for step in 0..config.demo.steps {
        let viewer = viewer_position(config, step);
        let stats = planet.update(viewer)?;
        let dirty = planet.take_dirty();
        info!(
            "tick {step}: altitude {:.0} m, +{} -{} tris, +{} -{} chunks, {} live, {} shared vertices, {} pending, dirty {:?}/{:?}",
            viewer.length() - config.planet.radius_m,
            stats.subdivided,
            stats.unsubdivided,
            stats.chunks_added,
            stats.chunks_removed,
            stats.chunks.chunks,
            stats.chunks.shared_vertices,
            stats.pending,
            dirty.vertices,
            dirty.indices,
        );
        if config.debug.check_invariants {
            planet.check_invariants()?;
        }
    }

    if let Some(path) = &config.debug.obj_export {
        planet.write_obj(path)?;
    }
    Ok(())
}

fn main() {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args
        .config
        .clone()
        .or_else(icoplanet_config::default_config_dir)
        .unwrap_or_else(|| ".".into());

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    icoplanet_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(e) = config.validate() {
        error!("{e}");
        std::process::exit(2);
    }

    info!(
        "Flying {} ticks from {} m to {} m",
        config.demo.steps, config.demo.start_altitude_m, config.demo.end_altitude_m
    );
    if let Err(e) = run(&config) {
        error!("{e}");
        std::process::exit(1);
    }
}
