//! Configuration system for icoplanet.
//!
//! Terrain, planet and demo settings persist to disk as RON files. Supports
//! CLI overrides via clap, hot-reload detection, validation of the LOD
//! thresholds, and forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, DemoConfig, MAX_SUBDIV_LEVELS, PlanetConfig, TerrainConfig,
    default_config_dir, scaled_lod_distances,
};
pub use error::ConfigError;
