//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hard upper bound on subdivision levels a terrain can be configured with.
pub const MAX_SUBDIV_LEVELS: usize = 9;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Skeleton and chunk mesh settings.
    pub terrain: TerrainConfig,
    /// Planet shape settings.
    pub planet: PlanetConfig,
    /// Settings for the fly-in demo binary.
    pub demo: DemoConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Skeleton subdivision and chunk mesh configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Vertices along one edge of a chunk. Must be a power of two plus one.
    pub chunk_width: u32,
    /// Maximum number of chunks alive at once.
    pub max_chunks: u32,
    /// Capacity of the shared (chunk edge) vertex pool, including the
    /// reserved null slot.
    pub max_shared_vertices: u32,
    /// Deepest subdivision level. Triangles at this depth never subdivide.
    pub max_depth: u8,
    /// Per-level distance in meters below which a leaf subdivides.
    pub subdivide_distances_m: Vec<f64>,
    /// Per-level distance in meters above which a triangle unsubdivides.
    /// Each entry must exceed the subdivide distance of the same level.
    pub unsubdivide_distances_m: Vec<f64>,
}

/// Planet shape configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanetConfig {
    /// Base radius in meters.
    pub radius_m: f64,
    /// Lowest terrain elevation relative to the base radius, in meters.
    pub min_height_m: f64,
    /// Highest terrain elevation relative to the base radius, in meters.
    pub max_height_m: f64,
    /// Fixed-point precision: skeleton positions use `2^scale_shift` units per meter.
    pub scale_shift: u32,
}

/// Demo fly-in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    /// Viewer altitude above the base radius at the first tick, in meters.
    pub start_altitude_m: f64,
    /// Viewer altitude above the base radius at the last tick, in meters.
    pub end_altitude_m: f64,
    /// Number of update ticks to simulate.
    pub steps: u32,
    /// Degrees the viewer orbits around the planet axis per tick.
    pub orbit_deg_per_step: f64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Run the full invariant checks after every tick.
    pub check_invariants: bool,
    /// Write the final mesh as Wavefront OBJ to this path.
    pub obj_export: Option<PathBuf>,
}

/// Per-level subdivide/unsubdivide distances scaled to a planet radius.
///
/// A depth-`l` triangle has edges roughly `radius / 2^l` long; it subdivides
/// when the viewer is within 1.5 edge lengths and unsubdivides past 2.
pub fn scaled_lod_distances(radius_m: f64, levels: usize) -> (Vec<f64>, Vec<f64>) {
    (0..levels)
        .map(|level| {
            let edge = radius_m / f64::from(1u32 << level);
            (edge * 1.5, edge * 2.0)
        })
        .unzip()
}

/// Platform config directory for icoplanet, if the platform has one.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("icoplanet"))
}

// --- Default implementations ---

impl Default for TerrainConfig {
    fn default() -> Self {
        let max_depth = 7;
        let (subdivide_distances_m, unsubdivide_distances_m) =
            scaled_lod_distances(PlanetConfig::default().radius_m, usize::from(max_depth));
        Self {
            chunk_width: 17,
            max_chunks: 400,
            max_shared_vertices: 40_000,
            max_depth,
            subdivide_distances_m,
            unsubdivide_distances_m,
        }
    }
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius_m: 50_000.0,
            min_height_m: -500.0,
            max_height_m: 2_000.0,
            scale_shift: 10,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            start_altitude_m: 200_000.0,
            end_altitude_m: 100.0,
            steps: 120,
            orbit_deg_per_step: 0.5,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            check_invariants: false,
            obj_export: None,
        }
    }
}

// --- Validation ---

impl TerrainConfig {
    /// Vertices shared along the boundary of one chunk.
    pub fn ring_vertices_per_chunk(&self) -> u32 {
        3 * (self.chunk_width - 1)
    }

    /// Check the invariants the terrain engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let segments = self.chunk_width.wrapping_sub(1);
        if self.chunk_width < 3 || self.chunk_width > 257 || !segments.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "chunk_width must be 2^n + 1 between 3 and 257, got {}",
                self.chunk_width
            )));
        }
        if self.max_chunks == 0 {
            return Err(ConfigError::Invalid("max_chunks must be at least 1".into()));
        }
        if self.max_shared_vertices <= self.ring_vertices_per_chunk() {
            return Err(ConfigError::Invalid(format!(
                "max_shared_vertices must exceed {} to fit one chunk",
                self.ring_vertices_per_chunk()
            )));
        }
        let interior = u64::from(segments - 1) * u64::from(segments - 2) / 2;
        let total = u64::from(self.max_shared_vertices) + u64::from(self.max_chunks) * interior;
        if total > u64::from(u32::MAX) {
            return Err(ConfigError::Invalid(format!(
                "{total} vertices do not fit 32-bit indices"
            )));
        }
        if usize::from(self.max_depth) > MAX_SUBDIV_LEVELS {
            return Err(ConfigError::Invalid(format!(
                "max_depth must be at most {MAX_SUBDIV_LEVELS}, got {}",
                self.max_depth
            )));
        }

        let levels = usize::from(self.max_depth);
        if self.subdivide_distances_m.len() < levels || self.unsubdivide_distances_m.len() < levels
        {
            return Err(ConfigError::Invalid(format!(
                "need {levels} subdivide and unsubdivide distances"
            )));
        }
        for level in 0..levels {
            let subdiv = self.subdivide_distances_m[level];
            let unsubdiv = self.unsubdivide_distances_m[level];
            if !(subdiv > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "level {level}: subdivide distance must be positive"
                )));
            }
            if !(unsubdiv > subdiv) {
                return Err(ConfigError::Invalid(format!(
                    "level {level}: unsubdivide distance {unsubdiv} must exceed subdivide distance {subdiv}"
                )));
            }
            if level > 0 && subdiv >= self.subdivide_distances_m[level - 1] {
                return Err(ConfigError::Invalid(format!(
                    "level {level}: subdivide distances must decrease with depth"
                )));
            }
        }
        Ok(())
    }
}

impl PlanetConfig {
    /// Check the planet shape is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.radius_m > 0.0) {
            return Err(ConfigError::Invalid("radius_m must be positive".into()));
        }
        if self.min_height_m > self.max_height_m {
            return Err(ConfigError::Invalid(
                "min_height_m must not exceed max_height_m".into(),
            ));
        }
        if self.scale_shift > 40 {
            return Err(ConfigError::Invalid("scale_shift must be at most 40".into()));
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Validate every section that has constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.terrain.validate()?;
        self.planet.validate()?;

        // Thresholds are compared as u64 skeleton units
        let units_per_meter = 2f64.powi(self.planet.scale_shift as i32);
        let levels = usize::from(self.terrain.max_depth);
        let distances = self.terrain.subdivide_distances_m[..levels]
            .iter()
            .chain(&self.terrain.unsubdivide_distances_m[..levels]);
        for &meters in distances {
            if meters * units_per_meter >= u64::MAX as f64 {
                return Err(ConfigError::Invalid(format!(
                    "LOD distance {meters} m overflows at scale_shift {}",
                    self.planet.scale_shift
                )));
            }
        }
        Ok(())
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("chunk_width: 17"));
        assert!(ron_str.contains("max_depth: 7"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(terrain: (chunk_width: 9))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.terrain.chunk_width, 9);
        assert_eq!(config.terrain.max_chunks, 400);
        assert_eq!(config.planet, PlanetConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_scaled_distances_halve_per_level() {
        let (subdiv, unsubdiv) = scaled_lod_distances(1000.0, 3);
        assert_eq!(subdiv, vec![1500.0, 750.0, 375.0]);
        assert_eq!(unsubdiv, vec![2000.0, 1000.0, 500.0]);
    }

    #[test]
    fn test_chunk_width_must_be_power_of_two_plus_one() {
        let mut terrain = TerrainConfig::default();
        for good in [3, 5, 9, 17, 33, 257] {
            terrain.chunk_width = good;
            assert!(terrain.validate().is_ok(), "{good} should be accepted");
        }
        for bad in [0, 1, 2, 4, 10, 16, 18, 513] {
            terrain.chunk_width = bad;
            assert!(terrain.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_missing_hysteresis_rejected() {
        let mut terrain = TerrainConfig::default();
        terrain.unsubdivide_distances_m[2] = terrain.subdivide_distances_m[2];
        let err = terrain.validate().unwrap_err();
        assert!(err.to_string().contains("level 2"));
    }

    #[test]
    fn test_increasing_subdivide_distances_rejected() {
        let mut terrain = TerrainConfig::default();
        terrain.subdivide_distances_m[3] = terrain.subdivide_distances_m[2] * 1.1;
        terrain.unsubdivide_distances_m[3] = terrain.subdivide_distances_m[3] * 2.0;
        assert!(terrain.validate().is_err());
    }

    #[test]
    fn test_too_few_distances_rejected() {
        let mut terrain = TerrainConfig::default();
        terrain.subdivide_distances_m.truncate(3);
        assert!(terrain.validate().is_err());
    }

    #[test]
    fn test_extra_distances_ignored() {
        let mut config = Config::default();
        config.terrain.subdivide_distances_m.push(1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_distances_overflowing_units_rejected() {
        let mut config = Config::default();
        config.planet.radius_m = 1.0e7;
        let levels = usize::from(config.terrain.max_depth);
        let (subdiv, unsubdiv) = scaled_lod_distances(config.planet.radius_m, levels);
        config.terrain.subdivide_distances_m = subdiv;
        config.terrain.unsubdivide_distances_m = unsubdiv;
        assert!(config.validate().is_ok());

        config.planet.scale_shift = 40;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scale_shift 40"));
    }

    #[test]
    fn test_tiny_shared_pool_rejected() {
        let mut terrain = TerrainConfig::default();
        terrain.max_shared_vertices = terrain.ring_vertices_per_chunk();
        assert!(terrain.validate().is_err());
    }

    #[test]
    fn test_inverted_height_range_rejected() {
        let planet = PlanetConfig {
            min_height_m: 10.0,
            max_height_m: -10.0,
            ..PlanetConfig::default()
        };
        assert!(planet.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.terrain.chunk_width = 33;
        config.debug.obj_export = Some(PathBuf::from("out.obj"));

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.terrain.max_chunks = 12;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().terrain.max_chunks, 12);
        assert!(modified.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
