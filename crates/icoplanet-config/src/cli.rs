//! Command-line argument parsing for the icoplanet demo.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// icoplanet command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "icoplanet", about = "Icosahedron LOD terrain fly-in demo")]
pub struct CliArgs {
    /// Vertices along one chunk edge (2^n + 1).
    #[arg(long)]
    pub chunk_width: Option<u32>,

    /// Deepest subdivision level.
    #[arg(long)]
    pub max_depth: Option<u8>,

    /// Maximum number of live chunks.
    #[arg(long)]
    pub max_chunks: Option<u32>,

    /// Planet radius in meters. Rescales the LOD distances.
    #[arg(long)]
    pub radius: Option<f64>,

    /// Number of update ticks to simulate.
    #[arg(long)]
    pub steps: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the final mesh to this OBJ file.
    #[arg(long)]
    pub obj: Option<PathBuf>,

    /// Run the invariant checks after every tick.
    #[arg(long)]
    pub check_invariants: bool,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(width) = args.chunk_width {
            self.terrain.chunk_width = width;
        }
        if let Some(max_chunks) = args.max_chunks {
            self.terrain.max_chunks = max_chunks;
        }
        if let Some(radius) = args.radius {
            self.planet.radius_m = radius;
        }
        if let Some(depth) = args.max_depth {
            self.terrain.max_depth = depth;
        }
        if args.radius.is_some() || args.max_depth.is_some() {
            let (subdiv, unsubdiv) = crate::scaled_lod_distances(
                self.planet.radius_m,
                usize::from(self.terrain.max_depth),
            );
            self.terrain.subdivide_distances_m = subdiv;
            self.terrain.unsubdivide_distances_m = unsubdiv;
        }
        if let Some(steps) = args.steps {
            self.demo.steps = steps;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(ref path) = args.obj {
            self.debug.obj_export = Some(path.clone());
        }
        if args.check_invariants {
            self.debug.check_invariants = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            chunk_width: Some(9),
            steps: Some(5),
            check_invariants: true,
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.terrain.chunk_width, 9);
        assert_eq!(config.demo.steps, 5);
        assert!(config.debug.check_invariants);
        // Non-overridden fields retain defaults
        assert_eq!(config.terrain.max_chunks, 400);
        assert_eq!(config.planet.radius_m, 50_000.0);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_radius_override_rescales_distances() {
        let mut config = Config::default();
        let args = CliArgs {
            radius: Some(1000.0),
            max_depth: Some(4),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.terrain.subdivide_distances_m.len(), 4);
        assert_eq!(config.terrain.subdivide_distances_m[0], 1500.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_from_args() {
        let args = CliArgs::parse_from(["icoplanet", "--chunk-width", "33", "--obj", "planet.obj"]);
        assert_eq!(args.chunk_width, Some(33));
        assert_eq!(args.obj, Some(PathBuf::from("planet.obj")));
        assert!(!args.check_invariants);
    }
}
