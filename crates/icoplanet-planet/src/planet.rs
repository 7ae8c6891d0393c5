//! Per-tick orchestration of the skeleton and its chunk meshes.

use std::io::BufWriter;
use std::path::Path;

use glam::DVec3;
use icoplanet_chunk::{ChunkMeshGenerator, ChunkStats, DirtyRanges, write_obj};
use icoplanet_config::Config;
use icoplanet_math::{UnitScale, Vec3I128, checked_distance_squared};
use icoplanet_skeleton::{
    LodSelector, LodThresholds, SkTriId, SkeletonListener, SubdivEnforcer, SubdivideEvent, Surface,
    TerrainParams, TerrainSkeleton, UnsubdivideEvent, check_invariants,
};
use tracing::{debug, info, warn};

use crate::error::PlanetError;

/// What one [`Planet::update`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub subdivided: usize,
    pub unsubdivided: usize,
    pub cancelled: usize,
    pub refused: usize,
    pub distance_checks: u64,
    pub chunks_added: usize,
    pub chunks_removed: usize,
    /// Leaves still waiting for a chunk after this tick.
    pub pending: usize,
    pub chunks: ChunkStats,
}

/// Removes chunks while the skeleton is being edited.
struct ChunkSync<'a> {
    chunks: &'a mut ChunkMeshGenerator,
    removed: usize,
}

impl SkeletonListener for ChunkSync<'_> {
    fn on_subdivide(&mut self, terrain: &TerrainSkeleton, event: &SubdivideEvent) {
        if self.chunks.chunk_remove(terrain, event.tri) {
            self.removed += 1;
        }
        self.chunks.link_midpoints(terrain, event.tri);
    }

    fn on_unsubdivide(&mut self, terrain: &TerrainSkeleton, event: &UnsubdivideEvent) {
        for child in event.children {
            if self.chunks.chunk_remove(terrain, child) {
                self.removed += 1;
            }
        }
        self.chunks.forget_skeleton_vertices(&event.removed_vertices);
    }
}

/// A terrain skeleton, its LOD enforcer and the chunk meshes of its leaves.
pub struct Planet {
    terrain: TerrainSkeleton,
    enforcer: SubdivEnforcer,
    chunks: ChunkMeshGenerator,
    /// Leaves whose chunk could not be added for lack of capacity.
    pending: Vec<SkTriId>,
}

impl Planet {
    /// Build the planet and chunk its 20 root triangles.
    pub fn new(config: &Config, surface: Box<dyn Surface>) -> Result<Self, PlanetError> {
        config.validate()?;
        let terrain_config = &config.terrain;
        let params = TerrainParams {
            radius_m: config.planet.radius_m,
            min_height_m: config.planet.min_height_m,
            max_height_m: config.planet.max_height_m,
            scale: UnitScale::new(config.planet.scale_shift),
        };
        let terrain = TerrainSkeleton::new(params, surface)?;
        let levels = usize::from(terrain_config.max_depth);
        let thresholds = LodThresholds::from_meters(
            &terrain_config.subdivide_distances_m[..levels],
            &terrain_config.unsubdivide_distances_m[..levels],
            params.scale,
        )?;
        let enforcer = SubdivEnforcer::new(LodSelector::new(thresholds), terrain_config.max_depth);
        let chunks = ChunkMeshGenerator::new(
            terrain_config.chunk_width,
            terrain_config.max_chunks,
            terrain_config.max_shared_vertices,
        );

        let roots = terrain.skeleton().root_triangles().collect();
        let mut planet = Self {
            terrain,
            enforcer,
            chunks,
            pending: roots,
        };
        planet.add_chunks(None)?;
        info!(
            "Planet ready: radius {} m, chunk width {}, max depth {}",
            config.planet.radius_m, terrain_config.chunk_width, terrain_config.max_depth
        );
        Ok(planet)
    }

    pub fn terrain(&self) -> &TerrainSkeleton {
        &self.terrain
    }

    pub fn chunks(&self) -> &ChunkMeshGenerator {
        &self.chunks
    }

    /// Leaves waiting for chunk capacity.
    pub fn pending(&self) -> &[SkTriId] {
        &self.pending
    }

    /// Buffer ranges written since the last call.
    pub fn take_dirty(&mut self) -> DirtyRanges {
        self.chunks.take_dirty()
    }

    /// Run one tick for a viewer at `viewer_m` (meters from the planet center).
    pub fn update(&mut self, viewer_m: DVec3) -> Result<UpdateStats, PlanetError> {
        let viewer = self.terrain.scale().vec_to_units(viewer_m);
        let mut sync = ChunkSync {
            chunks: &mut self.chunks,
            removed: 0,
        };
        let report = self.enforcer.update(&mut self.terrain, viewer, &mut sync)?;
        let chunks_removed = sync.removed;

        self.pending.extend_from_slice(&report.surface_added);
        let chunks_added = self.add_chunks(Some(viewer_m))?;

        let stats = UpdateStats {
            subdivided: report.subdivided,
            unsubdivided: report.unsubdivided,
            cancelled: report.cancelled,
            refused: report.refused,
            distance_checks: report.distance_checks,
            chunks_added,
            chunks_removed,
            pending: self.pending.len(),
            chunks: self.chunks.stats(),
        };
        debug!("Planet tick: {stats:?}");
        Ok(stats)
    }

    /// Chunk every queued leaf that still needs one, coarsest first, then
    /// nearest to `viewer_m`. Leaves that do not fit stay queued.
    fn add_chunks(&mut self, viewer_m: Option<DVec3>) -> Result<usize, PlanetError> {
        let skeleton = self.terrain.skeleton();
        let mut wanted = std::mem::take(&mut self.pending);
        wanted.retain(|&tri| {
            skeleton.exists(tri) && skeleton.is_leaf(tri) && !self.chunks.is_chunked(tri)
        });
        let viewer = viewer_m.map(|v| self.terrain.scale().vec_to_units(v));
        wanted.sort_by_cached_key(|&tri| {
            let distance =
                viewer.map_or(0, |viewer| viewer_distance_key(self.terrain.center(tri), viewer));
            (skeleton.depth(tri), distance, tri)
        });
        wanted.dedup();

        let mut added = 0;
        let mut queue = wanted.into_iter();
        while let Some(tri) = queue.next() {
            match self.chunks.chunk_add(&self.terrain, tri) {
                Ok(_) => added += 1,
                Err(err) if err.is_capacity() => self.pending.push(tri),
                Err(err) => {
                    self.pending.push(tri);
                    self.pending.extend(queue);
                    return Err(err.into());
                }
            }
        }
        if !self.pending.is_empty() {
            let stats = self.chunks.stats();
            warn!(
                "{} leaves left unchunked: {}/{} chunks, {} shared vertices free",
                self.pending.len(),
                stats.chunks,
                stats.max_chunks,
                stats.shared_available
            );
        }
        Ok(added)
    }

    /// Check the skeleton, the chunk bookkeeping, and that every leaf is
    /// chunked or queued.
    pub fn check_invariants(&self) -> Result<(), PlanetError> {
        check_invariants(&self.terrain)?;
        self.chunks.check_invariants(&self.terrain)?;
        let skeleton = self.terrain.skeleton();
        for tri in skeleton.triangle_ids() {
            if skeleton.is_leaf(tri) && !self.chunks.is_chunked(tri) && !self.pending.contains(&tri) {
                return Err(PlanetError::Unchunked(tri));
            }
        }
        Ok(())
    }

    /// Write the current mesh as a Wavefront OBJ file.
    pub fn write_obj(&self, path: &Path) -> Result<(), PlanetError> {
        let file = std::fs::File::create(path)?;
        write_obj(&self.chunks, BufWriter::new(file))?;
        info!("Wrote {} chunks to {}", self.chunks.chunk_count(), path.display());
        Ok(())
    }
}

/// Squared distance for ordering; too far to square sorts last.
fn viewer_distance_key(center: Vec3I128, viewer: Vec3I128) -> i128 {
    checked_distance_squared(center, viewer).unwrap_or(i128::MAX)
}
