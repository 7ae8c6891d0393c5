//! Terrain skeleton error types.

use glam::DVec3;

/// Errors surfaced by the terrain skeleton.
///
/// Structural misuse (subdividing a non-leaf, unsubdividing a leaf) is a
/// programming error and panics instead.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    /// The surface function has no radius for this direction.
    #[error("surface has no data for direction {0}")]
    MissingSurface(DVec3),

    /// LOD distances that cannot be used as thresholds.
    #[error("invalid LOD thresholds: {0}")]
    Thresholds(String),

    /// A consistency check over the skeleton failed.
    #[error("skeleton invariant violated: {0}")]
    Invariant(String),
}
