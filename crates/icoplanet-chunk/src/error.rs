//! Chunk mesh error types.

use icoplanet_skeleton::TerrainError;

/// Errors from adding chunks.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// Every chunk slot is in use.
    #[error("chunk capacity of {max} reached")]
    ChunkCapacity { max: u32 },

    /// The shared vertex pool cannot fit another chunk ring.
    #[error("shared vertex pool full: {needed} needed, {available} available")]
    SharedCapacity { needed: u32, available: u32 },

    /// Mesh generation needs surface data that does not exist.
    #[error("surface lookup failed: {0}")]
    Surface(#[from] TerrainError),

    /// Bookkeeping found inconsistent by [`crate::ChunkMeshGenerator::check_invariants`].
    #[error("chunk invariant violated: {0}")]
    Invariant(String),
}

impl ChunkError {
    /// Capacity errors are recoverable: retry once other chunks are removed.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            ChunkError::ChunkCapacity { .. } | ChunkError::SharedCapacity { .. }
        )
    }
}
