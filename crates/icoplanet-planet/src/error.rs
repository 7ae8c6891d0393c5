//! Planet error types.

use icoplanet_chunk::ChunkError;
use icoplanet_config::ConfigError;
use icoplanet_skeleton::TerrainError;

/// Errors from building or updating a planet.
#[derive(Debug, thiserror::Error)]
pub enum PlanetError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("terrain: {0}")]
    Terrain(#[from] TerrainError),

    #[error("chunk mesh: {0}")]
    Chunk(#[from] ChunkError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A leaf has neither a chunk nor a queued request for one.
    #[error("{0} is neither chunked nor pending")]
    Unchunked(icoplanet_skeleton::SkTriId),
}
