//! Chunk mesh generation over a terrain skeleton.
//!
//! Every chunked leaf triangle becomes a fixed-resolution triangular grid.
//! Vertices on a chunk's boundary ring are shared with neighboring chunks
//! through a reference-counted pool; interior vertices are private to the
//! chunk. Chunks at adjacent depths reuse each other's boundary vertices
//! wherever the grids line up, so the mesh stays crack-free.

mod buffers;
mod error;
mod layout;
mod mesh;
mod obj;
mod shared;
mod stitch;

pub use buffers::{DirtyRanges, MeshBuffers, TerrainVertex};
pub use error::ChunkError;
pub use layout::{ChunkLayout, FillStep, GridPos, GridVertex};
pub use mesh::{ChunkId, ChunkMeshGenerator, ChunkStats};
pub use obj::write_obj;
pub use shared::{SharedVertexPool, SharedVrtxId};
pub use stitch::{NeighborVertex, find_neighbor_vertex};
