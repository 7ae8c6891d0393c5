//! A planet whose terrain is an icosahedron refined around the viewer, with
//! a crack-free chunk mesh kept in sync with the refinement.
//!
//! [`Planet`] ties the pieces together: each [`Planet::update`] commits one
//! tick of subdivision changes, drops the chunks of triangles that stopped
//! being leaves and chunks the new leaves, coarse ones first.

mod error;
mod planet;


pub use error::PlanetError;
pub use planet::{Planet, UpdateStats};

pub use icoplanet_chunk::{ChunkStats, DirtyRanges, MeshBuffers, TerrainVertex};
pub use icoplanet_skeleton::{SphereSurface, Surface};
