//! Icosahedron subdivision skeleton for planet terrain.
//!
//! The skeleton is a forest of triangle groups: the 20 faces of an
//! icosahedron at depth 0, each recursively split into 4 children. Only
//! topology lives in [`SubdivTriangleSkeleton`]; [`TerrainSkeleton`] adds
//! planet-scale vertex positions, raised triangle centers and the per-level
//! bookkeeping used to keep neighboring depths within one level of each
//! other. [`SubdivEnforcer`] drives subdivision from a viewer position.

mod bitset;
mod enforcer;
mod error;
mod icosahedron;
mod ids;
mod invariants;
mod lod;
mod skeleton;
mod terrain;

pub use bitset::BitSet;
pub use enforcer::{CommitReport, SkeletonListener, SubdivEnforcer, SubdivideEvent, UnsubdivideEvent};
pub use error::TerrainError;
pub use icosahedron::{ICO_FACES, icosahedron_directions, oriented_faces};
pub use ids::{MaybeNewId, SkTriGroupId, SkTriId, SkVrtxId};
pub use invariants::check_invariants;
pub use lod::{LodSelector, LodThresholds};
pub use skeleton::{
    SideTransform, SkTriGroup, SkeletonTriangle, SubdivTriangleSkeleton, Subdivided, Unsubdivided,
};
pub use terrain::{Level, SphereSurface, Surface, TerrainParams, TerrainSkeleton};
