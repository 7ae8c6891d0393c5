//! Finding the shared vertex across a chunk edge.
//!
//! Positions along a side are exact fractions `num / den` running from the
//! side's first corner to its second. Walking up to a parent halves the
//! fraction into the parent's side; crossing to the neighbor mirrors it,
//! since the neighbor runs the shared edge the other way; walking down
//! doubles it into the child holding that half.

use icoplanet_skeleton::{SkTriId, SubdivTriangleSkeleton};

use crate::mesh::ChunkMeshGenerator;
use crate::shared::SharedVrtxId;

/// Result of looking for a boundary vertex in neighboring chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborVertex {
    /// A chunk across the edge already has a vertex at this position.
    Found(SharedVrtxId),
    /// A coarser chunk borders the edge but has no vertex here; the point
    /// lies on its straight edge between two of its vertices.
    Between,
    /// No chunk borders this part of the edge.
    None,
}

/// Look up the vertex at grid step `pos` (`0..=W-1`) along `side` of `tri`
/// in whatever chunk borders that edge.
pub fn find_neighbor_vertex(
    skeleton: &SubdivTriangleSkeleton,
    chunks: &ChunkMeshGenerator,
    tri: SkTriId,
    side: u8,
    pos: u32,
) -> NeighborVertex {
    let segments = u64::from(chunks.layout().segments());

    // Up until there is something across the edge. Inner sides always have
    // a sibling there, so this only climbs along outer sides.
    let mut current = tri;
    let neighbor = loop {
        if let Some(neighbor) = skeleton.tri(current).neighbors[usize::from(side)] {
            break neighbor;
        }
        let Some(parent) = skeleton.parent(current) else {
            return NeighborVertex::None;
        };
        current = parent;
    };
    let Some(transform) = skeleton.transform_to_ancestor(tri, side, skeleton.depth(current)) else {
        return NeighborVertex::None;
    };
    let (num, den) = transform.apply(u64::from(pos), segments);

    let mut across = neighbor;
    let across_side = skeleton.neighbor_side(across, current);
    let mut num = den - num;

    // Down until a chunk or nothing chunked below
    loop {
        if let Some(chunk) = chunks.chunk_of(across) {
            let steps = num * segments;
            if steps % den != 0 {
                return NeighborVertex::Between;
            }
            let ring = chunks.layout().ring_index(across_side, (steps / den) as u32);
            return NeighborVertex::Found(chunks.ring(chunk)[ring as usize]);
        }
        let Some(group) = skeleton.children(across) else {
            return NeighborVertex::None;
        };
        if chunks.chunked_descendants(across) == 0 {
            return NeighborVertex::None;
        }
        let first = group.child(across_side);
        let second = group.child((across_side + 1) % 3);
        let twice = 2 * num;
        (across, num) = if twice < den {
            (first, twice)
        } else if twice > den {
            (second, twice - den)
        } else if chunks.chunk_of(first).is_some() || chunks.chunked_descendants(first) > 0 {
            // Shared corner of both halves
            (first, den)
        } else {
            (second, 0)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::ChunkMeshGenerator;
    use icoplanet_math::UnitScale;
    use icoplanet_skeleton::{SphereSurface, TerrainParams, TerrainSkeleton};

    fn setup(width: u32) -> (TerrainSkeleton, ChunkMeshGenerator) {
        let params = TerrainParams {
            radius_m: 1000.0,
            min_height_m: 0.0,
            max_height_m: 0.0,
            scale: UnitScale::new(8),
        };
        let terrain =
            TerrainSkeleton::new(params, Box::new(SphereSurface { radius_m: 1000.0 })).unwrap();
        (terrain, ChunkMeshGenerator::new(width, 64, 4096))
    }

    #[test]
    fn test_nothing_chunked_is_none() {
        let (terrain, chunks) = setup(5);
        let lookup = find_neighbor_vertex(terrain.skeleton(), &chunks, SkTriId(0), 0, 2);
        assert_eq!(lookup, NeighborVertex::None);
    }

    #[test]
    fn test_same_depth_neighbor_mirrors_position() {
        let (terrain, mut chunks) = setup(5);
        let tri = SkTriId(0);
        let neighbor = terrain.skeleton().tri(tri).neighbors[0].unwrap();
        let back = terrain.skeleton().neighbor_side(neighbor, tri);
        let chunk = chunks.chunk_add(&terrain, neighbor).unwrap();

        for pos in 0..=4 {
            let expected = chunks.ring(chunk)[chunks.layout().ring_index(back, 4 - pos) as usize];
            assert_eq!(
                find_neighbor_vertex(terrain.skeleton(), &chunks, tri, 0, pos),
                NeighborVertex::Found(expected)
            );
        }
    }

    #[test]
    fn test_coarser_neighbor_reports_between_on_odd_steps() {
        let (mut terrain, mut chunks) = setup(5);
        let parent = SkTriId(0);
        let neighbor = terrain.skeleton().tri(parent).neighbors[0].unwrap();
        let group = terrain.subdivide(parent).unwrap().group;
        chunks.chunk_add(&terrain, neighbor).unwrap();

        // Child 0 covers the first half of parent side 0
        let child = group.child(0);
        let skeleton = terrain.skeleton();
        assert!(matches!(
            find_neighbor_vertex(skeleton, &chunks, child, 0, 2),
            NeighborVertex::Found(_)
        ));
        assert_eq!(
            find_neighbor_vertex(skeleton, &chunks, child, 0, 1),
            NeighborVertex::Between
        );
        // The far end of child 0 and the near end of child 1 meet at the
        // parent's midpoint
        assert_eq!(
            find_neighbor_vertex(skeleton, &chunks, child, 0, 4),
            find_neighbor_vertex(skeleton, &chunks, group.child(1), 0, 0)
        );
    }

    #[test]
    fn test_two_levels_below_coarse_neighbor() {
        let (mut terrain, mut chunks) = setup(5);
        let parent = SkTriId(0);
        let neighbor = terrain.skeleton().tri(parent).neighbors[0].unwrap();
        let back = terrain.skeleton().neighbor_side(neighbor, parent);
        let group = terrain.subdivide(parent).unwrap().group;
        let grandchildren = terrain.subdivide(group.child(1)).unwrap().group;
        let coarse = chunks.chunk_add(&terrain, neighbor).unwrap();

        // The last quarter of the parent's side 0
        let tri = grandchildren.child(1);
        let skeleton = terrain.skeleton();
        let transform = skeleton.transform_to_ancestor(tri, 0, 0).unwrap();
        assert_eq!((transform.ancestor, transform.shift, transform.offset), (parent, 2, 3));

        let ring = chunks.ring(coarse);
        let at = |pos| NeighborVertex::Found(ring[chunks.layout().ring_index(back, pos) as usize]);
        assert_eq!(find_neighbor_vertex(skeleton, &chunks, tri, 0, 0), at(1));
        assert_eq!(find_neighbor_vertex(skeleton, &chunks, tri, 0, 4), at(0));
        for pos in 1..4 {
            assert_eq!(
                find_neighbor_vertex(skeleton, &chunks, tri, 0, pos),
                NeighborVertex::Between
            );
        }
    }

    #[test]
    fn test_finer_neighbor_found_through_children() {
        let (mut terrain, mut chunks) = setup(5);
        let parent = SkTriId(0);
        let neighbor = terrain.skeleton().tri(parent).neighbors[0].unwrap();
        let back = terrain.skeleton().neighbor_side(neighbor, parent);
        let group = terrain.subdivide(parent).unwrap().group;
        let first = chunks.chunk_add(&terrain, group.child(0)).unwrap();
        let second = chunks.chunk_add(&terrain, group.child(1)).unwrap();

        let skeleton = terrain.skeleton();
        let ring_index = |pos| chunks.layout().ring_index(0, pos) as usize;
        // Neighbor side runs from the parent's corner 1 back to corner 0
        assert_eq!(
            find_neighbor_vertex(skeleton, &chunks, neighbor, back, 1),
            NeighborVertex::Found(chunks.ring(second)[ring_index(2)])
        );
        assert_eq!(
            find_neighbor_vertex(skeleton, &chunks, neighbor, back, 3),
            NeighborVertex::Found(chunks.ring(first)[ring_index(2)])
        );
        assert_eq!(
            find_neighbor_vertex(skeleton, &chunks, neighbor, back, 2),
            NeighborVertex::Found(chunks.ring(first)[ring_index(4)])
        );
    }
}
