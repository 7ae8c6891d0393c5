//! Full consistency check of a terrain skeleton.
//!
//! Walks every live triangle; meant for tests and debug runs, not per frame.

use crate::error::TerrainError;
use crate::ids::{SkTriId, SkVrtxId};
use crate::terrain::TerrainSkeleton;

macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(TerrainError::Invariant(format!($($arg)+)));
        }
    };
}

/// Verify neighbor symmetry, the two adjacency rules, vertex reference
/// counts and the per-level bitsets.
pub fn check_invariants(terrain: &TerrainSkeleton) -> Result<(), TerrainError> {
    let skeleton = terrain.skeleton();
    let mut vertex_uses = vec![0u32; skeleton.vertex_id_bound()];

    for tri in skeleton.triangle_ids() {
        let triangle = skeleton.tri(tri);
        let depth = skeleton.depth(tri);
        for vertex in triangle.vertices {
            vertex_uses[vertex.index()] += 1;
        }

        let mut leaf_neighbors = 0;
        let mut subdivided_neighbors = 0;
        for (side, neighbor) in triangle.neighbors.into_iter().enumerate() {
            let Some(neighbor) = neighbor else {
                ensure!(
                    triangle.is_leaf(),
                    "subdivided {tri} borders a coarser leaf on side {side}"
                );
                continue;
            };
            ensure!(skeleton.exists(neighbor), "{tri} links to dead {neighbor}");
            ensure!(
                skeleton.depth(neighbor) == depth,
                "{tri} links to {neighbor} at another depth"
            );
            let Some(back) = skeleton.tri(neighbor).neighbor_side(tri) else {
                return Err(TerrainError::Invariant(format!(
                    "{neighbor} does not link back to {tri}"
                )));
            };
            let theirs = skeleton.tri(neighbor).vertices;
            let (s, b) = (side, usize::from(back));
            ensure!(
                triangle.vertices[s] == theirs[(b + 1) % 3] && triangle.vertices[(s + 1) % 3] == theirs[b],
                "{tri} side {s} and {neighbor} side {b} do not share an edge"
            );

            match skeleton.children(neighbor) {
                None => leaf_neighbors += 1,
                Some(_) => subdivided_neighbors += 1,
            }
            if let Some(group) = triangle.children
                && skeleton.is_leaf(neighbor)
            {
                let s = side as u8;
                ensure!(
                    skeleton.is_leaf(group.child(s)) && skeleton.is_leaf(group.child((s + 1) % 3)),
                    "{tri} has subdivided children along leaf neighbor {neighbor}"
                );
            }
        }

        if triangle.is_leaf() {
            ensure!(
                subdivided_neighbors <= 1,
                "leaf {tri} borders {subdivided_neighbors} subdivided triangles"
            );
        } else if let Some(group) = triangle.children {
            for c in 0..4 {
                let child = group.child(c);
                ensure!(
                    skeleton.parent(child) == Some(tri) && skeleton.depth(child) == depth + 1,
                    "{child} has wrong parent or depth"
                );
            }
        }

        let Some(level) = terrain.level(depth) else {
            return Err(TerrainError::Invariant(format!(
                "no bookkeeping for depth {depth}"
            )));
        };
        ensure!(
            level.has_non_subdived_neighbor.contains(tri.index())
                == (!triangle.is_leaf() && leaf_neighbors > 0),
            "stale has_non_subdived_neighbor bit for {tri}"
        );
        ensure!(
            level.has_subdived_neighbor.contains(tri.index())
                == (triangle.is_leaf() && subdivided_neighbors > 0),
            "stale has_subdived_neighbor bit for {tri}"
        );
    }

    for (index, &uses) in vertex_uses.iter().enumerate() {
        let vertex = SkVrtxId(index as u32);
        let refcount = skeleton.vertex_refcount(vertex);
        ensure!(
            uses == refcount,
            "{vertex} is used by {uses} triangles but has refcount {refcount}"
        );
    }

    for (depth, level) in terrain.levels().iter().enumerate() {
        for index in level
            .has_non_subdived_neighbor
            .iter()
            .chain(level.has_subdived_neighbor.iter())
        {
            let tri = SkTriId(index as u32);
            ensure!(
                skeleton.exists(tri) && usize::from(skeleton.depth(tri)) == depth,
                "level {depth} bookkeeping lists {tri} which is not at that depth"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{SphereSurface, TerrainParams};
    use icoplanet_math::UnitScale;

    fn terrain() -> TerrainSkeleton {
        let params = TerrainParams {
            radius_m: 500.0,
            min_height_m: 0.0,
            max_height_m: 0.0,
            scale: UnitScale::new(6),
        };
        TerrainSkeleton::new(params, Box::new(SphereSurface { radius_m: 500.0 })).unwrap()
    }

    #[test]
    fn test_fresh_icosahedron_is_consistent() {
        check_invariants(&terrain()).unwrap();
    }

    #[test]
    fn test_single_subdivision_is_consistent() {
        let mut terrain = terrain();
        terrain.subdivide(SkTriId(9)).unwrap();
        check_invariants(&terrain).unwrap();
    }

    #[test]
    fn test_leaf_between_two_subdivided_detected() {
        let mut terrain = terrain();
        let [a, b, _] = terrain.skeleton().tri(SkTriId(0)).neighbors.map(Option::unwrap);
        terrain.subdivide(a).unwrap();
        terrain.subdivide(b).unwrap();
        let err = check_invariants(&terrain).unwrap_err();
        assert!(err.to_string().contains("borders 2 subdivided"), "{err}");
    }

    #[test]
    fn test_subdivided_child_next_to_coarse_leaf_detected() {
        let mut terrain = terrain();
        let group = terrain.subdivide(SkTriId(0)).unwrap().group;
        terrain.subdivide(group.child(0)).unwrap();
        assert!(check_invariants(&terrain).is_err());
    }
}
