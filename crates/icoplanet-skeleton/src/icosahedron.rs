//! The depth-0 icosahedron: 12 vertex directions and 20 faces.

use glam::DVec3;

const PHI: f64 = 1.618_033_988_749_895;

/// Corner indices of the 20 icosahedron faces into [`icosahedron_directions`].
pub const ICO_FACES: [[u32; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

/// Unit directions of the 12 icosahedron vertices.
pub fn icosahedron_directions() -> [DVec3; 12] {
    [
        DVec3::new(-1.0, PHI, 0.0),
        DVec3::new(1.0, PHI, 0.0),
        DVec3::new(-1.0, -PHI, 0.0),
        DVec3::new(1.0, -PHI, 0.0),
        DVec3::new(0.0, -1.0, PHI),
        DVec3::new(0.0, 1.0, PHI),
        DVec3::new(0.0, -1.0, -PHI),
        DVec3::new(0.0, 1.0, -PHI),
        DVec3::new(PHI, 0.0, -1.0),
        DVec3::new(PHI, 0.0, 1.0),
        DVec3::new(-PHI, 0.0, -1.0),
        DVec3::new(-PHI, 0.0, 1.0),
    ]
    .map(DVec3::normalize)
}

/// Faces with corners reordered so each winds counter-clockwise seen from
/// outside: `(v1 - v0) x (v2 - v0)` points away from the origin.
pub fn oriented_faces(directions: &[DVec3]) -> Vec<[u32; 3]> {
    ICO_FACES
        .iter()
        .map(|&[a, b, c]| {
            let (pa, pb, pc) = (
                directions[a as usize],
                directions[b as usize],
                directions[c as usize],
            );
            let outward = (pb - pa).cross(pc - pa).dot(pa + pb + pc) > 0.0;
            if outward { [a, b, c] } else { [a, c, b] }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_directions_are_unit() {
        for dir in icosahedron_directions() {
            assert!((dir.length() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_faces_wind_outward() {
        let dirs = icosahedron_directions();
        for [a, b, c] in oriented_faces(&dirs) {
            let (pa, pb, pc) = (dirs[a as usize], dirs[b as usize], dirs[c as usize]);
            assert!((pb - pa).cross(pc - pa).dot(pa) > 0.0);
        }
    }

    #[test]
    fn test_every_edge_shared_by_two_faces_in_opposite_directions() {
        let faces = oriented_faces(&icosahedron_directions());
        let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
        for face in &faces {
            for side in 0..3 {
                *directed.entry((face[side], face[(side + 1) % 3])).or_default() += 1;
            }
        }
        assert_eq!(directed.len(), 60);
        for (&(a, b), &count) in &directed {
            assert_eq!(count, 1);
            assert_eq!(directed.get(&(b, a)), Some(&1));
        }
    }

    #[test]
    fn test_each_vertex_has_five_faces() {
        let mut valence = [0; 12];
        for face in ICO_FACES {
            for v in face {
                valence[v as usize] += 1;
            }
        }
        assert!(valence.iter().all(|&n| n == 5));
    }
}
