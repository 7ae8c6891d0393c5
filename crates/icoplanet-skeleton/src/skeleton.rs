//! Subdivision tree topology: triangles, groups, neighbor links and
//! reference-counted vertices.
//!
//! Side `s` of a triangle runs from corner `s` to corner `(s + 1) % 3` and its
//! midpoint is `m_s`. A subdivided triangle owns one group of children:
//!
//! ```text
//! 0 = (v0, m0, m2)   1 = (m0, v1, m1)   2 = (m2, m1, v2)   3 = (m1, m2, m0)
//! ```
//!
//! Along the parent's side `s` lie child `s` (first half) and child
//! `(s + 1) % 3` (second half), each using its own side `s`. Neighbor links
//! only ever connect triangles of the same depth; a missing link means the
//! triangle across that edge is a coarser leaf.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::icosahedron::{icosahedron_directions, oriented_faces};
use crate::ids::{MaybeNewId, SkTriGroupId, SkTriId, SkVrtxId};

/// One triangle of the skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkeletonTriangle {
    /// Corners, counter-clockwise seen from outside.
    pub vertices: [SkVrtxId; 3],
    /// Same-depth neighbor across each side.
    pub neighbors: [Option<SkTriId>; 3],
    /// Child group, if subdivided.
    pub children: Option<SkTriGroupId>,
}

impl SkeletonTriangle {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Which side borders `neighbor`, if any.
    pub fn neighbor_side(&self, neighbor: SkTriId) -> Option<u8> {
        self.neighbors
            .iter()
            .position(|&n| n == Some(neighbor))
            .map(|side| side as u8)
    }
}

/// Four sibling triangles created together by one subdivision.
#[derive(Debug, Clone)]
pub struct SkTriGroup {
    pub triangles: [SkeletonTriangle; 4],
    /// The subdivided triangle, `None` for root groups.
    pub parent: Option<SkTriId>,
    pub depth: u8,
}

/// Result of [`SubdivTriangleSkeleton::subdivide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subdivided {
    pub group: SkTriGroupId,
    pub corners: [SkVrtxId; 3],
    /// Edge midpoints `m0, m1, m2`; `is_new` when this call created them.
    pub midpoints: [MaybeNewId<SkVrtxId>; 3],
}

/// Result of [`SubdivTriangleSkeleton::unsubdivide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubdivided {
    pub group: SkTriGroupId,
    pub children: [SkTriId; 4],
    /// Vertices no longer referenced by any triangle.
    pub removed_vertices: Vec<SkVrtxId>,
}

/// Maps a normalized position `x` along a triangle's side to the same side
/// of an ancestor: `x' = (x + offset) / 2^shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideTransform {
    pub ancestor: SkTriId,
    pub shift: u32,
    pub offset: u64,
}

impl SideTransform {
    /// Apply to the exact fraction `num / den`.
    pub fn apply(&self, num: u64, den: u64) -> (u64, u64) {
        (num + self.offset * den, den << self.shift)
    }
}

/// Arena of triangle groups and vertex reference counts.
#[derive(Debug, Clone)]
pub struct SubdivTriangleSkeleton {
    groups: Vec<Option<SkTriGroup>>,
    group_free: Vec<u32>,
    root_groups: u32,
    vertex_refs: Vec<u32>,
    vertex_free: Vec<u32>,
    vertex_live: usize,
    midpoints: FxHashMap<(SkVrtxId, SkVrtxId), SkVrtxId>,
    midpoint_edges: FxHashMap<SkVrtxId, (SkVrtxId, SkVrtxId)>,
}

#[inline]
fn edge_key(a: SkVrtxId, b: SkVrtxId) -> (SkVrtxId, SkVrtxId) {
    if a < b { (a, b) } else { (b, a) }
}

impl SubdivTriangleSkeleton {
    /// The 20-triangle icosahedron with vertices `0..12` matching
    /// [`icosahedron_directions`].
    pub fn icosahedron() -> Self {
        let directions = icosahedron_directions();
        Self::from_root_mesh(directions.len(), &oriented_faces(&directions))
    }

    /// Build depth-0 triangles from a closed, consistently wound mesh.
    ///
    /// # Panics
    ///
    /// Panics if the face count is not a multiple of 4 or an edge has no
    /// opposite partner.
    pub fn from_root_mesh(vertex_count: usize, faces: &[[u32; 3]]) -> Self {
        assert!(
            faces.len() % 4 == 0,
            "root face count must be a multiple of 4"
        );

        let mut vertex_refs = vec![0u32; vertex_count];
        let mut edges: FxHashMap<(u32, u32), (usize, usize)> = FxHashMap::default();
        for (face_index, face) in faces.iter().enumerate() {
            for side in 0..3 {
                vertex_refs[face[side] as usize] += 1;
                edges.insert((face[side], face[(side + 1) % 3]), (face_index, side));
            }
        }

        let triangles: Vec<SkeletonTriangle> = faces
            .iter()
            .map(|face| {
                let mut neighbors = [None; 3];
                for (side, neighbor) in neighbors.iter_mut().enumerate() {
                    let reversed = (face[(side + 1) % 3], face[side]);
                    let Some(&(other, _)) = edges.get(&reversed) else {
                        panic!("root mesh edge {reversed:?} has no partner");
                    };
                    *neighbor = Some(SkTriId(other as u32));
                }
                SkeletonTriangle {
                    vertices: (*face).map(SkVrtxId),
                    neighbors,
                    children: None,
                }
            })
            .collect();

        let groups: Vec<Option<SkTriGroup>> = triangles
            .chunks_exact(4)
            .map(|tris| {
                Some(SkTriGroup {
                    triangles: [tris[0], tris[1], tris[2], tris[3]],
                    parent: None,
                    depth: 0,
                })
            })
            .collect();

        Self {
            root_groups: groups.len() as u32,
            groups,
            group_free: Vec::new(),
            vertex_refs,
            vertex_free: Vec::new(),
            vertex_live: vertex_count,
            midpoints: FxHashMap::default(),
            midpoint_edges: FxHashMap::default(),
        }
    }

    // --- Lookups ---

    /// # Panics
    ///
    /// Panics if the group was destroyed.
    pub fn group(&self, id: SkTriGroupId) -> &SkTriGroup {
        match self.groups.get(id.index()) {
            Some(Some(group)) => group,
            _ => panic!("{id} does not exist"),
        }
    }

    /// # Panics
    ///
    /// Panics if the triangle was destroyed.
    #[inline]
    pub fn tri(&self, id: SkTriId) -> &SkeletonTriangle {
        &self.group(id.group()).triangles[id.sibling() as usize]
    }

    fn tri_mut(&mut self, id: SkTriId) -> &mut SkeletonTriangle {
        match self.groups.get_mut(id.group().index()) {
            Some(Some(group)) => &mut group.triangles[id.sibling() as usize],
            _ => panic!("{id} does not exist"),
        }
    }

    pub fn exists(&self, id: SkTriId) -> bool {
        matches!(self.groups.get(id.group().index()), Some(Some(_)))
    }

    #[inline]
    pub fn parent(&self, id: SkTriId) -> Option<SkTriId> {
        self.group(id.group()).parent
    }

    #[inline]
    pub fn depth(&self, id: SkTriId) -> u8 {
        self.group(id.group()).depth
    }

    #[inline]
    pub fn is_leaf(&self, id: SkTriId) -> bool {
        self.tri(id).is_leaf()
    }

    /// Child group of a subdivided triangle.
    #[inline]
    pub fn children(&self, id: SkTriId) -> Option<SkTriGroupId> {
        self.tri(id).children
    }

    /// The depth-0 triangles.
    pub fn root_triangles(&self) -> impl Iterator<Item = SkTriId> + '_ {
        (0..self.root_groups * 4).map(SkTriId)
    }

    /// Live groups in id order.
    pub fn group_ids(&self) -> impl Iterator<Item = SkTriGroupId> + '_ {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.is_some())
            .map(|(index, _)| SkTriGroupId(index as u32))
    }

    /// Live triangles in id order.
    pub fn triangle_ids(&self) -> impl Iterator<Item = SkTriId> + '_ {
        self.group_ids().flat_map(|group| (0..4).map(move |s| group.child(s)))
    }

    /// Live triangles at `depth`, in id order.
    pub fn triangles_at_depth(&self, depth: u8) -> impl Iterator<Item = SkTriId> + '_ {
        self.groups
            .iter()
            .enumerate()
            .filter(move |(_, group)| group.as_ref().is_some_and(|g| g.depth == depth))
            .flat_map(|(index, _)| (0..4).map(move |s| SkTriGroupId(index as u32).child(s)))
    }

    /// Upper bound on triangle ids handed out so far, for sizing dense arrays.
    pub fn tri_id_bound(&self) -> usize {
        self.groups.len() * 4
    }

    /// Upper bound on vertex ids handed out so far.
    pub fn vertex_id_bound(&self) -> usize {
        self.vertex_refs.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len() - self.group_free.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_live
    }

    /// Number of live triangles with `vertex` as a corner.
    pub fn vertex_refcount(&self, vertex: SkVrtxId) -> u32 {
        self.vertex_refs.get(vertex.index()).copied().unwrap_or(0)
    }

    /// The existing midpoint vertex of edge `a`-`b`, in either direction.
    pub fn midpoint(&self, a: SkVrtxId, b: SkVrtxId) -> Option<SkVrtxId> {
        self.midpoints.get(&edge_key(a, b)).copied()
    }

    /// The edge a midpoint vertex was created on.
    pub fn midpoint_edge(&self, vertex: SkVrtxId) -> Option<(SkVrtxId, SkVrtxId)> {
        self.midpoint_edges.get(&vertex).copied()
    }

    pub fn midpoint_count(&self) -> usize {
        self.midpoints.len()
    }

    /// Which of `tri`'s sides borders `neighbor`.
    ///
    /// # Panics
    ///
    /// Panics if the two triangles are not neighbors.
    pub fn neighbor_side(&self, tri: SkTriId, neighbor: SkTriId) -> u8 {
        self.tri(tri)
            .neighbor_side(neighbor)
            .unwrap_or_else(|| panic!("{neighbor} is not a neighbor of {tri}"))
    }

    /// Transform from `tri`'s side to the same side of its ancestor at `depth`.
    ///
    /// Returns `None` if the side leaves the ancestor's edge on the way up
    /// (it runs through the interior of some ancestor).
    pub fn transform_to_ancestor(&self, tri: SkTriId, side: u8, depth: u8) -> Option<SideTransform> {
        let mut current = tri;
        let mut shift = 0u32;
        let mut offset = 0u64;
        while self.depth(current) > depth {
            let sibling = current.sibling();
            let second_half = if sibling == side {
                0
            } else if sibling == (side + 1) % 3 {
                1
            } else {
                return None;
            };
            offset += second_half << shift;
            shift += 1;
            current = self.parent(current)?;
        }
        Some(SideTransform {
            ancestor: current,
            shift,
            offset,
        })
    }

    // --- Structural edits ---

    /// Split a leaf into 4 children, creating or reusing its edge midpoints
    /// and linking the children to already-subdivided neighbors.
    ///
    /// # Panics
    ///
    /// Panics if `tri` is already subdivided.
    pub fn subdivide(&mut self, tri: SkTriId) -> Subdivided {
        let parent = *self.tri(tri);
        assert!(parent.is_leaf(), "cannot subdivide {tri}: already subdivided");
        let depth = self.depth(tri) + 1;

        let corners = parent.vertices;
        let midpoints = [0, 1, 2].map(|side| (corners[side], corners[(side + 1) % 3]));
        let midpoints = midpoints.map(|(a, b)| self.midpoint_or_create(a, b));

        let [v0, v1, v2] = corners;
        let [m0, m1, m2] = midpoints.map(|m| m.id);
        let child_vertices = [[v0, m0, m2], [m0, v1, m1], [m2, m1, v2], [m1, m2, m0]];

        let group = self.alloc_group();
        let center = group.child(3);
        let mut internal = [[None; 3]; 4];
        internal[0][1] = Some(center);
        internal[1][2] = Some(center);
        internal[2][0] = Some(center);
        internal[3] = [Some(group.child(2)), Some(group.child(0)), Some(group.child(1))];

        let triangles = [0, 1, 2, 3].map(|c| SkeletonTriangle {
            vertices: child_vertices[c],
            neighbors: internal[c],
            children: None,
        });
        for vertex in child_vertices.iter().flatten() {
            self.vertex_refs[vertex.index()] += 1;
        }
        self.groups[group.index()] = Some(SkTriGroup {
            triangles,
            parent: Some(tri),
            depth,
        });

        for side in 0..3u8 {
            let Some(neighbor) = parent.neighbors[side as usize] else {
                continue;
            };
            let Some(neighbor_group) = self.tri(neighbor).children else {
                continue;
            };
            let ns = self.neighbor_side(neighbor, tri);
            self.link(
                group.child(side),
                side,
                neighbor_group.child((ns + 1) % 3),
                ns,
            );
            self.link(group.child((side + 1) % 3), side, neighbor_group.child(ns), ns);
        }

        self.tri_mut(tri).children = Some(group);
        trace!(%tri, %group, depth, "subdivided");

        Subdivided {
            group,
            corners,
            midpoints,
        }
    }

    /// Vertices that [`unsubdivide`](Self::unsubdivide) would release.
    pub fn releases_on_unsubdivide(&self, tri: SkTriId) -> Vec<SkVrtxId> {
        let Some(group) = self.tri(tri).children else {
            return Vec::new();
        };
        let mut uses: Vec<(SkVrtxId, u32)> = Vec::with_capacity(6);
        for triangle in &self.group(group).triangles {
            for &vertex in &triangle.vertices {
                match uses.iter_mut().find(|(v, _)| *v == vertex) {
                    Some((_, count)) => *count += 1,
                    None => uses.push((vertex, 1)),
                }
            }
        }
        uses.into_iter()
            .filter(|&(vertex, count)| self.vertex_refs[vertex.index()] == count)
            .map(|(vertex, _)| vertex)
            .collect()
    }

    /// Destroy the children of `tri`, making it a leaf again.
    ///
    /// # Panics
    ///
    /// Panics if `tri` is a leaf or any child is subdivided.
    pub fn unsubdivide(&mut self, tri: SkTriId) -> Unsubdivided {
        let Some(group) = self.tri(tri).children else {
            panic!("cannot unsubdivide {tri}: it is a leaf");
        };
        let children = [0, 1, 2, 3].map(|c| group.child(c));
        for child in children {
            assert!(
                self.is_leaf(child),
                "cannot unsubdivide {tri}: child {child} is subdivided"
            );
        }

        for child in children {
            let neighbors = self.tri(child).neighbors;
            for neighbor in neighbors.into_iter().flatten() {
                if neighbor.group() != group {
                    let ns = self.neighbor_side(neighbor, child);
                    self.tri_mut(neighbor).neighbors[ns as usize] = None;
                }
            }
        }

        let removed_vertices = self.releases_on_unsubdivide(tri);
        let child_vertices = self.group(group).triangles.map(|t| t.vertices);
        for vertex in child_vertices.iter().flatten() {
            self.vertex_refs[vertex.index()] -= 1;
        }
        for &vertex in &removed_vertices {
            self.free_vertex(vertex);
        }

        self.groups[group.index()] = None;
        self.group_free.push(group.0);
        self.tri_mut(tri).children = None;
        trace!(%tri, %group, removed = removed_vertices.len(), "unsubdivided");

        Unsubdivided {
            group,
            children,
            removed_vertices,
        }
    }

    fn link(&mut self, a: SkTriId, side_a: u8, b: SkTriId, side_b: u8) {
        self.tri_mut(a).neighbors[side_a as usize] = Some(b);
        self.tri_mut(b).neighbors[side_b as usize] = Some(a);
    }

    fn alloc_group(&mut self) -> SkTriGroupId {
        match self.group_free.pop() {
            Some(index) => SkTriGroupId(index),
            None => {
                self.groups.push(None);
                SkTriGroupId(self.groups.len() as u32 - 1)
            }
        }
    }

    fn midpoint_or_create(&mut self, a: SkVrtxId, b: SkVrtxId) -> MaybeNewId<SkVrtxId> {
        let key = edge_key(a, b);
        if let Some(&id) = self.midpoints.get(&key) {
            return MaybeNewId { id, is_new: false };
        }
        let id = match self.vertex_free.pop() {
            Some(index) => SkVrtxId(index),
            None => {
                self.vertex_refs.push(0);
                SkVrtxId(self.vertex_refs.len() as u32 - 1)
            }
        };
        self.vertex_live += 1;
        self.midpoints.insert(key, id);
        self.midpoint_edges.insert(id, key);
        MaybeNewId { id, is_new: true }
    }

    fn free_vertex(&mut self, vertex: SkVrtxId) {
        if let Some(edge) = self.midpoint_edges.remove(&vertex) {
            self.midpoints.remove(&edge);
        }
        self.vertex_free.push(vertex.0);
        self.vertex_live -= 1;
    }
}
