//! Terrain skeleton: the subdivision tree plus planet-scale vertex positions,
//! raised triangle centers and per-level neighbor bookkeeping.

use glam::DVec3;
use icoplanet_math::{UnitScale, Vec3I128};

use crate::bitset::BitSet;
use crate::error::TerrainError;
use crate::icosahedron::icosahedron_directions;
use crate::ids::{SkTriId, SkVrtxId};
use crate::skeleton::{SubdivTriangleSkeleton, Subdivided, Unsubdivided};

/// Radius of the terrain along a direction from the planet center.
pub trait Surface {
    /// Distance in meters from the center to the surface along the unit
    /// vector `direction`, or `None` if there is no data there.
    fn radius(&self, direction: DVec3) -> Option<f64>;
}

impl<F> Surface for F
where
    F: Fn(DVec3) -> Option<f64>,
{
    fn radius(&self, direction: DVec3) -> Option<f64> {
        self(direction)
    }
}

/// A perfectly round planet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereSurface {
    pub radius_m: f64,
}

impl Surface for SphereSurface {
    fn radius(&self, _direction: DVec3) -> Option<f64> {
        Some(self.radius_m)
    }
}

/// Planet shape parameters shared by the skeleton and the chunk mesher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainParams {
    pub radius_m: f64,
    pub min_height_m: f64,
    pub max_height_m: f64,
    pub scale: UnitScale,
}

impl TerrainParams {
    /// Radius triangle centers are raised to: halfway through the height range.
    pub fn center_radius_m(&self) -> f64 {
        self.radius_m + (self.min_height_m + self.max_height_m) * 0.5
    }
}

/// Bookkeeping for one subdivision level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Level {
    /// Subdivided triangles with at least one leaf neighbor.
    pub has_non_subdived_neighbor: BitSet,
    /// Leaf triangles with at least one subdivided neighbor.
    pub has_subdived_neighbor: BitSet,
}

/// The subdivision tree with positions attached.
pub struct TerrainSkeleton {
    skeleton: SubdivTriangleSkeleton,
    params: TerrainParams,
    surface: Box<dyn Surface>,
    positions: Vec<Vec3I128>,
    normals: Vec<DVec3>,
    centers: Vec<Vec3I128>,
    levels: Vec<Level>,
}

impl TerrainSkeleton {
    /// Build the depth-0 icosahedron projected onto `surface`.
    pub fn new(params: TerrainParams, surface: Box<dyn Surface>) -> Result<Self, TerrainError> {
        let mut terrain = Self {
            skeleton: SubdivTriangleSkeleton::icosahedron(),
            params,
            surface,
            positions: Vec::new(),
            normals: Vec::new(),
            centers: Vec::new(),
            levels: vec![Level::default()],
        };
        for direction in icosahedron_directions() {
            let (position, normal) = terrain.project(direction)?;
            terrain.positions.push(position);
            terrain.normals.push(normal);
        }
        let roots: Vec<SkTriId> = terrain.skeleton.root_triangles().collect();
        terrain.centers.resize(terrain.skeleton.tri_id_bound(), Vec3I128::zero());
        for tri in roots {
            terrain.centers[tri.index()] = terrain.compute_center(tri);
        }
        Ok(terrain)
    }

    pub fn skeleton(&self) -> &SubdivTriangleSkeleton {
        &self.skeleton
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    pub fn scale(&self) -> UnitScale {
        self.params.scale
    }

    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// Vertex position in skeleton units.
    #[inline]
    pub fn position(&self, vertex: SkVrtxId) -> Vec3I128 {
        self.positions[vertex.index()]
    }

    /// Vertex position in meters.
    pub fn position_m(&self, vertex: SkVrtxId) -> DVec3 {
        self.params.scale.vec_to_meters(self.position(vertex))
    }

    #[inline]
    pub fn normal(&self, vertex: SkVrtxId) -> DVec3 {
        self.normals[vertex.index()]
    }

    /// Representative point used for LOD distance checks, in skeleton units.
    #[inline]
    pub fn center(&self, tri: SkTriId) -> Vec3I128 {
        self.centers[tri.index()]
    }

    pub fn level(&self, depth: u8) -> Option<&Level> {
        self.levels.get(usize::from(depth))
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Surface point along `direction`, in meters.
    pub fn surface_point_m(&self, direction: DVec3) -> Result<DVec3, TerrainError> {
        let direction = direction.normalize();
        self.surface
            .radius(direction)
            .filter(|r| r.is_finite())
            .map(|r| direction * r)
            .ok_or(TerrainError::MissingSurface(direction))
    }

    /// Surface point along `direction` in skeleton units, with its normal.
    pub fn project(&self, direction: DVec3) -> Result<(Vec3I128, DVec3), TerrainError> {
        let point = self.surface_point_m(direction)?;
        Ok((self.params.scale.vec_to_units(point), direction.normalize()))
    }

    /// Subdivide a leaf, projecting any new edge midpoints onto the surface.
    ///
    /// Nothing changes if the surface has no data for a new midpoint.
    pub fn subdivide(&mut self, tri: SkTriId) -> Result<Subdivided, TerrainError> {
        let corners = self.skeleton.tri(tri).vertices;
        let mut projected = [None; 3];
        for side in 0..3 {
            let (a, b) = (corners[side], corners[(side + 1) % 3]);
            if self.skeleton.midpoint(a, b).is_none() {
                let mid = self.position(a).midpoint(self.position(b));
                projected[side] = Some(self.project(mid.as_dvec3())?);
            }
        }

        let result = self.skeleton.subdivide(tri);
        let vertex_bound = self.skeleton.vertex_id_bound();
        self.positions.resize(vertex_bound, Vec3I128::zero());
        self.normals.resize(vertex_bound, DVec3::ZERO);
        for (midpoint, projected) in result.midpoints.iter().zip(projected) {
            if midpoint.is_new
                && let Some((position, normal)) = projected
            {
                self.positions[midpoint.id.index()] = position;
                self.normals[midpoint.id.index()] = normal;
            }
        }

        self.centers.resize(self.skeleton.tri_id_bound(), Vec3I128::zero());
        let children = [0, 1, 2, 3].map(|c| result.group.child(c));
        for child in children {
            self.centers[child.index()] = self.compute_center(child);
        }

        self.refresh_around(tri);
        for child in children {
            self.refresh_around(child);
        }
        Ok(result)
    }

    /// Remove the children of `tri`.
    pub fn unsubdivide(&mut self, tri: SkTriId) -> Unsubdivided {
        let child_depth = usize::from(self.skeleton.depth(tri)) + 1;
        let mut outside: Vec<SkTriId> = Vec::with_capacity(6);
        if let Some(group) = self.skeleton.children(tri) {
            for c in 0..4 {
                let neighbors = self.skeleton.tri(group.child(c)).neighbors;
                outside.extend(neighbors.into_iter().flatten().filter(|n| n.group() != group));
            }
        }

        let result = self.skeleton.unsubdivide(tri);
        if let Some(level) = self.levels.get_mut(child_depth) {
            for child in result.children {
                level.has_non_subdived_neighbor.remove(child.index());
                level.has_subdived_neighbor.remove(child.index());
            }
        }
        self.refresh_around(tri);
        for neighbor in outside {
            self.refresh_level_bits(neighbor);
        }
        result
    }

    fn compute_center(&self, tri: SkTriId) -> Vec3I128 {
        let [a, b, c] = self.skeleton.tri(tri).vertices.map(|v| self.position(v));
        let direction = Vec3I128::average3(a, b, c).as_dvec3().normalize();
        self.params
            .scale
            .vec_to_units(direction * self.params.center_radius_m())
    }

    fn refresh_around(&mut self, tri: SkTriId) {
        self.refresh_level_bits(tri);
        let neighbors = self.skeleton.tri(tri).neighbors;
        for neighbor in neighbors.into_iter().flatten() {
            self.refresh_level_bits(neighbor);
        }
    }

    fn refresh_level_bits(&mut self, tri: SkTriId) {
        let depth = usize::from(self.skeleton.depth(tri));
        if self.levels.len() <= depth {
            self.levels.resize_with(depth + 1, Level::default);
        }
        let skeleton = &self.skeleton;
        let triangle = skeleton.tri(tri);
        let subdivided = !triangle.is_leaf();
        let mut leaf_neighbor = false;
        let mut subdivided_neighbor = false;
        for neighbor in triangle.neighbors.into_iter().flatten() {
            if skeleton.is_leaf(neighbor) {
                leaf_neighbor = true;
            } else {
                subdivided_neighbor = true;
            }
        }
        let level = &mut self.levels[depth];
        level
            .has_non_subdived_neighbor
            .set(tri.index(), subdivided && leaf_neighbor);
        level
            .has_subdived_neighbor
            .set(tri.index(), !subdivided && subdivided_neighbor);
    }
}
