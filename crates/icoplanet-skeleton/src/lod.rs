//! Distance-based selection of triangles to subdivide or unsubdivide.

use icoplanet_math::{UnitScale, Vec3I128, is_within_distance};

use crate::error::TerrainError;
use crate::ids::SkTriId;
use crate::terrain::TerrainSkeleton;

/// Per-level distance thresholds in skeleton units.
///
/// Level `l` applies to triangles at depth `l`: leaves closer than
/// `subdivide[l]` split, subdivided triangles farther than `unsubdivide[l]`
/// merge back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LodThresholds {
    subdivide: Vec<u64>,
    unsubdivide: Vec<u64>,
}

impl LodThresholds {
    /// # Panics
    ///
    /// Panics if the lists differ in length or a level lacks hysteresis.
    pub fn new(subdivide: Vec<u64>, unsubdivide: Vec<u64>) -> Self {
        assert_eq!(
            subdivide.len(),
            unsubdivide.len(),
            "threshold lists must have one entry per level"
        );
        for (level, (sub, unsub)) in subdivide.iter().zip(&unsubdivide).enumerate() {
            assert!(
                unsub > sub,
                "level {level}: unsubdivide threshold must exceed subdivide threshold"
            );
        }
        Self {
            subdivide,
            unsubdivide,
        }
    }

    /// Convert per-level distances in meters to skeleton units.
    ///
    /// Fails unless both lists have the same length, every distance fits
    /// `u64` units and each level keeps its hysteresis after rounding.
    pub fn from_meters(
        subdivide_m: &[f64],
        unsubdivide_m: &[f64],
        scale: UnitScale,
    ) -> Result<Self, TerrainError> {
        if subdivide_m.len() != unsubdivide_m.len() {
            return Err(TerrainError::Thresholds(format!(
                "{} subdivide but {} unsubdivide distances",
                subdivide_m.len(),
                unsubdivide_m.len()
            )));
        }
        let to_units = |meters: f64| {
            u64::try_from(scale.to_units(meters))
                .ok()
                .filter(|&units| meters.is_finite() && units < u64::MAX)
                .ok_or_else(|| {
                    TerrainError::Thresholds(format!(
                        "{meters} m does not fit at {} units per meter",
                        scale.units_per_meter()
                    ))
                })
        };
        let mut subdivide = Vec::with_capacity(subdivide_m.len());
        let mut unsubdivide = Vec::with_capacity(unsubdivide_m.len());
        for (level, (&sub, &unsub)) in subdivide_m.iter().zip(unsubdivide_m).enumerate() {
            let (sub, unsub) = (to_units(sub)?, to_units(unsub)?);
            if unsub <= sub {
                return Err(TerrainError::Thresholds(format!(
                    "level {level}: unsubdivide distance must exceed subdivide distance"
                )));
            }
            subdivide.push(sub);
            unsubdivide.push(unsub);
        }
        Ok(Self::new(subdivide, unsubdivide))
    }

    /// Number of levels that can subdivide.
    pub fn levels(&self) -> usize {
        self.subdivide.len()
    }

    pub fn subdivide_distance(&self, level: u8) -> Option<u64> {
        self.subdivide.get(usize::from(level)).copied()
    }

    pub fn unsubdivide_distance(&self, level: u8) -> Option<u64> {
        self.unsubdivide.get(usize::from(level)).copied()
    }
}

/// Walks one level at a time and queues triangles by viewer distance.
#[derive(Debug, Clone)]
pub struct LodSelector {
    thresholds: LodThresholds,
    distance_checks: u64,
}

impl LodSelector {
    pub fn new(thresholds: LodThresholds) -> Self {
        Self {
            thresholds,
            distance_checks: 0,
        }
    }

    pub fn thresholds(&self) -> &LodThresholds {
        &self.thresholds
    }

    /// Distance comparisons made since the last reset.
    pub fn distance_checks(&self) -> u64 {
        self.distance_checks
    }

    pub fn reset_distance_checks(&mut self) {
        self.distance_checks = 0;
    }

    /// Leaves at `level` whose raised center is within the subdivide threshold.
    pub fn select_for_subdivision(
        &mut self,
        terrain: &TerrainSkeleton,
        level: u8,
        viewer: Vec3I128,
    ) -> Vec<SkTriId> {
        let Some(threshold) = self.thresholds.subdivide_distance(level) else {
            return Vec::new();
        };
        let skeleton = terrain.skeleton();
        let mut selected = Vec::new();
        for tri in skeleton.triangles_at_depth(level) {
            if !skeleton.is_leaf(tri) {
                continue;
            }
            self.distance_checks += 1;
            if is_within_distance(terrain.center(tri), viewer, threshold) {
                selected.push(tri);
            }
        }
        selected
    }

    /// Subdivided triangles at `level` with only leaf children whose raised
    /// center is beyond the unsubdivide threshold.
    pub fn select_for_unsubdivision(
        &mut self,
        terrain: &TerrainSkeleton,
        level: u8,
        viewer: Vec3I128,
    ) -> Vec<SkTriId> {
        let Some(threshold) = self.thresholds.unsubdivide_distance(level) else {
            return Vec::new();
        };
        let skeleton = terrain.skeleton();
        let mut selected = Vec::new();
        for tri in skeleton.triangles_at_depth(level) {
            let Some(group) = skeleton.children(tri) else {
                continue;
            };
            if !(0..4).all(|c| skeleton.is_leaf(group.child(c))) {
                continue;
            }
            self.distance_checks += 1;
            if !is_within_distance(terrain.center(tri), viewer, threshold) {
                selected.push(tri);
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{SphereSurface, TerrainParams};

    fn terrain() -> TerrainSkeleton {
        let params = TerrainParams {
            radius_m: 1000.0,
            min_height_m: 0.0,
            max_height_m: 0.0,
            scale: UnitScale::new(4),
        };
        TerrainSkeleton::new(params, Box::new(SphereSurface { radius_m: 1000.0 })).unwrap()
    }

    fn selector(terrain: &TerrainSkeleton) -> LodSelector {
        LodSelector::new(LodThresholds::from_meters(
            &[300.0, 150.0],
            &[400.0, 200.0],
            terrain.scale(),
        )
        .unwrap())
    }

    #[test]
    fn test_from_meters_scales() {
        let thresholds = LodThresholds::from_meters(&[1.0], &[2.5], UnitScale::new(4)).unwrap();
        assert_eq!(thresholds.subdivide_distance(0), Some(16));
        assert_eq!(thresholds.unsubdivide_distance(0), Some(40));
        assert_eq!(thresholds.subdivide_distance(1), None);
        assert_eq!(thresholds.levels(), 1);
    }

    #[test]
    fn test_from_meters_rejects_unusable_distances() {
        let scale = UnitScale::new(40);
        // 2e7 m is past u64 at 2^40 units per meter
        let err = LodThresholds::from_meters(&[1.0e7], &[2.0e7], scale).unwrap_err();
        assert!(matches!(err, TerrainError::Thresholds(_)));
        assert!(LodThresholds::from_meters(&[1.0e6], &[2.0e6], scale).is_ok());

        let err = LodThresholds::from_meters(&[10.0, 5.0], &[20.0], scale).unwrap_err();
        assert!(err.to_string().contains("2 subdivide but 1 unsubdivide"));

        let err = LodThresholds::from_meters(&[10.0], &[10.0], scale).unwrap_err();
        assert!(err.to_string().contains("level 0"));
        assert!(LodThresholds::from_meters(&[f64::NAN], &[1.0], scale).is_err());
    }

    #[test]
    #[should_panic(expected = "must exceed")]
    fn test_missing_hysteresis_panics() {
        LodThresholds::new(vec![10], vec![10]);
    }

    #[test]
    fn test_viewer_above_triangle_selects_it() {
        let terrain = terrain();
        let mut selector = selector(&terrain);
        let tri = SkTriId(0);
        let viewer = terrain.center(tri);

        let selected = selector.select_for_subdivision(&terrain, 0, viewer);
        assert!(selected.contains(&tri));
        assert!(selected.len() < 20);
        assert_eq!(selector.distance_checks(), 20);
    }

    #[test]
    fn test_far_viewer_selects_nothing() {
        let terrain = terrain();
        let mut selector = selector(&terrain);
        let viewer = terrain.scale().vec_to_units(glam::DVec3::new(0.0, 0.0, 1.0e6));
        assert!(selector.select_for_subdivision(&terrain, 0, viewer).is_empty());
        // No thresholds past the configured levels
        assert!(selector.select_for_subdivision(&terrain, 2, viewer).is_empty());
    }

    #[test]
    fn test_unsubdivision_uses_larger_threshold() {
        let mut terrain = terrain();
        let tri = SkTriId(0);
        terrain.subdivide(tri).unwrap();
        let mut selector = selector(&terrain);
        let center = terrain.scale().vec_to_meters(terrain.center(tri));
        let outward = center.normalize();

        // Between the two thresholds: neither subdivide nor unsubdivide
        let between = terrain.scale().vec_to_units(center + outward * 350.0);
        assert!(selector.select_for_unsubdivision(&terrain, 0, between).is_empty());
        assert!(!selector.select_for_subdivision(&terrain, 0, between).contains(&tri));

        let far = terrain.scale().vec_to_units(center + outward * 450.0);
        assert_eq!(selector.select_for_unsubdivision(&terrain, 0, far), vec![tri]);
    }

    #[test]
    fn test_unsubdivision_skips_deeper_subdivided_children() {
        let mut terrain = terrain();
        let tri = SkTriId(0);
        let group = terrain.subdivide(tri).unwrap().group;
        terrain.subdivide(group.child(3)).unwrap();
        let mut selector = selector(&terrain);
        let far = terrain.scale().vec_to_units(glam::DVec3::new(0.0, 0.0, 1.0e6));
        assert!(selector.select_for_unsubdivision(&terrain, 0, far).is_empty());
        assert_eq!(selector.select_for_unsubdivision(&terrain, 1, far), vec![group.child(3)]);
    }
}
