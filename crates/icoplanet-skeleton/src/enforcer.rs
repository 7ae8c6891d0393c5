//! Commits LOD selection to the skeleton while keeping neighboring depths
//! within one level of each other.
//!
//! Two adjacency rules hold after every [`SubdivEnforcer::update`]:
//!
//! - A leaf has at most one subdivided neighbor.
//! - A subdivided triangle next to a leaf keeps the two children along that
//!   edge as leaves.
//!
//! Unsubdivisions run first, deepest level first, and are cancelled when they
//! would break either rule. Subdivisions then run shallowest level first and
//! cascade: coarser leaves across a triangle's edges are split beforehand,
//! and same-depth leaves left with two subdivided neighbors are split after.

use icoplanet_math::Vec3I128;
use tracing::{debug, trace};

use crate::bitset::BitSet;
use crate::error::TerrainError;
use crate::ids::{MaybeNewId, SkTriGroupId, SkTriId, SkVrtxId};
use crate::lod::LodSelector;
use crate::skeleton::SubdivTriangleSkeleton;
use crate::terrain::TerrainSkeleton;

/// A triangle was split. Fired after its children exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdivideEvent {
    pub tri: SkTriId,
    pub group: SkTriGroupId,
    pub corners: [SkVrtxId; 3],
    pub midpoints: [MaybeNewId<SkVrtxId>; 3],
}

/// A triangle's children are about to be destroyed. Fired while they still exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubdivideEvent {
    pub tri: SkTriId,
    pub children: [SkTriId; 4],
    /// Vertices that will no longer exist once the children are gone.
    pub removed_vertices: Vec<SkVrtxId>,
}

/// Receives structural edits synchronously during a commit.
pub trait SkeletonListener {
    fn on_subdivide(&mut self, terrain: &TerrainSkeleton, event: &SubdivideEvent) {
        let _ = (terrain, event);
    }

    fn on_unsubdivide(&mut self, terrain: &TerrainSkeleton, event: &UnsubdivideEvent) {
        let _ = (terrain, event);
    }
}

impl SkeletonListener for () {}

/// Outcome of one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub subdivided: usize,
    pub unsubdivided: usize,
    /// Unsubdivision candidates cancelled to keep the adjacency rules.
    pub cancelled: usize,
    /// Subdivisions refused at the maximum depth.
    pub refused: usize,
    /// Leaves that appeared, excluding ones created and destroyed in the same commit.
    pub surface_added: Vec<SkTriId>,
    /// Leaves that disappeared, excluding ones created and destroyed in the same commit.
    pub surface_removed: Vec<SkTriId>,
    pub distance_checks: u64,
}

/// Drives subdivision from a viewer position.
#[derive(Debug, Clone)]
pub struct SubdivEnforcer {
    selector: LodSelector,
    max_depth: u8,
    added: BitSet,
    removed: BitSet,
    report: CommitReport,
}

impl SubdivEnforcer {
    /// # Panics
    ///
    /// Panics if the selector has fewer threshold levels than `max_depth`.
    pub fn new(selector: LodSelector, max_depth: u8) -> Self {
        assert!(
            selector.thresholds().levels() >= usize::from(max_depth),
            "need thresholds for {max_depth} levels"
        );
        Self {
            selector,
            max_depth,
            added: BitSet::new(),
            removed: BitSet::new(),
            report: CommitReport::default(),
        }
    }

    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    pub fn selector(&self) -> &LodSelector {
        &self.selector
    }

    /// Select, resolve and commit one tick of subdivision changes.
    pub fn update(
        &mut self,
        terrain: &mut TerrainSkeleton,
        viewer: Vec3I128,
        listener: &mut dyn SkeletonListener,
    ) -> Result<CommitReport, TerrainError> {
        self.selector.reset_distance_checks();

        for level in (0..self.max_depth).rev() {
            let candidates = self.selector.select_for_unsubdivision(terrain, level, viewer);
            if candidates.is_empty() {
                continue;
            }
            let accepted = self.resolve_unsubdivisions(terrain.skeleton(), &candidates);
            for tri in accepted {
                self.commit_unsubdivide(terrain, tri, listener);
            }
        }

        for level in 0..self.max_depth {
            let candidates = self.selector.select_for_subdivision(terrain, level, viewer);
            for tri in candidates {
                self.subdivide(terrain, tri, listener)?;
            }
        }

        let report = self.take_report();
        debug!(
            subdivided = report.subdivided,
            unsubdivided = report.unsubdivided,
            cancelled = report.cancelled,
            refused = report.refused,
            added = report.surface_added.len(),
            removed = report.surface_removed.len(),
            "skeleton commit"
        );
        Ok(report)
    }

    /// Subdivide `tri` along with whatever the adjacency rules require.
    ///
    /// Returns whether `tri` is subdivided afterwards; `false` means it sits
    /// at the maximum depth and was refused.
    pub fn subdivide(
        &mut self,
        terrain: &mut TerrainSkeleton,
        tri: SkTriId,
        listener: &mut dyn SkeletonListener,
    ) -> Result<bool, TerrainError> {
        if !terrain.skeleton().is_leaf(tri) {
            return Ok(true);
        }
        if terrain.skeleton().depth(tri) >= self.max_depth {
            trace!(%tri, "subdivision refused at max depth");
            self.report.refused += 1;
            return Ok(false);
        }

        for side in 0..3 {
            self.ensure_neighbor(terrain, tri, side, listener)?;
        }

        let result = terrain.subdivide(tri)?;
        let event = SubdivideEvent {
            tri,
            group: result.group,
            corners: result.corners,
            midpoints: result.midpoints,
        };
        listener.on_subdivide(terrain, &event);
        self.report.subdivided += 1;
        self.mark_removed(tri);
        for c in 0..4 {
            self.mark_added(result.group.child(c));
        }

        // Only leaves already flagged as bordering a subdivided triangle can
        // now border two of them
        let depth = terrain.skeleton().depth(tri);
        let neighbors = terrain.skeleton().tri(tri).neighbors;
        for neighbor in neighbors.into_iter().flatten() {
            let flagged = terrain
                .level(depth)
                .is_some_and(|level| level.has_subdived_neighbor.contains(neighbor.index()));
            if flagged && subdivided_neighbor_count(terrain.skeleton(), neighbor) > 1 {
                self.subdivide(terrain, neighbor, listener)?;
            }
        }
        Ok(true)
    }

    /// Leaves accumulated since the last report, then resets it.
    pub fn take_report(&mut self) -> CommitReport {
        let mut report = std::mem::take(&mut self.report);
        report.surface_added = self.added.iter().map(|i| SkTriId(i as u32)).collect();
        report.surface_removed = self.removed.iter().map(|i| SkTriId(i as u32)).collect();
        report.distance_checks = self.selector.distance_checks();
        self.added.clear();
        self.removed.clear();
        report
    }

    /// Make sure `tri` has a same-depth neighbor across `side` by splitting
    /// the coarser leaf there.
    fn ensure_neighbor(
        &mut self,
        terrain: &mut TerrainSkeleton,
        tri: SkTriId,
        side: usize,
        listener: &mut dyn SkeletonListener,
    ) -> Result<(), TerrainError> {
        let skeleton = terrain.skeleton();
        if skeleton.tri(tri).neighbors[side].is_some() {
            return Ok(());
        }
        // Roots are always linked; a missing link runs along the parent's same side
        let Some(parent) = skeleton.parent(tri) else {
            return Ok(());
        };
        self.ensure_neighbor(terrain, parent, side, listener)?;
        if let Some(coarse) = terrain.skeleton().tri(parent).neighbors[side]
            && terrain.skeleton().is_leaf(coarse)
        {
            self.subdivide(terrain, coarse, listener)?;
        }
        Ok(())
    }

    /// Drop candidates whose unsubdivision would break the adjacency rules,
    /// assuming every other surviving candidate goes ahead.
    fn resolve_unsubdivisions(
        &mut self,
        skeleton: &SubdivTriangleSkeleton,
        candidates: &[SkTriId],
    ) -> Vec<SkTriId> {
        let mut pending: BitSet = candidates.iter().map(|t| t.index()).collect();
        loop {
            let mut changed = false;
            for &tri in candidates {
                if pending.contains(tri.index()) && would_break_rules(skeleton, tri, &pending) {
                    pending.remove(tri.index());
                    self.report.cancelled += 1;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        candidates
            .iter()
            .copied()
            .filter(|t| pending.contains(t.index()))
            .collect()
    }

    fn commit_unsubdivide(
        &mut self,
        terrain: &mut TerrainSkeleton,
        tri: SkTriId,
        listener: &mut dyn SkeletonListener,
    ) {
        let skeleton = terrain.skeleton();
        let Some(group) = skeleton.children(tri) else {
            return;
        };
        let event = UnsubdivideEvent {
            tri,
            children: [0, 1, 2, 3].map(|c| group.child(c)),
            removed_vertices: skeleton.releases_on_unsubdivide(tri),
        };
        listener.on_unsubdivide(terrain, &event);
        terrain.unsubdivide(tri);

        self.report.unsubdivided += 1;
        for child in event.children {
            self.mark_removed(child);
        }
        self.mark_added(tri);
    }

    fn mark_added(&mut self, tri: SkTriId) {
        self.added.insert(tri.index());
    }

    /// Leaves added earlier in the same commit are intermediates and vanish
    /// from both lists.
    fn mark_removed(&mut self, tri: SkTriId) {
        if !self.added.remove(tri.index()) {
            self.removed.insert(tri.index());
        }
    }
}

fn subdivided_neighbor_count(skeleton: &SubdivTriangleSkeleton, tri: SkTriId) -> usize {
    skeleton
        .tri(tri)
        .neighbors
        .into_iter()
        .flatten()
        .filter(|&n| !skeleton.is_leaf(n))
        .count()
}

/// Whether making `tri` a leaf breaks an adjacency rule, treating triangles
/// in `pending` as already unsubdivided.
fn would_break_rules(skeleton: &SubdivTriangleSkeleton, tri: SkTriId, pending: &BitSet) -> bool {
    let mut subdivided = 0;
    for neighbor in skeleton.tri(tri).neighbors.into_iter().flatten() {
        let Some(group) = skeleton.children(neighbor) else {
            continue;
        };
        if pending.contains(neighbor.index()) {
            continue;
        }
        subdivided += 1;
        if subdivided > 1 {
            return true;
        }
        let ns = skeleton.neighbor_side(neighbor, tri);
        if !skeleton.is_leaf(group.child(ns)) || !skeleton.is_leaf(group.child((ns + 1) % 3)) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::check_invariants;
    use crate::lod::LodThresholds;
    use crate::terrain::{SphereSurface, TerrainParams};
    use glam::DVec3;
    use icoplanet_math::UnitScale;

    const RADIUS: f64 = 1000.0;

    fn terrain() -> TerrainSkeleton {
        let params = TerrainParams {
            radius_m: RADIUS,
            min_height_m: 0.0,
            max_height_m: 0.0,
            scale: UnitScale::new(8),
        };
        TerrainSkeleton::new(params, Box::new(SphereSurface { radius_m: RADIUS })).unwrap()
    }

    fn enforcer(terrain: &TerrainSkeleton, max_depth: u8) -> SubdivEnforcer {
        let subdiv: Vec<f64> = (0..max_depth).map(|l| 1.5 * RADIUS / f64::from(1u32 << l)).collect();
        let unsubdiv: Vec<f64> = subdiv.iter().map(|d| d * 1.3).collect();
        let thresholds = LodThresholds::from_meters(&subdiv, &unsubdiv, terrain.scale()).unwrap();
        SubdivEnforcer::new(LodSelector::new(thresholds), max_depth)
    }

    fn viewer_at(terrain: &TerrainSkeleton, direction: DVec3, altitude: f64) -> Vec3I128 {
        terrain
            .scale()
            .vec_to_units(direction.normalize() * (RADIUS + altitude))
    }

    fn leaf_count(terrain: &TerrainSkeleton) -> usize {
        let skeleton = terrain.skeleton();
        skeleton.triangle_ids().filter(|&t| skeleton.is_leaf(t)).count()
    }

    #[derive(Default)]
    struct Recorder {
        subdivided: Vec<SkTriId>,
        unsubdivided: Vec<SkTriId>,
        children_alive_on_unsubdivide: bool,
    }

    impl SkeletonListener for Recorder {
        fn on_subdivide(&mut self, terrain: &TerrainSkeleton, event: &SubdivideEvent) {
            assert_eq!(terrain.skeleton().children(event.tri), Some(event.group));
            self.subdivided.push(event.tri);
        }

        fn on_unsubdivide(&mut self, terrain: &TerrainSkeleton, event: &UnsubdivideEvent) {
            self.children_alive_on_unsubdivide = event
                .children
                .iter()
                .all(|&c| terrain.skeleton().exists(c));
            self.unsubdivided.push(event.tri);
        }
    }

    #[test]
    fn test_close_viewer_subdivides_and_keeps_rules() {
        let mut terrain = terrain();
        let mut enforcer = enforcer(&terrain, 5);
        let viewer = viewer_at(&terrain, DVec3::new(0.3, 0.9, 0.1), 2.0);

        let report = enforcer.update(&mut terrain, viewer, &mut ()).unwrap();
        assert!(report.subdivided > 0);
        assert!(terrain.skeleton().triangles_at_depth(5).count() > 0);
        assert_eq!(report.refused, 0);
        check_invariants(&terrain).unwrap();
    }

    #[test]
    fn test_far_viewer_returns_to_icosahedron() {
        let mut terrain = terrain();
        let mut enforcer = enforcer(&terrain, 4);
        let near = viewer_at(&terrain, DVec3::X, 1.0);
        enforcer.update(&mut terrain, near, &mut ()).unwrap();
        assert!(terrain.skeleton().group_count() > 5);

        let far = viewer_at(&terrain, DVec3::X, 100.0 * RADIUS);
        for _ in 0..4 {
            enforcer.update(&mut terrain, far, &mut ()).unwrap();
            check_invariants(&terrain).unwrap();
        }
        assert_eq!(terrain.skeleton().group_count(), 5);
        assert_eq!(terrain.skeleton().vertex_count(), 12);
    }

    #[test]
    fn test_subdividing_next_to_coarse_leaf_splits_it_first() {
        let mut terrain = terrain();
        let mut enforcer = enforcer(&terrain, 3);
        let root = SkTriId(0);
        let across = terrain.skeleton().tri(root).neighbors[0].unwrap();

        enforcer.subdivide(&mut terrain, root, &mut ()).unwrap();
        let group = terrain.skeleton().children(root).unwrap();
        // Child 0 lies on side 0, next to the untouched root
        enforcer.subdivide(&mut terrain, group.child(0), &mut ()).unwrap();

        assert!(!terrain.skeleton().is_leaf(across));
        assert!(terrain.skeleton().tri(group.child(0)).neighbors.iter().all(Option::is_some));
        check_invariants(&terrain).unwrap();
    }

    #[test]
    fn test_leaf_between_two_subdivided_neighbors_is_split() {
        let mut terrain = terrain();
        let mut enforcer = enforcer(&terrain, 2);
        let middle = SkTriId(0);
        let [a, b, _] = terrain.skeleton().tri(middle).neighbors.map(Option::unwrap);

        enforcer.subdivide(&mut terrain, a, &mut ()).unwrap();
        assert!(terrain.skeleton().is_leaf(middle));
        let level = terrain.level(0).unwrap();
        assert!(level.has_subdived_neighbor.contains(middle.index()));

        enforcer.subdivide(&mut terrain, b, &mut ()).unwrap();
        assert!(!terrain.skeleton().is_leaf(middle));
        let level = terrain.level(0).unwrap();
        assert!(!level.has_subdived_neighbor.contains(middle.index()));
        // The third neighbor borders only `middle` and stays a leaf
        assert!(level.has_non_subdived_neighbor.contains(middle.index()));
        check_invariants(&terrain).unwrap();
    }

    #[test]
    fn test_max_depth_refuses() {
        let mut terrain = terrain();
        let mut enforcer = enforcer(&terrain, 1);
        let group = {
            enforcer.subdivide(&mut terrain, SkTriId(0), &mut ()).unwrap();
            terrain.skeleton().children(SkTriId(0)).unwrap()
        };
        let subdivided = enforcer.subdivide(&mut terrain, group.child(3), &mut ()).unwrap();
        assert!(!subdivided);
        assert!(terrain.skeleton().is_leaf(group.child(3)));
        assert_eq!(enforcer.take_report().refused, 1);
    }

    #[test]
    fn test_unsubdivide_cancelled_when_neighbor_children_subdivided() {
        let mut terrain = terrain();
        let mut enforcer = enforcer(&terrain, 3);
        let a = SkTriId(0);
        let b = terrain.skeleton().tri(a).neighbors[1].unwrap();
        enforcer.subdivide(&mut terrain, a, &mut ()).unwrap();
        enforcer.subdivide(&mut terrain, b, &mut ()).unwrap();
        // Split b's child touching a, so a must stay subdivided
        let ns = terrain.skeleton().neighbor_side(b, a);
        let b_group = terrain.skeleton().children(b).unwrap();
        enforcer.subdivide(&mut terrain, b_group.child(ns), &mut ()).unwrap();
        enforcer.take_report();

        let accepted = enforcer.resolve_unsubdivisions(terrain.skeleton(), &[a]);
        assert!(accepted.is_empty());
        assert_eq!(enforcer.take_report().cancelled, 1);
    }

    #[test]
    fn test_listener_sees_edits_in_order() {
        let mut terrain = terrain();
        let mut enforcer = enforcer(&terrain, 2);
        let mut recorder = Recorder::default();
        let near = viewer_at(&terrain, DVec3::Z, 1.0);
        enforcer.update(&mut terrain, near, &mut recorder).unwrap();
        assert!(!recorder.subdivided.is_empty());

        let far = viewer_at(&terrain, DVec3::Z, 100.0 * RADIUS);
        enforcer.update(&mut terrain, far, &mut recorder).unwrap();
        enforcer.update(&mut terrain, far, &mut recorder).unwrap();
        assert_eq!(recorder.unsubdivided.len(), recorder.subdivided.len());
        assert!(recorder.children_alive_on_unsubdivide);
    }

    #[test]
    fn test_surface_changes_match_leaves() {
        let mut terrain = terrain();
        let mut enforcer = enforcer(&terrain, 3);
        let viewer = viewer_at(&terrain, DVec3::new(-0.2, 0.4, 0.9), 5.0);
        let report = enforcer.update(&mut terrain, viewer, &mut ()).unwrap();

        let skeleton = terrain.skeleton();
        for &tri in &report.surface_added {
            assert!(skeleton.is_leaf(tri), "{tri} should be a leaf");
            assert!(skeleton.depth(tri) > 0);
        }
        for &tri in &report.surface_removed {
            assert_eq!(skeleton.depth(tri), 0);
            assert!(!skeleton.is_leaf(tri));
        }
        // Every leaf below the roots appeared in this commit
        let new_leaves = skeleton
            .triangle_ids()
            .filter(|&t| skeleton.is_leaf(t) && skeleton.depth(t) > 0)
            .count();
        assert_eq!(report.surface_added.len(), new_leaves);
        assert_eq!(
            leaf_count(&terrain),
            20 - report.surface_removed.len() + report.surface_added.len()
        );
    }

    #[test]
    fn test_random_walk_keeps_rules() {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;

        let mut terrain = terrain();
        let mut enforcer = enforcer(&terrain, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut direction = DVec3::new(0.3, -0.5, 0.8);
        for tick in 0..60 {
            let jitter = DVec3::new(
                rng.random_range(-0.3..0.3),
                rng.random_range(-0.3..0.3),
                rng.random_range(-0.3..0.3),
            );
            direction = (direction + jitter).normalize();
            let altitude = rng.random_range(0.0..2.0 * RADIUS);
            let viewer = viewer_at(&terrain, direction, altitude);
            enforcer.update(&mut terrain, viewer, &mut ()).unwrap();
            if let Err(err) = check_invariants(&terrain) {
                panic!("tick {tick}: {err}");
            }
        }
    }
}
