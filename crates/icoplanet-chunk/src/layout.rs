//! Vertex and triangle layout of a triangular chunk grid.
//!
//! A chunk of width `W` has `n = W - 1` segments per side. Grid points are
//! `(x, y)` with `0 <= x <= y <= n`; the corners are
//! `v0 = (0, 0)`, `v1 = (0, n)` and `v2 = (n, n)`:
//!
//! ```text
//!         v0
//!        /  \
//!   side 0   side 2
//!      /      \
//!    v1--------v2
//!       side 1
//! ```
//!
//! The `3n` boundary points form a ring indexed counter-clockwise from `v0`:
//! side `s` at position `p` (running from corner `s` toward corner `s + 1`)
//! is ring index `s * n + p`.

use std::collections::VecDeque;

/// A point of the chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
}

impl GridPos {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    fn midpoint(self, other: GridPos) -> GridPos {
        GridPos::new((self.x + other.x) / 2, (self.y + other.y) / 2)
    }
}

/// Where a grid point's vertex lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridVertex {
    /// Boundary ring index, `0..3n`.
    Ring(u32),
    /// Private interior index, `0..interior_count`.
    Interior(u32),
}

/// One step of the grid fill: `target` is the midpoint of `a` and `b`, both
/// computed by earlier steps or corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillStep {
    pub target: GridPos,
    pub a: GridPos,
    pub b: GridPos,
}

/// Precomputed layout for one chunk width.
#[derive(Debug, Clone)]
pub struct ChunkLayout {
    width: u32,
    segments: u32,
    triangles: Vec<[GridVertex; 3]>,
    fill_steps: Vec<FillStep>,
}

impl ChunkLayout {
    /// # Panics
    ///
    /// Panics unless `width` is `2^k + 1` with `k >= 1`.
    pub fn new(width: u32) -> Self {
        let segments = width.wrapping_sub(1);
        assert!(
            width >= 3 && segments.is_power_of_two(),
            "chunk width must be 2^k + 1 and at least 3, got {width}"
        );
        let mut layout = Self {
            width,
            segments,
            triangles: Vec::with_capacity((segments * segments) as usize),
            fill_steps: Vec::new(),
        };
        layout.triangles = layout.build_triangles();
        layout.fill_steps = layout.build_fill_steps();
        layout
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Segments per side, `W - 1`.
    pub fn segments(&self) -> u32 {
        self.segments
    }

    /// Boundary vertices per chunk, `3 (W - 1)`.
    pub fn ring_len(&self) -> u32 {
        3 * self.segments
    }

    /// Private vertices per chunk, `(W - 2)(W - 3) / 2`.
    pub fn interior_count(&self) -> u32 {
        (self.segments - 1) * (self.segments - 2) / 2
    }

    /// Triangles per chunk, `(W - 1)^2`.
    pub fn triangle_count(&self) -> u32 {
        self.segments * self.segments
    }

    /// Indices per chunk.
    pub fn index_count(&self) -> u32 {
        3 * self.triangle_count()
    }

    /// All grid points, ring and interior.
    pub fn grid_point_count(&self) -> usize {
        (self.width * (self.width + 1) / 2) as usize
    }

    /// Dense index of a grid point, row by row.
    #[inline]
    pub fn grid_index(&self, pos: GridPos) -> usize {
        (pos.y * (pos.y + 1) / 2 + pos.x) as usize
    }

    pub fn corner(&self, corner: u8) -> GridPos {
        match corner {
            0 => GridPos::new(0, 0),
            1 => GridPos::new(0, self.segments),
            _ => GridPos::new(self.segments, self.segments),
        }
    }

    pub fn vertex_at(&self, pos: GridPos) -> GridVertex {
        let n = self.segments;
        if pos.y == n {
            GridVertex::Ring(n + pos.x)
        } else if pos.x == 0 {
            GridVertex::Ring(pos.y)
        } else if pos.x == pos.y {
            GridVertex::Ring(3 * n - pos.x)
        } else {
            GridVertex::Interior((pos.y - 2) * (pos.y - 1) / 2 + pos.x - 1)
        }
    }

    /// Ring index of position `pos` (`0..=n`) along `side`.
    #[inline]
    pub fn ring_index(&self, side: u8, pos: u32) -> u32 {
        (u32::from(side) * self.segments + pos) % self.ring_len()
    }

    /// Grid point of a ring index.
    pub fn ring_grid_pos(&self, ring: u32) -> GridPos {
        let n = self.segments;
        let (side, pos) = (ring / n, ring % n);
        match side {
            0 => GridPos::new(0, pos),
            1 => GridPos::new(pos, n),
            _ => GridPos::new(n - pos, n - pos),
        }
    }

    /// Triangles of the chunk, wound like the skeleton triangle.
    pub fn triangles(&self) -> &[[GridVertex; 3]] {
        &self.triangles
    }

    /// Breadth-first midpoint order covering every non-corner grid point once.
    pub fn fill_steps(&self) -> &[FillStep] {
        &self.fill_steps
    }

    fn build_triangles(&self) -> Vec<[GridVertex; 3]> {
        let mut triangles = Vec::with_capacity(self.triangle_count() as usize);
        for y in 0..self.segments {
            for x in 0..=y {
                triangles.push([
                    self.vertex_at(GridPos::new(x, y)),
                    self.vertex_at(GridPos::new(x, y + 1)),
                    self.vertex_at(GridPos::new(x + 1, y + 1)),
                ]);
                if x < y {
                    triangles.push([
                        self.vertex_at(GridPos::new(x, y)),
                        self.vertex_at(GridPos::new(x + 1, y + 1)),
                        self.vertex_at(GridPos::new(x + 1, y)),
                    ]);
                }
            }
        }
        triangles
    }

    fn build_fill_steps(&self) -> Vec<FillStep> {
        let mut visited = vec![false; self.grid_point_count()];
        let corners = [self.corner(0), self.corner(1), self.corner(2)];
        for corner in corners {
            visited[self.grid_index(corner)] = true;
        }

        let mut steps = Vec::with_capacity(self.grid_point_count() - 3);
        let mut queue = VecDeque::from([(corners, self.segments)]);
        while let Some(([top, left, right], size)) = queue.pop_front() {
            if size < 2 {
                continue;
            }
            let edges = [(top, left), (left, right), (right, top)];
            let mids = edges.map(|(a, b)| a.midpoint(b));
            for ((a, b), target) in edges.into_iter().zip(mids) {
                let index = self.grid_index(target);
                if !visited[index] {
                    visited[index] = true;
                    steps.push(FillStep { target, a, b });
                }
            }
            let [m_tl, m_lr, m_rt] = mids;
            let half = size / 2;
            queue.push_back(([top, m_tl, m_rt], half));
            queue.push_back(([m_tl, left, m_lr], half));
            queue.push_back(([m_rt, m_lr, right], half));
            queue.push_back(([m_lr, m_rt, m_tl], half));
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_counts() {
        let layout = ChunkLayout::new(17);
        assert_eq!(layout.segments(), 16);
        assert_eq!(layout.ring_len(), 48);
        assert_eq!(layout.interior_count(), 105);
        assert_eq!(layout.triangle_count(), 256);
        assert_eq!(layout.triangles().len(), 256);
        assert_eq!(layout.grid_point_count(), 153);
        assert_eq!(
            layout.grid_point_count() as u32,
            layout.ring_len() + layout.interior_count()
        );
    }

    #[test]
    fn test_smallest_chunk_has_no_interior() {
        let layout = ChunkLayout::new(3);
        assert_eq!(layout.interior_count(), 0);
        assert_eq!(layout.ring_len(), 6);
        assert_eq!(layout.triangles().len(), 4);
        assert_eq!(layout.fill_steps().len(), 3);
    }

    #[test]
    #[should_panic(expected = "2^k + 1")]
    fn test_rejects_bad_width() {
        ChunkLayout::new(6);
    }

    #[test]
    fn test_every_grid_point_has_unique_vertex() {
        let layout = ChunkLayout::new(9);
        let n = layout.segments();
        let mut seen = HashSet::new();
        for y in 0..=n {
            for x in 0..=y {
                let vertex = layout.vertex_at(GridPos::new(x, y));
                match vertex {
                    GridVertex::Ring(r) => assert!(r < layout.ring_len()),
                    GridVertex::Interior(i) => assert!(i < layout.interior_count()),
                }
                assert!(seen.insert(vertex), "duplicate {vertex:?}");
            }
        }
        assert_eq!(seen.len(), layout.grid_point_count());
    }

    #[test]
    fn test_ring_walks_corners_in_order() {
        let layout = ChunkLayout::new(5);
        let n = layout.segments();
        assert_eq!(layout.ring_grid_pos(0), layout.corner(0));
        assert_eq!(layout.ring_grid_pos(n), layout.corner(1));
        assert_eq!(layout.ring_grid_pos(2 * n), layout.corner(2));
        for ring in 0..layout.ring_len() {
            assert_eq!(layout.vertex_at(layout.ring_grid_pos(ring)), GridVertex::Ring(ring));
        }
        // Position n of a side is position 0 of the next
        assert_eq!(layout.ring_index(2, n), 0);
        assert_eq!(layout.ring_index(1, 2), n + 2);
    }

    #[test]
    fn test_fill_steps_cover_grid_parents_first() {
        let layout = ChunkLayout::new(17);
        let mut done: HashSet<GridPos> = (0..3).map(|c| layout.corner(c)).collect();
        for step in layout.fill_steps() {
            assert!(done.contains(&step.a) && done.contains(&step.b));
            assert_eq!(step.a.midpoint(step.b), step.target);
            assert!(done.insert(step.target));
        }
        assert_eq!(done.len(), layout.grid_point_count());
    }

    #[test]
    fn test_ring_steps_stay_on_their_side() {
        let layout = ChunkLayout::new(9);
        for step in layout.fill_steps() {
            if let GridVertex::Ring(_) = layout.vertex_at(step.target) {
                assert!(matches!(layout.vertex_at(step.a), GridVertex::Ring(_)));
                assert!(matches!(layout.vertex_at(step.b), GridVertex::Ring(_)));
            }
        }
    }

    #[test]
    fn test_triangles_share_winding() {
        let layout = ChunkLayout::new(9);
        let n = layout.segments() as i64;
        let planar = |vertex: GridVertex| -> (i64, i64) {
            for y in 0..=n {
                for x in 0..=y {
                    if layout.vertex_at(GridPos::new(x as u32, y as u32)) == vertex {
                        return (x, y);
                    }
                }
            }
            unreachable!()
        };
        for tri in layout.triangles() {
            let [a, b, c] = tri.map(planar);
            let cross = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
            // Same sign as the whole triangle v0, v1, v2: -n^2
            assert!(cross < 0, "{tri:?}");
        }
    }
}
