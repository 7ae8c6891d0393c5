//! Chunk lifecycle over skeleton leaves.
//!
//! Chunks are packed densely: chunk `k` owns index range
//! `[k * I, (k + 1) * I)` where `I` is the per-chunk index count, so removing
//! a chunk moves the last one into its place. Interior vertices live in a
//! separate slot that never moves while the chunk exists.

use std::collections::BTreeSet;

use glam::DVec3;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use icoplanet_skeleton::{SkTriId, SkVrtxId, SubdivTriangleSkeleton, TerrainSkeleton};

use crate::buffers::{DirtyRanges, MeshBuffers, TerrainVertex};
use crate::error::ChunkError;
use crate::layout::{ChunkLayout, GridPos, GridVertex};
use crate::shared::{SharedVertexPool, SharedVrtxId};
use crate::stitch::{NeighborVertex, find_neighbor_vertex};

/// Dense position of a chunk. Only valid until the next removal, which may
/// move the last chunk into a freed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub u32);

impl ChunkId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct ChunkRecord {
    tri: SkTriId,
    interior_slot: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RingSlot {
    Reuse(SharedVrtxId),
    Fresh { between: bool },
}

/// Usage snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    pub chunks: u32,
    pub max_chunks: u32,
    pub shared_vertices: u32,
    pub shared_available: u32,
    pub interior_slots_in_use: u32,
    pub indices: usize,
}

/// Owns the chunk meshes of one terrain: shared vertex pool, per-chunk
/// rings and the vertex and index buffers.
#[derive(Debug, Clone)]
pub struct ChunkMeshGenerator {
    layout: ChunkLayout,
    max_chunks: u32,
    pool: SharedVertexPool,
    buffers: MeshBuffers,
    chunks: Vec<ChunkRecord>,
    /// `ring_len` shared ids per chunk, in chunk order.
    rings: Vec<SharedVrtxId>,
    /// Face normal sum each chunk added to each of its ring vertices.
    contributions: Vec<DVec3>,
    chunk_of: Vec<Option<ChunkId>>,
    /// Number of chunks strictly below each triangle.
    descendants: Vec<u32>,
    interior_free: BTreeSet<u32>,
    interior_high_water: u32,
    /// Skeleton vertices with a shared vertex at their position.
    corner_to_shared: FxHashMap<SkVrtxId, SharedVrtxId>,
    shared_to_corner: Vec<Option<SkVrtxId>>,
}

impl ChunkMeshGenerator {
    /// # Panics
    ///
    /// Panics if `width` is not `2^k + 1`, `max_chunks` is zero or the pool
    /// has fewer than 2 slots.
    pub fn new(width: u32, max_chunks: u32, max_shared_vertices: u32) -> Self {
        assert!(max_chunks > 0, "max_chunks must be at least 1");
        let layout = ChunkLayout::new(width);
        let vertex_capacity =
            max_shared_vertices as usize + max_chunks as usize * layout.interior_count() as usize;
        let index_capacity = max_chunks as usize * layout.index_count() as usize;
        Self {
            max_chunks,
            pool: SharedVertexPool::new(max_shared_vertices),
            buffers: MeshBuffers::new(vertex_capacity, index_capacity),
            chunks: Vec::with_capacity(max_chunks as usize),
            rings: Vec::with_capacity(max_chunks as usize * layout.ring_len() as usize),
            contributions: Vec::with_capacity(max_chunks as usize * layout.ring_len() as usize),
            chunk_of: Vec::new(),
            descendants: Vec::new(),
            interior_free: BTreeSet::new(),
            interior_high_water: 0,
            corner_to_shared: FxHashMap::default(),
            shared_to_corner: vec![None; max_shared_vertices as usize],
            layout,
        }
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn pool(&self) -> &SharedVertexPool {
        &self.pool
    }

    pub fn buffers(&self) -> &MeshBuffers {
        &self.buffers
    }

    /// Buffer ranges written since the last call.
    pub fn take_dirty(&mut self) -> DirtyRanges {
        self.buffers.take_dirty()
    }

    pub fn max_chunks(&self) -> u32 {
        self.max_chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_of(&self, tri: SkTriId) -> Option<ChunkId> {
        self.chunk_of.get(tri.index()).copied().flatten()
    }

    pub fn is_chunked(&self, tri: SkTriId) -> bool {
        self.chunk_of(tri).is_some()
    }

    /// Chunks below `tri`, not counting a chunk on `tri` itself.
    pub fn chunked_descendants(&self, tri: SkTriId) -> u32 {
        self.descendants.get(tri.index()).copied().unwrap_or(0)
    }

    /// Triangle a chunk is bound to.
    pub fn chunk_triangle(&self, chunk: ChunkId) -> SkTriId {
        self.chunks[chunk.index()].tri
    }

    /// Triangles with a chunk, in chunk order.
    pub fn chunked_triangles(&self) -> impl Iterator<Item = SkTriId> + '_ {
        self.chunks.iter().map(|record| record.tri)
    }

    /// Boundary ring of a chunk, counter-clockwise from its corner 0.
    pub fn ring(&self, chunk: ChunkId) -> &[SharedVrtxId] {
        let len = self.layout.ring_len() as usize;
        &self.rings[chunk.index() * len..(chunk.index() + 1) * len]
    }

    /// Shared vertex placed at a skeleton vertex, if any chunk has one there.
    pub fn corner_vertex(&self, vertex: SkVrtxId) -> Option<SharedVrtxId> {
        self.corner_to_shared.get(&vertex).copied()
    }

    pub fn stats(&self) -> ChunkStats {
        ChunkStats {
            chunks: self.chunks.len() as u32,
            max_chunks: self.max_chunks,
            shared_vertices: self.pool.live(),
            shared_available: self.pool.available(),
            interior_slots_in_use: self.interior_high_water - self.interior_free.len() as u32,
            indices: self.buffers.indices().len(),
        }
    }

    /// Vertex buffer index of the first interior vertex of a slot.
    fn interior_base(&self, slot: u32) -> u32 {
        self.pool.capacity() + slot * self.layout.interior_count()
    }

    fn buffer_index(&self, vertex: GridVertex, ring: &[SharedVrtxId], slot: u32) -> u32 {
        match vertex {
            GridVertex::Ring(r) => ring[r as usize].0,
            GridVertex::Interior(i) => self.interior_base(slot) + i,
        }
    }

    /// Build a chunk on the leaf `tri`, reusing boundary vertices of
    /// neighboring chunks. Returns the existing chunk if there is one.
    ///
    /// Finer chunks along its edges have their ring vertices between two of
    /// its vertices moved onto its straight edge, so no T-junction opens.
    ///
    /// On error nothing changes.
    ///
    /// # Panics
    ///
    /// Panics if `tri` is subdivided.
    pub fn chunk_add(&mut self, terrain: &TerrainSkeleton, tri: SkTriId) -> Result<ChunkId, ChunkError> {
        if let Some(chunk) = self.chunk_of(tri) {
            return Ok(chunk);
        }
        let skeleton = terrain.skeleton();
        assert!(skeleton.is_leaf(tri), "{tri} is subdivided and cannot be chunked");

        if self.chunks.len() as u32 >= self.max_chunks {
            return Err(ChunkError::ChunkCapacity {
                max: self.max_chunks,
            });
        }
        let ring_len = self.layout.ring_len();
        if !self.pool.can_allocate(ring_len) {
            return Err(ChunkError::SharedCapacity {
                needed: ring_len,
                available: self.pool.available(),
            });
        }

        let slots = self.resolve_ring(skeleton, tri);
        let grid = self.fill_grid(terrain, tri, &slots)?;
        let finer = self.finer_edge_grids(terrain, tri)?;

        // Nothing below can fail
        let mut ring = Vec::with_capacity(ring_len as usize);
        for (r, slot) in slots.iter().enumerate() {
            let id = match *slot {
                RingSlot::Reuse(id) => {
                    self.pool.acquire(id);
                    id
                }
                RingSlot::Fresh { .. } => {
                    let pos = self.layout.ring_grid_pos(r as u32);
                    self.pool.create(grid[self.layout.grid_index(pos)])?
                }
            };
            ring.push(id);
        }

        for (r, vertex) in self.ring_skeleton_vertices(skeleton, tri) {
            self.link_vertex(vertex, ring[r as usize]);
        }

        let interior_slot = match self.interior_free.pop_first() {
            Some(slot) => slot,
            None => {
                self.interior_high_water += 1;
                self.interior_high_water - 1
            }
        };
        let chunk = ChunkId(self.chunks.len() as u32);
        self.chunks.push(ChunkRecord { tri, interior_slot });
        self.rings.extend_from_slice(&ring);

        let bound = skeleton.tri_id_bound();
        if self.chunk_of.len() < bound {
            self.chunk_of.resize(bound, None);
            self.descendants.resize(bound, 0);
        }
        self.chunk_of[tri.index()] = Some(chunk);

        self.write_chunk(chunk, &ring, interior_slot, &grid);

        let mut ancestor = skeleton.parent(tri);
        while let Some(parent) = ancestor {
            self.descendants[parent.index()] += 1;
            ancestor = skeleton.parent(parent);
        }

        for (fine, grid) in &finer {
            self.restitch(*fine, grid);
        }

        trace!(
            "chunked {tri} as chunk {} in interior slot {interior_slot}, restitched {} finer chunks",
            chunk.0,
            finer.len()
        );
        Ok(chunk)
    }

    /// Remove the chunk on `tri`. Returns `false` if there was none.
    pub fn chunk_remove(&mut self, terrain: &TerrainSkeleton, tri: SkTriId) -> bool {
        let Some(chunk) = self.chunk_of(tri) else {
            return false;
        };
        let ring_len = self.layout.ring_len() as usize;
        let index_count = self.layout.index_count() as usize;
        let base = chunk.index() * ring_len;

        for r in 0..ring_len {
            self.pool.sub_normal(self.rings[base + r], self.contributions[base + r]);
        }
        for r in 0..ring_len {
            let id = self.rings[base + r];
            if self.pool.release(id) {
                if let Some(vertex) = self.shared_to_corner[id.index()].take() {
                    self.corner_to_shared.remove(&vertex);
                }
            } else {
                self.refresh_shared_normal(id);
            }
        }

        let record = self.chunks[chunk.index()];
        self.interior_free.insert(record.interior_slot);
        while self.interior_high_water > 0 && self.interior_free.remove(&(self.interior_high_water - 1)) {
            self.interior_high_water -= 1;
        }

        let last = self.chunks.len() - 1;
        if chunk.index() != last {
            let moved = self.chunks[last];
            self.chunks[chunk.index()] = moved;
            self.rings.copy_within(last * ring_len..(last + 1) * ring_len, base);
            self.contributions
                .copy_within(last * ring_len..(last + 1) * ring_len, base);
            self.buffers
                .copy_indices(last * index_count, chunk.index() * index_count, index_count);
            self.chunk_of[moved.tri.index()] = Some(chunk);
        }
        self.chunks.pop();
        self.rings.truncate(last * ring_len);
        self.contributions.truncate(last * ring_len);
        self.buffers.truncate_indices(last * index_count);
        self.chunk_of[tri.index()] = None;

        let skeleton = terrain.skeleton();
        let mut ancestor = skeleton.parent(tri);
        while let Some(parent) = ancestor {
            self.descendants[parent.index()] -= 1;
            ancestor = skeleton.parent(parent);
        }

        trace!("unchunked {tri}, freed interior slot {}", record.interior_slot);
        true
    }

    /// Drop corner entries for skeleton vertices that no longer exist, so
    /// their ids can be reused for other positions.
    pub fn forget_skeleton_vertices(&mut self, vertices: &[SkVrtxId]) {
        for vertex in vertices {
            if let Some(id) = self.corner_to_shared.remove(vertex) {
                self.shared_to_corner[id.index()] = None;
            }
        }
    }

    /// Skeleton vertices on the ring of `tri`: its corners, and the midpoints
    /// of sides whose neighbor is subdivided.
    fn ring_skeleton_vertices(
        &self,
        skeleton: &SubdivTriangleSkeleton,
        tri: SkTriId,
    ) -> Vec<(u32, SkVrtxId)> {
        let n = self.layout.segments();
        let corners = skeleton.tri(tri).vertices;
        let mut vertices = Vec::with_capacity(6);
        for side in 0..3u32 {
            let (a, b) = (corners[side as usize], corners[(side as usize + 1) % 3]);
            vertices.push((side * n, a));
            if let Some(mid) = skeleton.midpoint(a, b) {
                vertices.push((side * n + n / 2, mid));
            }
        }
        vertices
    }

    fn link_vertex(&mut self, vertex: SkVrtxId, id: SharedVrtxId) {
        if self.shared_to_corner[id.index()].is_none() && !self.corner_to_shared.contains_key(&vertex) {
            self.corner_to_shared.insert(vertex, id);
            self.shared_to_corner[id.index()] = Some(vertex);
        }
    }

    /// Link the midpoints of a just subdivided `tri` to vertices that chunks
    /// across its edges already have at those positions.
    pub fn link_midpoints(&mut self, terrain: &TerrainSkeleton, tri: SkTriId) {
        let skeleton = terrain.skeleton();
        let corners = skeleton.tri(tri).vertices;
        let half = self.layout.segments() / 2;
        for side in 0..3u8 {
            let (a, b) = (corners[usize::from(side)], corners[usize::from(side + 1) % 3]);
            let Some(mid) = skeleton.midpoint(a, b) else {
                continue;
            };
            if self.corner_to_shared.contains_key(&mid) {
                continue;
            }
            if let NeighborVertex::Found(id) = find_neighbor_vertex(skeleton, self, tri, side, half) {
                self.link_vertex(mid, id);
            }
        }
    }

    fn resolve_ring(&self, skeleton: &SubdivTriangleSkeleton, tri: SkTriId) -> Vec<RingSlot> {
        let n = self.layout.segments();
        let mut slots: Vec<Option<RingSlot>> = vec![None; self.layout.ring_len() as usize];
        for (r, vertex) in self.ring_skeleton_vertices(skeleton, tri) {
            if let Some(id) = self.corner_vertex(vertex) {
                slots[r as usize] = Some(RingSlot::Reuse(id));
            }
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(ring, known)| {
                if let Some(slot) = known {
                    return slot;
                }
                let (side, pos) = ((ring as u32 / n) as u8, ring as u32 % n);
                // A corner is the end of the previous side too
                let lookups = if pos == 0 {
                    vec![(side, 0), ((side + 2) % 3, n)]
                } else {
                    vec![(side, pos)]
                };
                let mut between = false;
                for (side, pos) in lookups {
                    match find_neighbor_vertex(skeleton, self, tri, side, pos) {
                        NeighborVertex::Found(id) => return RingSlot::Reuse(id),
                        NeighborVertex::Between => between = true,
                        NeighborVertex::None => {}
                    }
                }
                RingSlot::Fresh { between }
            })
            .collect()
    }

    /// Positions of every grid point in meters, indexed by
    /// [`ChunkLayout::grid_index`].
    fn fill_grid(
        &self,
        terrain: &TerrainSkeleton,
        tri: SkTriId,
        slots: &[RingSlot],
    ) -> Result<Vec<DVec3>, ChunkError> {
        let layout = &self.layout;
        let mut grid = vec![DVec3::ZERO; layout.grid_point_count()];
        let corners = terrain.skeleton().tri(tri).vertices;
        for (corner, vertex) in corners.into_iter().enumerate() {
            let position = match slots[corner * layout.segments() as usize] {
                RingSlot::Reuse(id) => self.pool.position(id),
                RingSlot::Fresh { .. } => terrain.position_m(vertex),
            };
            grid[layout.grid_index(layout.corner(corner as u8))] = position;
        }

        for step in layout.fill_steps() {
            let a = grid[layout.grid_index(step.a)];
            let b = grid[layout.grid_index(step.b)];
            let slot = match layout.vertex_at(step.target) {
                GridVertex::Ring(r) => slots[r as usize],
                GridVertex::Interior(_) => RingSlot::Fresh { between: false },
            };
            grid[layout.grid_index(step.target)] = match slot {
                RingSlot::Reuse(id) => self.pool.position(id),
                RingSlot::Fresh { between: true } => (a + b) * 0.5,
                RingSlot::Fresh { between: false } => terrain.surface_point_m(a + b)?,
            };
        }
        Ok(grid)
    }

    /// Chunks one level finer across the edges of the leaf `tri`, with grids
    /// whose odd ring steps along that edge lie on `tri`'s straight edge.
    ///
    /// Only a leaf flagged as bordering a subdivided triangle has any; the
    /// adjacency rules keep the finer triangles along that edge leaves.
    fn finer_edge_grids(
        &self,
        terrain: &TerrainSkeleton,
        tri: SkTriId,
    ) -> Result<Vec<(ChunkId, Vec<DVec3>)>, ChunkError> {
        let skeleton = terrain.skeleton();
        let borders_finer = terrain
            .level(skeleton.depth(tri))
            .is_some_and(|level| level.has_subdived_neighbor.contains(tri.index()));
        if !borders_finer {
            return Ok(Vec::new());
        }

        let n = self.layout.segments();
        let mut grids = Vec::new();
        for neighbor in skeleton.tri(tri).neighbors.into_iter().flatten() {
            let Some(group) = skeleton.children(neighbor) else {
                continue;
            };
            let side = skeleton.neighbor_side(neighbor, tri);
            for child in [group.child(side), group.child((side + 1) % 3)] {
                let Some(chunk) = self.chunk_of(child) else {
                    continue;
                };
                let mut slots: Vec<RingSlot> =
                    self.ring(chunk).iter().map(|&id| RingSlot::Reuse(id)).collect();
                for pos in (1..n).step_by(2) {
                    slots[self.layout.ring_index(side, pos) as usize] =
                        RingSlot::Fresh { between: true };
                }
                grids.push((chunk, self.fill_grid(terrain, child, &slots)?));
            }
        }
        Ok(grids)
    }

    /// Move an existing chunk's ring onto `grid` and redo its normals.
    fn restitch(&mut self, chunk: ChunkId, grid: &[DVec3]) {
        let ring_len = self.layout.ring_len() as usize;
        let base = chunk.index() * ring_len;
        let ring = self.ring(chunk).to_vec();
        for (r, &id) in ring.iter().enumerate() {
            self.pool.sub_normal(id, self.contributions[base + r]);
            let pos = self.layout.ring_grid_pos(r as u32);
            self.pool.set_position(id, grid[self.layout.grid_index(pos)]);
        }
        let slot = self.chunks[chunk.index()].interior_slot;
        let contributions = self.write_vertices(&ring, slot, grid);
        self.contributions[base..base + ring_len].copy_from_slice(&contributions);
    }

    fn write_chunk(&mut self, chunk: ChunkId, ring: &[SharedVrtxId], slot: u32, grid: &[DVec3]) {
        let contributions = self.write_vertices(ring, slot, grid);
        self.contributions.extend_from_slice(&contributions);

        let indices: Vec<u32> = self
            .layout
            .triangles()
            .iter()
            .flatten()
            .map(|&vertex| self.buffer_index(vertex, ring, slot))
            .collect();
        let start = chunk.index() * self.layout.index_count() as usize;
        self.buffers.write_indices(start, indices);
    }

    /// Write interior vertices and add face normals to the ring vertices.
    /// Returns what each ring vertex received.
    fn write_vertices(&mut self, ring: &[SharedVrtxId], slot: u32, grid: &[DVec3]) -> Vec<DVec3> {
        let layout = &self.layout;
        let n = layout.segments();
        let mut interior = vec![(DVec3::ZERO, DVec3::ZERO); layout.interior_count() as usize];
        let mut ring_positions = vec![DVec3::ZERO; ring.len()];
        for y in 0..=n {
            for x in 0..=y {
                let pos = GridPos::new(x, y);
                let position = grid[layout.grid_index(pos)];
                match layout.vertex_at(pos) {
                    GridVertex::Ring(r) => ring_positions[r as usize] = position,
                    GridVertex::Interior(i) => interior[i as usize].0 = position,
                }
            }
        }
        let position_of = |vertex: GridVertex| match vertex {
            GridVertex::Ring(r) => ring_positions[r as usize],
            GridVertex::Interior(i) => interior[i as usize].0,
        };

        let mut contributions = vec![DVec3::ZERO; ring.len()];
        let mut interior_normals = vec![DVec3::ZERO; interior.len()];
        for triangle in layout.triangles() {
            let [a, b, c] = (*triangle).map(&position_of);
            let face = (b - a).cross(c - a);
            for vertex in triangle {
                match *vertex {
                    GridVertex::Ring(r) => contributions[r as usize] += face,
                    GridVertex::Interior(i) => interior_normals[i as usize] += face,
                }
            }
        }

        let base = self.interior_base(slot);
        for (i, ((position, _), normal)) in interior.iter().zip(&interior_normals).enumerate() {
            let normal = surface_normal(*normal, *position);
            self.buffers
                .set_vertex(base + i as u32, to_vertex(*position, normal));
        }

        for (&id, &contribution) in ring.iter().zip(&contributions) {
            self.pool.add_normal(id, contribution);
            let position = self.pool.position(id);
            let normal = surface_normal(self.pool.normal_sum(id), position);
            self.buffers.set_vertex(id.0, to_vertex(position, normal));
        }
        contributions
    }

    fn refresh_shared_normal(&mut self, id: SharedVrtxId) {
        let normal = surface_normal(self.pool.normal_sum(id), self.pool.position(id));
        self.buffers.set_normal(id.0, normal.as_vec3().to_array());
    }

    /// Verify reference counts, ring and index validity, slot packing and
    /// ancestor counters. Walks everything; meant for tests and debug runs.
    pub fn check_invariants(&self, terrain: &TerrainSkeleton) -> Result<(), ChunkError> {
        macro_rules! ensure {
            ($cond:expr, $($arg:tt)+) => {
                if !$cond {
                    return Err(ChunkError::Invariant(format!($($arg)+)));
                }
            };
        }

        let skeleton = terrain.skeleton();
        let ring_len = self.layout.ring_len() as usize;
        let index_count = self.layout.index_count() as usize;
        let chunk_count = self.chunks.len();
        ensure!(chunk_count as u32 <= self.max_chunks, "{chunk_count} chunks over capacity");
        ensure!(
            self.rings.len() == chunk_count * ring_len
                && self.contributions.len() == chunk_count * ring_len,
            "ring storage does not match {chunk_count} chunks"
        );
        ensure!(
            self.buffers.indices().len() == chunk_count * index_count,
            "index buffer holds {} indices for {chunk_count} chunks",
            self.buffers.indices().len()
        );

        let mut uses = vec![0u32; self.pool.capacity() as usize];
        let mut slots = FxHashSet::default();
        let mut descendants = vec![0u32; self.descendants.len()];
        let interior_count = self.layout.interior_count();
        for (k, record) in self.chunks.iter().enumerate() {
            let chunk = ChunkId(k as u32);
            let tri = record.tri;
            ensure!(
                skeleton.exists(tri) && skeleton.is_leaf(tri),
                "chunk {k} sits on {tri} which is not a leaf"
            );
            ensure!(self.chunk_of(tri) == Some(chunk), "{tri} does not map back to chunk {k}");
            ensure!(
                record.interior_slot < self.interior_high_water
                    && !self.interior_free.contains(&record.interior_slot)
                    && slots.insert(record.interior_slot),
                "chunk {k} holds bad interior slot {}",
                record.interior_slot
            );

            let ring = self.ring(chunk);
            for &id in ring {
                ensure!(self.pool.is_live(id), "chunk {k} ring holds dead {id}");
                uses[id.index()] += 1;
            }
            let interior = self.interior_base(record.interior_slot)
                ..self.interior_base(record.interior_slot) + interior_count;
            for &index in &self.buffers.indices()[k * index_count..(k + 1) * index_count] {
                ensure!(
                    interior.contains(&index) || ring.contains(&SharedVrtxId(index)),
                    "chunk {k} indexes vertex {index} it does not own"
                );
            }

            let mut ancestor = skeleton.parent(tri);
            while let Some(parent) = ancestor {
                if let Some(count) = descendants.get_mut(parent.index()) {
                    *count += 1;
                }
                ancestor = skeleton.parent(parent);
            }
        }

        for id in self.pool.live_ids() {
            let refcount = self.pool.refcount(id);
            ensure!(
                uses[id.index()] == refcount,
                "{id} is used by {} ring slots but has refcount {refcount}",
                uses[id.index()]
            );
        }
        let used = uses.iter().filter(|&&count| count > 0).count() as u32;
        ensure!(used == self.pool.live(), "{used} ring vertices but {} live", self.pool.live());

        for (index, (&stored, &counted)) in self.descendants.iter().zip(&descendants).enumerate() {
            ensure!(
                stored == counted,
                "tri#{index} counts {stored} chunked descendants, found {counted}"
            );
        }
        for (index, chunk) in self.chunk_of.iter().enumerate() {
            if let Some(chunk) = chunk {
                ensure!(
                    chunk.index() < chunk_count && self.chunks[chunk.index()].tri == SkTriId(index as u32),
                    "tri#{index} maps to stale chunk {}",
                    chunk.0
                );
            }
        }

        for (&vertex, &id) in &self.corner_to_shared {
            ensure!(self.pool.is_live(id), "corner {vertex} maps to dead {id}");
            ensure!(
                skeleton.vertex_refcount(vertex) > 0,
                "corner map holds removed {vertex}"
            );
            ensure!(
                self.shared_to_corner[id.index()] == Some(vertex),
                "{id} does not map back to corner {vertex}"
            );
        }
        Ok(())
    }
}

/// Normalized normal sum, or the radial direction where the sum vanishes.
fn surface_normal(sum: DVec3, position: DVec3) -> DVec3 {
    sum.try_normalize()
        .unwrap_or_else(|| position.normalize_or_zero())
}

fn to_vertex(position: DVec3, normal: DVec3) -> TerrainVertex {
    TerrainVertex::new(position.as_vec3().to_array(), normal.as_vec3().to_array())
}
