//! GPU-ready vertex and index storage with dirty range tracking.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

/// One mesh vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

static_assertions::assert_eq_size!(TerrainVertex, [u8; 24]);

impl TerrainVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }
}

/// Element ranges changed since the last [`MeshBuffers::take_dirty`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyRanges {
    pub vertices: Option<Range<usize>>,
    pub indices: Option<Range<usize>>,
}

impl DirtyRanges {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_none() && self.indices.is_none()
    }
}

fn merge(range: &mut Option<Range<usize>>, with: Range<usize>) {
    if with.is_empty() {
        return;
    }
    *range = Some(match range.take() {
        Some(r) => r.start.min(with.start)..r.end.max(with.end),
        None => with,
    });
}

/// Vertex buffer of fixed size and a densely packed index buffer.
///
/// Shared vertices occupy the front of the vertex buffer, followed by one
/// block of interior vertices per chunk slot.
#[derive(Debug, Clone)]
pub struct MeshBuffers {
    vertices: Vec<TerrainVertex>,
    indices: Vec<u32>,
    dirty: DirtyRanges,
}

impl MeshBuffers {
    /// `vertex_capacity` vertices, zeroed, and room for `index_capacity` indices.
    pub fn new(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            vertices: vec![TerrainVertex::zeroed(); vertex_capacity],
            indices: Vec::with_capacity(index_capacity),
            dirty: DirtyRanges::default(),
        }
    }

    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn vertex(&self, index: u32) -> TerrainVertex {
        self.vertices[index as usize]
    }

    pub fn set_vertex(&mut self, index: u32, vertex: TerrainVertex) {
        let index = index as usize;
        self.vertices[index] = vertex;
        merge(&mut self.dirty.vertices, index..index + 1);
    }

    pub fn set_normal(&mut self, index: u32, normal: [f32; 3]) {
        let index = index as usize;
        self.vertices[index].normal = normal;
        merge(&mut self.dirty.vertices, index..index + 1);
    }

    /// Overwrite indices from `start` on, growing the buffer past its end.
    pub fn write_indices(&mut self, start: usize, indices: impl IntoIterator<Item = u32>) {
        let mut end = start;
        for index in indices {
            if end < self.indices.len() {
                self.indices[end] = index;
            } else {
                self.indices.push(index);
            }
            end += 1;
        }
        merge(&mut self.dirty.indices, start..end);
    }

    /// Copy `len` indices from `from` to `to`.
    pub fn copy_indices(&mut self, from: usize, to: usize, len: usize) {
        self.indices.copy_within(from..from + len, to);
        merge(&mut self.dirty.indices, to..to + len);
    }

    /// Drop indices past `len`.
    pub fn truncate_indices(&mut self, len: usize) {
        self.indices.truncate(len);
    }

    /// Dirty ranges since the last call, clearing them.
    pub fn take_dirty(&mut self) -> DirtyRanges {
        std::mem::take(&mut self.dirty)
    }

    pub fn dirty(&self) -> &DirtyRanges {
        &self.dirty
    }
}
