//! Reference-counted pool of vertices shared between chunk boundaries.

use std::collections::BTreeSet;
use std::fmt;

use glam::DVec3;

use crate::error::ChunkError;

/// Id of a shared vertex; also its index in the vertex buffer. Id 0 is never
/// handed out and marks an unset slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SharedVrtxId(pub u32);

impl SharedVrtxId {
    pub const NULL: SharedVrtxId = SharedVrtxId(0);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SharedVrtxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shared#{}", self.0)
    }
}

/// Fixed-capacity pool of shared vertices.
///
/// Freed ids go to a sorted free list and are handed out lowest first. Ids
/// freed at the top of the used range shrink the high-water mark instead, so
/// allocating and freeing the same ids restores the pool exactly.
#[derive(Debug, Clone)]
pub struct SharedVertexPool {
    refcounts: Vec<u32>,
    positions: Vec<DVec3>,
    normal_sums: Vec<DVec3>,
    free: BTreeSet<u32>,
    high_water: u32,
    live: u32,
}

impl SharedVertexPool {
    /// A pool of `capacity` slots, including the reserved id 0.
    ///
    /// # Panics
    ///
    /// Panics if `capacity < 2`.
    pub fn new(capacity: u32) -> Self {
        assert!(capacity >= 2, "shared vertex pool needs at least 2 slots");
        Self {
            refcounts: vec![0; capacity as usize],
            positions: vec![DVec3::ZERO; capacity as usize],
            normal_sums: vec![DVec3::ZERO; capacity as usize],
            free: BTreeSet::new(),
            high_water: 1,
            live: 0,
        }
    }

    /// Total slots including the reserved id 0.
    pub fn capacity(&self) -> u32 {
        self.refcounts.len() as u32
    }

    /// Vertices currently referenced.
    pub fn live(&self) -> u32 {
        self.live
    }

    /// Freed ids below the high-water mark.
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// One past the highest id ever in use.
    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Ids that can still be created.
    pub fn available(&self) -> u32 {
        self.free.len() as u32 + (self.capacity() - self.high_water)
    }

    pub fn can_allocate(&self, count: u32) -> bool {
        self.available() >= count
    }

    /// Create a vertex at `position` with a reference count of 1.
    pub fn create(&mut self, position: DVec3) -> Result<SharedVrtxId, ChunkError> {
        let id = match self.free.pop_first() {
            Some(id) => id,
            None if self.high_water < self.capacity() => {
                self.high_water += 1;
                self.high_water - 1
            }
            None => {
                return Err(ChunkError::SharedCapacity {
                    needed: 1,
                    available: 0,
                });
            }
        };
        let index = id as usize;
        self.refcounts[index] = 1;
        self.positions[index] = position;
        self.normal_sums[index] = DVec3::ZERO;
        self.live += 1;
        Ok(SharedVrtxId(id))
    }

    /// Add a reference to a live vertex.
    ///
    /// # Panics
    ///
    /// Panics if the vertex is not live.
    pub fn acquire(&mut self, id: SharedVrtxId) {
        assert!(self.is_live(id), "acquire of dead {id}");
        self.refcounts[id.index()] += 1;
    }

    /// Drop a reference. Returns `true` if the vertex was freed.
    ///
    /// # Panics
    ///
    /// Panics if the vertex is not live.
    pub fn release(&mut self, id: SharedVrtxId) -> bool {
        assert!(self.is_live(id), "release of dead {id}");
        let count = &mut self.refcounts[id.index()];
        *count -= 1;
        if *count > 0 {
            return false;
        }
        self.positions[id.index()] = DVec3::ZERO;
        self.normal_sums[id.index()] = DVec3::ZERO;
        self.live -= 1;
        self.free.insert(id.0);
        while self.high_water > 1 && self.free.remove(&(self.high_water - 1)) {
            self.high_water -= 1;
        }
        true
    }

    #[inline]
    pub fn is_live(&self, id: SharedVrtxId) -> bool {
        !id.is_null() && self.refcounts.get(id.index()).is_some_and(|&c| c > 0)
    }

    pub fn refcount(&self, id: SharedVrtxId) -> u32 {
        self.refcounts.get(id.index()).copied().unwrap_or(0)
    }

    /// Position in meters.
    #[inline]
    pub fn position(&self, id: SharedVrtxId) -> DVec3 {
        self.positions[id.index()]
    }

    /// Move a live vertex.
    ///
    /// # Panics
    ///
    /// Panics if the vertex is not live.
    pub fn set_position(&mut self, id: SharedVrtxId, position: DVec3) {
        assert!(self.is_live(id), "move of dead {id}");
        self.positions[id.index()] = position;
    }

    /// Sum of area-weighted face normals from every chunk using this vertex.
    #[inline]
    pub fn normal_sum(&self, id: SharedVrtxId) -> DVec3 {
        self.normal_sums[id.index()]
    }

    pub fn add_normal(&mut self, id: SharedVrtxId, normal: DVec3) {
        self.normal_sums[id.index()] += normal;
    }

    pub fn sub_normal(&mut self, id: SharedVrtxId, normal: DVec3) {
        self.normal_sums[id.index()] -= normal;
    }

    /// Live ids in ascending order.
    pub fn live_ids(&self) -> impl Iterator<Item = SharedVrtxId> + '_ {
        (1..self.high_water)
            .map(SharedVrtxId)
            .filter(|&id| self.refcounts[id.index()] > 0)
    }
}
