//! Integer ids for skeleton triangles, triangle groups and vertices.
//!
//! Triangles are stored in groups of 4 siblings, so a triangle id encodes its
//! group and its sibling index: `id = group * 4 + sibling`.

use std::fmt;

/// Id of a skeleton triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkTriId(pub u32);

/// Id of a group of 4 sibling triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkTriGroupId(pub u32);

/// Id of a skeleton vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkVrtxId(pub u32);

/// An id paired with whether it was created by the operation that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeNewId<T> {
    pub id: T,
    pub is_new: bool,
}

impl SkTriId {
    /// Triangle `sibling` (0..4) of `group`.
    #[inline]
    pub const fn from_group(group: SkTriGroupId, sibling: u8) -> Self {
        Self(group.0 * 4 + sibling as u32)
    }

    /// The group this triangle belongs to.
    #[inline]
    pub const fn group(self) -> SkTriGroupId {
        SkTriGroupId(self.0 / 4)
    }

    /// Position within the group. 3 is the center child.
    #[inline]
    pub const fn sibling(self) -> u8 {
        (self.0 % 4) as u8
    }

    /// Index for dense per-triangle arrays and bitsets.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl SkTriGroupId {
    /// Child triangle `sibling` of this group.
    #[inline]
    pub const fn child(self, sibling: u8) -> SkTriId {
        SkTriId::from_group(self, sibling)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl SkVrtxId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SkTriId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tri#{}", self.0)
    }
}

impl fmt::Display for SkTriGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

impl fmt::Display for SkVrtxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vrtx#{}", self.0)
    }
}
