//! Inclusive axis-aligned boxes of node positions.

use crate::pos::{CHUNK_SIZE, ChunkPos, NodePos};

/// Inclusive box `[min, max]` of node positions.
///
/// An area whose `max` is below `min` on any axis is empty; the default
/// area is empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoxelArea {
    pub min: NodePos,
    pub max: NodePos,
}

impl Default for VoxelArea {
    fn default() -> Self {
        Self {
            min: NodePos::new(0, 0, 0),
            max: NodePos::new(-1, -1, -1),
        }
    }
}

impl VoxelArea {
    pub const fn new(min: NodePos, max: NodePos) -> Self {
        Self { min, max }
    }

    /// Area covering every node of the chunks in `[cmin, cmax]`.
    pub const fn from_chunks(cmin: ChunkPos, cmax: ChunkPos) -> Self {
        Self::new(cmin.min_node(), cmax.max_node())
    }

    /// Area covering one chunk.
    pub const fn of_chunk(pos: ChunkPos) -> Self {
        Self::from_chunks(pos, pos)
    }

    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    /// Side lengths; zero on every axis for an empty area.
    pub fn extent(&self) -> NodePos {
        if self.is_empty() {
            return NodePos::new(0, 0, 0);
        }
        NodePos::new(
            self.max.x - self.min.x + 1,
            self.max.y - self.min.y + 1,
            self.max.z - self.min.z + 1,
        )
    }

    /// Number of node positions inside.
    pub fn volume(&self) -> usize {
        let e = self.extent();
        e.x as usize * e.y as usize * e.z as usize
    }

    pub fn contains(&self, p: NodePos) -> bool {
        p.x >= self.min.x
            && p.y >= self.min.y
            && p.z >= self.min.z
            && p.x <= self.max.x
            && p.y <= self.max.y
            && p.z <= self.max.z
    }

    /// Whether `other` lies fully inside. Empty areas are inside everything.
    pub fn contains_area(&self, other: &VoxelArea) -> bool {
        other.is_empty() || (self.contains(other.min) && self.contains(other.max))
    }

    /// Smallest area covering both.
    pub fn union(&self, other: &VoxelArea) -> VoxelArea {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        VoxelArea::new(
            NodePos::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            NodePos::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        )
    }

    /// Linear index of `p` (x fastest, then y, then z). `p` must be inside.
    pub fn index(&self, p: NodePos) -> usize {
        debug_assert!(self.contains(p), "{p:?} outside {self:?}");
        let e = self.extent();
        let (dx, dy, dz) = (p.x - self.min.x, p.y - self.min.y, p.z - self.min.z);
        dz as usize * e.y as usize * e.x as usize + dy as usize * e.x as usize + dx as usize
    }

    /// Area grown by `d` nodes on every side.
    pub fn pad(&self, d: i32) -> VoxelArea {
        VoxelArea::new(self.min.offset(-d, -d, -d), self.max.offset(d, d, d))
    }

    /// Range of chunks the area touches.
    pub fn chunk_range(&self) -> (ChunkPos, ChunkPos) {
        (self.min.chunk(), self.max.chunk())
    }

    /// Iterates over every position in index order.
    pub fn iter(&self) -> impl Iterator<Item = NodePos> + use<> {
        let VoxelArea { min, max } = *self;
        (min.z..=max.z).flat_map(move |z| {
            (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| NodePos::new(x, y, z)))
        })
    }

    /// Number of chunks per side when the area is chunk-aligned.
    pub fn chunks_per_side(&self) -> NodePos {
        let e = self.extent();
        NodePos::new(e.x / CHUNK_SIZE, e.y / CHUNK_SIZE, e.z / CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let area = VoxelArea::default();
        assert!(area.is_empty());
        assert_eq!(area.volume(), 0);
        assert_eq!(area.iter().count(), 0);
    }

    #[test]
    fn test_chunk_area() {
        let area = VoxelArea::of_chunk(ChunkPos::new(-1, 0, 2));
        assert_eq!(area.volume(), 4096);
        assert!(area.contains(NodePos::new(-16, 0, 32)));
        assert!(area.contains(NodePos::new(-1, 15, 47)));
        assert!(!area.contains(NodePos::new(0, 0, 32)));
        assert_eq!(area.chunks_per_side(), NodePos::new(1, 1, 1));
    }

    #[test]
    fn test_index_matches_iteration_order() {
        let area = VoxelArea::new(NodePos::new(-2, 3, 0), NodePos::new(1, 4, 2));
        for (i, p) in area.iter().enumerate() {
            assert_eq!(area.index(p), i);
        }
        assert_eq!(area.iter().count(), area.volume());
    }

    #[test]
    fn test_union_and_contains_area() {
        let a = VoxelArea::new(NodePos::new(0, 0, 0), NodePos::new(3, 3, 3));
        let b = VoxelArea::new(NodePos::new(-5, 2, 2), NodePos::new(1, 10, 2));
        let u = a.union(&b);
        assert_eq!(u.min, NodePos::new(-5, 0, 0));
        assert_eq!(u.max, NodePos::new(3, 10, 3));
        assert!(u.contains_area(&a));
        assert!(u.contains_area(&b));
        assert!(!a.contains_area(&b));
        assert_eq!(VoxelArea::default().union(&a), a);
    }

    #[test]
    fn test_pad() {
        let area = VoxelArea::of_chunk(ChunkPos::new(0, 0, 0)).pad(1);
        assert_eq!(area.min, NodePos::new(-1, -1, -1));
        assert_eq!(area.max, NodePos::new(16, 16, 16));
        assert_eq!(area.chunk_range(), (ChunkPos::new(-1, -1, -1), ChunkPos::new(1, 1, 1)));
    }
}
