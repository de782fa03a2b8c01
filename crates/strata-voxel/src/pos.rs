//! Node, chunk and sector coordinates.
//!
//! Node positions are world-space `i32` triples. Chunk positions are `i16`
//! triples on the chunk grid; conversion is floor division by [`CHUNK_SIZE`],
//! so negative coordinates land in the chunk below rather than chunk zero.

use std::ops::{Add, Sub};

/// Nodes per chunk side.
pub const CHUNK_SIZE: i32 = 16;

/// Nodes per chunk.
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

/// World-space node coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate (up).
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

/// The six face neighbours.
///
/// Index 1 is straight up and index 4 straight down; the liquid transform
/// relies on this ordering to classify neighbours by height.
pub const NEIGHBORS_6: [NodePos; 6] = [
    NodePos::new(0, 0, 1),
    NodePos::new(0, 1, 0),
    NodePos::new(1, 0, 0),
    NodePos::new(0, 0, -1),
    NodePos::new(0, -1, 0),
    NodePos::new(-1, 0, 0),
];

impl NodePos {
    /// Creates a node position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns this position offset by `(dx, dy, dz)`.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Position directly above.
    pub const fn up(self) -> Self {
        self.offset(0, 1, 0)
    }

    /// Position directly below.
    pub const fn down(self) -> Self {
        self.offset(0, -1, 0)
    }

    /// The chunk that contains this node.
    pub fn chunk(self) -> ChunkPos {
        ChunkPos::new(
            self.x.div_euclid(CHUNK_SIZE) as i16,
            self.y.div_euclid(CHUNK_SIZE) as i16,
            self.z.div_euclid(CHUNK_SIZE) as i16,
        )
    }

    /// Position relative to the containing chunk's minimum corner.
    pub fn local(self) -> LocalPos {
        LocalPos::new(
            self.x.rem_euclid(CHUNK_SIZE) as u8,
            self.y.rem_euclid(CHUNK_SIZE) as u8,
            self.z.rem_euclid(CHUNK_SIZE) as u8,
        )
    }

    /// Iterates over the six face neighbours in [`NEIGHBORS_6`] order.
    pub fn neighbors(self) -> impl Iterator<Item = NodePos> {
        NEIGHBORS_6.into_iter().map(move |d| self + d)
    }
}

impl Add for NodePos {
    type Output = NodePos;

    fn add(self, rhs: NodePos) -> NodePos {
        NodePos::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for NodePos {
    type Output = NodePos;

    fn sub(self, rhs: NodePos) -> NodePos {
        NodePos::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Coordinate of a node inside its chunk, each component in `[0, 16)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalPos {
    /// X within the chunk.
    pub x: u8,
    /// Y within the chunk.
    pub y: u8,
    /// Z within the chunk.
    pub z: u8,
}

impl LocalPos {
    /// Creates a local position. Components must be below [`CHUNK_SIZE`].
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Linear index into a chunk's node array (`x + y*16 + z*256`).
    pub const fn index(self) -> usize {
        let s = CHUNK_SIZE as usize;
        self.x as usize + self.y as usize * s + self.z as usize * s * s
    }

    /// Inverse of [`LocalPos::index`].
    pub const fn from_index(index: usize) -> Self {
        let s = CHUNK_SIZE as usize;
        Self::new(
            (index % s) as u8,
            ((index / s) % s) as u8,
            (index / (s * s)) as u8,
        )
    }

    /// Returns `true` if every component is inside the chunk.
    pub const fn is_valid(self) -> bool {
        (self.x as i32) < CHUNK_SIZE && (self.y as i32) < CHUNK_SIZE && (self.z as i32) < CHUNK_SIZE
    }
}

/// Chunk-grid coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    /// Chunk-grid X.
    pub x: i16,
    /// Chunk-grid Y.
    pub y: i16,
    /// Chunk-grid Z.
    pub z: i16,
}

impl ChunkPos {
    /// Creates a chunk position.
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Returns the chunk offset by `(dx, dy, dz)`.
    pub const fn offset(self, dx: i16, dy: i16, dz: i16) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// World position of the chunk's minimum corner node.
    pub const fn min_node(self) -> NodePos {
        NodePos::new(
            self.x as i32 * CHUNK_SIZE,
            self.y as i32 * CHUNK_SIZE,
            self.z as i32 * CHUNK_SIZE,
        )
    }

    /// World position of the chunk's maximum corner node.
    pub const fn max_node(self) -> NodePos {
        self.min_node()
            .offset(CHUNK_SIZE - 1, CHUNK_SIZE - 1, CHUNK_SIZE - 1)
    }

    /// World position of a node inside this chunk.
    pub const fn node_at(self, local: LocalPos) -> NodePos {
        self.min_node()
            .offset(local.x as i32, local.y as i32, local.z as i32)
    }

    /// The vertical column this chunk belongs to.
    pub const fn sector(self) -> SectorPos {
        SectorPos::new(self.x, self.z)
    }

    /// Folds the coordinate into the 64-bit block store key
    /// (`x + y*4096 + z*4096²`).
    pub fn storage_key(self) -> i64 {
        self.z as i64 * 0x100_0000 + self.y as i64 * 0x1000 + self.x as i64
    }

    /// Inverse of [`ChunkPos::storage_key`], sign-extending each 12-bit field.
    pub fn from_storage_key(key: i64) -> Self {
        let x = unsigned_to_signed(key.rem_euclid(4096), 2048);
        let key = (key - x) / 4096;
        let y = unsigned_to_signed(key.rem_euclid(4096), 2048);
        let key = (key - y) / 4096;
        let z = unsigned_to_signed(key.rem_euclid(4096), 2048);
        Self::new(x as i16, y as i16, z as i16)
    }

    /// Iterates over every chunk in the inclusive box `[min, max]`, x fastest.
    pub fn iter_box(min: ChunkPos, max: ChunkPos) -> impl Iterator<Item = ChunkPos> {
        (min.z..=max.z).flat_map(move |z| {
            (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| ChunkPos::new(x, y, z)))
        })
    }
}

fn unsigned_to_signed(value: i64, max_positive: i64) -> i64 {
    if value < max_positive {
        value
    } else {
        value - 2 * max_positive
    }
}

/// Horizontal column of chunks sharing `(x, z)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectorPos {
    /// Chunk-grid X.
    pub x: i16,
    /// Chunk-grid Z.
    pub z: i16,
}

impl SectorPos {
    /// Creates a sector position.
    pub const fn new(x: i16, z: i16) -> Self {
        Self { x, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_nodes_floor_to_lower_chunk() {
        let p = NodePos::new(-1, -16, -17);
        assert_eq!(p.chunk(), ChunkPos::new(-1, -1, -2));
        assert_eq!(p.local(), LocalPos::new(15, 0, 15));
    }

    #[test]
    fn test_chunk_node_bounds() {
        let c = ChunkPos::new(2, -1, 0);
        assert_eq!(c.min_node(), NodePos::new(32, -16, 0));
        assert_eq!(c.max_node(), NodePos::new(47, -1, 15));
        assert_eq!(c.max_node().chunk(), c);
    }

    #[test]
    fn test_local_index_roundtrip() {
        for index in [0, 1, 15, 16, 255, 256, 4095] {
            assert_eq!(LocalPos::from_index(index).index(), index);
        }
        assert_eq!(LocalPos::new(1, 2, 3).index(), 1 + 2 * 16 + 3 * 256);
    }

    #[test]
    fn test_storage_key_folding() {
        assert_eq!(ChunkPos::new(0, 0, 0).storage_key(), 0);
        assert_eq!(ChunkPos::new(1, 0, 0).storage_key(), 1);
        assert_eq!(ChunkPos::new(0, 1, 0).storage_key(), 4096);
        assert_eq!(ChunkPos::new(0, 0, 1).storage_key(), 4096 * 4096);
        assert_eq!(ChunkPos::new(-1, 0, 0).storage_key(), -1);
    }

    #[test]
    fn test_storage_key_sign_extension() {
        let positions = [
            ChunkPos::new(-1, -1, -1),
            ChunkPos::new(2047, -2048, 5),
            ChunkPos::new(-2048, 2047, -2048),
            ChunkPos::new(-7, 300, -1900),
        ];
        for pos in positions {
            assert_eq!(ChunkPos::from_storage_key(pos.storage_key()), pos);
        }
    }

    #[test]
    fn test_iter_box_covers_volume() {
        let all: Vec<_> =
            ChunkPos::iter_box(ChunkPos::new(-1, 0, 0), ChunkPos::new(0, 1, 2)).collect();
        assert_eq!(all.len(), 2 * 2 * 3);
        assert_eq!(all[0], ChunkPos::new(-1, 0, 0));
        assert_eq!(all[1], ChunkPos::new(0, 0, 0));
    }

    #[test]
    fn test_neighbor_order() {
        assert_eq!(NEIGHBORS_6[1], NodePos::new(0, 1, 0));
        assert_eq!(NEIGHBORS_6[4], NodePos::new(0, -1, 0));
        assert_eq!(NodePos::new(0, 0, 0).neighbors().count(), 6);
    }
}
