//! Owning table of loaded chunks and the [`NodeGrid`] abstraction shared by
//! the live map and staged edit buffers.
//!
//! The [`ChunkTable`] provides O(1) chunk lookup, insert, and removal using an
//! [`FxHashMap`](rustc_hash::FxHashMap) for fast hashing of small fixed-size
//! keys.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::chunk::Chunk;
use crate::node::Node;
use crate::pos::{ChunkPos, NodePos};

/// Chunks touched by an operation, in deterministic order.
pub type ModifiedChunks = BTreeSet<ChunkPos>;

/// Node storage addressed by world position.
///
/// Lighting and liquid algorithms are written against this trait so that
/// they run unchanged on the live chunk table and on a [`VoxelBuffer`].
///
/// [`VoxelBuffer`]: crate::VoxelBuffer
pub trait NodeGrid {
    /// Node at `p`, or [`Node::IGNORE`] when no data is loaded there.
    fn node(&self, p: NodePos) -> Node;

    /// Writes a node. Returns `false` when `p` has no backing data.
    fn set_node(&mut self, p: NodePos, node: Node) -> bool;

    /// Whether the chunk at `pos` has data in this grid.
    fn has_chunk(&self, pos: ChunkPos) -> bool;
}

/// Owns every chunk currently held in memory.
#[derive(Debug, Default)]
pub struct ChunkTable {
    chunks: FxHashMap<ChunkPos, Chunk>,
}

impl ChunkTable {
    pub fn new() -> Self {
        Self {
            chunks: FxHashMap::default(),
        }
    }

    /// Inserts a chunk, replacing any chunk already at its position.
    pub fn insert(&mut self, chunk: Chunk) -> Option<Chunk> {
        self.chunks.insert(chunk.pos(), chunk)
    }

    pub fn remove(&mut self, pos: ChunkPos) -> Option<Chunk> {
        self.chunks.remove(&pos)
    }

    pub fn get(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    pub fn get_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        self.chunks.get_mut(&pos)
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.chunks.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChunkPos, &Chunk)> {
        self.chunks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ChunkPos, &mut Chunk)> {
        self.chunks.iter_mut()
    }
}

impl NodeGrid for ChunkTable {
    fn node(&self, p: NodePos) -> Node {
        match self.chunks.get(&p.chunk()) {
            Some(chunk) => chunk.get_node(p.local()),
            None => Node::IGNORE,
        }
    }

    fn set_node(&mut self, p: NodePos, node: Node) -> bool {
        match self.chunks.get_mut(&p.chunk()) {
            Some(chunk) => chunk.set_node(p.local(), node),
            None => false,
        }
    }

    fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.chunks.get(&pos).is_some_and(|c| !c.is_dummy())
    }
}
