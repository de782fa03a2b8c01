//! Staging buffer for edits that span many chunks.
//!
//! A [`VoxelBuffer`] copies a cuboid of live chunks into one flat array,
//! lets generation and bulk edits work on it without touching the chunk
//! table, and writes the differences back chunk by chunk.

use std::collections::BTreeMap;

use crate::area::VoxelArea;
use crate::chunk::{Chunk, ModState};
use crate::node::Node;
use crate::pos::{ChunkPos, LocalPos, NodePos};
use crate::table::{ChunkTable, ModifiedChunks, NodeGrid};

/// The cell has not been filled by [`VoxelBuffer::emerge`] or a write.
pub const VOXELFLAG_NOT_LOADED: u8 = 0x01;
/// The chunk behind this cell was missing or a dummy at emerge time.
pub const VOXELFLAG_INEXISTENT: u8 = 0x02;

const NO_DATA: u8 = VOXELFLAG_NOT_LOADED | VOXELFLAG_INEXISTENT;

/// Flat node array over a [`VoxelArea`] with per-cell load flags.
#[derive(Clone, Debug, Default)]
pub struct VoxelBuffer {
    area: VoxelArea,
    data: Vec<Node>,
    flags: Vec<u8>,
    /// Chunks copied in so far; `false` if the chunk did not exist.
    loaded_chunks: BTreeMap<ChunkPos, bool>,
}

impl VoxelBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn area(&self) -> VoxelArea {
        self.area
    }

    /// Chunks emerged so far and whether each one had data.
    pub fn loaded_chunks(&self) -> &BTreeMap<ChunkPos, bool> {
        &self.loaded_chunks
    }

    /// Grows the buffer to cover `area` as well, keeping existing contents.
    /// New cells are flagged [`VOXELFLAG_NOT_LOADED`].
    pub fn add_area(&mut self, area: VoxelArea) {
        if area.is_empty() || self.area.contains_area(&area) {
            return;
        }
        let new_area = self.area.union(&area);
        let volume = new_area.volume();
        let mut data = vec![Node::IGNORE; volume];
        let mut flags = vec![VOXELFLAG_NOT_LOADED; volume];

        for (old_index, p) in self.area.iter().enumerate() {
            let i = new_area.index(p);
            data[i] = self.data[old_index];
            flags[i] = self.flags[old_index];
        }

        self.area = new_area;
        self.data = data;
        self.flags = flags;
    }

    /// Copies chunks `[cmin, cmax]` in from `table`.
    ///
    /// Chunks already emerged are skipped so that staged edits survive.
    /// Missing and dummy chunks are flagged [`VOXELFLAG_INEXISTENT`].
    pub fn emerge(&mut self, cmin: ChunkPos, cmax: ChunkPos, table: &ChunkTable) {
        self.add_area(VoxelArea::from_chunks(cmin, cmax));

        for pos in ChunkPos::iter_box(cmin, cmax) {
            if self.loaded_chunks.contains_key(&pos) {
                continue;
            }
            let existed = match table.get(pos).and_then(Chunk::nodes) {
                Some(nodes) => {
                    for (local_index, node) in nodes.iter().enumerate() {
                        let p = pos.node_at(LocalPos::from_index(local_index));
                        let i = self.area.index(p);
                        self.data[i] = *node;
                        self.flags[i] = 0;
                    }
                    true
                }
                None => {
                    for p in VoxelArea::of_chunk(pos).iter() {
                        let i = self.area.index(p);
                        self.flags[i] |= VOXELFLAG_INEXISTENT;
                    }
                    false
                }
            };
            self.loaded_chunks.insert(pos, existed);
        }
    }

    /// Raw cell content. Positions outside the buffer read as IGNORE.
    ///
    /// Reading a cell that was never emerged or written is a caller bug.
    pub fn get(&self, p: NodePos) -> Node {
        if !self.area.contains(p) {
            return Node::IGNORE;
        }
        let i = self.area.index(p);
        debug_assert!(
            self.flags[i] != VOXELFLAG_NOT_LOADED,
            "read of un-emerged cell {p:?}"
        );
        self.data[i]
    }

    /// Load flags of the cell at `p`; outside cells report not-loaded.
    pub fn flags(&self, p: NodePos) -> u8 {
        if !self.area.contains(p) {
            return VOXELFLAG_NOT_LOADED;
        }
        self.flags[self.area.index(p)]
    }

    /// Writes a cell, growing the buffer if `p` lies outside it.
    pub fn set(&mut self, p: NodePos, node: Node) {
        if !self.area.contains(p) {
            self.add_area(VoxelArea::new(p, p));
        }
        let i = self.area.index(p);
        self.data[i] = node;
        self.flags[i] &= !NO_DATA;
    }

    /// Sets every cell of `area` to `node`.
    pub fn fill(&mut self, area: VoxelArea, node: Node) {
        self.add_area(area);
        for p in area.iter() {
            let i = self.area.index(p);
            self.data[i] = node;
            self.flags[i] &= !NO_DATA;
        }
    }

    /// Writes every differing cell back into `table`.
    ///
    /// Chunks that did not exist at emerge time are skipped, as are chunks
    /// already generated unless `overwrite_generated` is set. Every chunk
    /// that changed is raised to [`ModState::WriteNeeded`] and added to
    /// `modified`.
    pub fn blit_back(
        &self,
        table: &mut ChunkTable,
        overwrite_generated: bool,
        modified: &mut ModifiedChunks,
    ) {
        for (&pos, &existed) in &self.loaded_chunks {
            if !existed {
                continue;
            }
            let Some(chunk) = table.get_mut(pos) else {
                continue;
            };
            if chunk.is_dummy() || (!overwrite_generated && chunk.is_generated()) {
                continue;
            }

            let mut changed = false;
            for p in VoxelArea::of_chunk(pos).iter() {
                let i = self.area.index(p);
                if self.flags[i] & NO_DATA != 0 {
                    continue;
                }
                let local = p.local();
                if chunk.get_node(local) != self.data[i] {
                    chunk.set_node_no_check(local, self.data[i]);
                    changed = true;
                }
            }
            if changed {
                chunk.raise_modified(ModState::WriteNeeded, "blit_back");
                modified.insert(pos);
            }
        }
    }

    /// Drops all contents.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl NodeGrid for VoxelBuffer {
    fn node(&self, p: NodePos) -> Node {
        if !self.area.contains(p) {
            return Node::IGNORE;
        }
        let i = self.area.index(p);
        if self.flags[i] & NO_DATA != 0 {
            return Node::IGNORE;
        }
        self.data[i]
    }

    fn set_node(&mut self, p: NodePos, node: Node) -> bool {
        if !self.area.contains(p) {
            return false;
        }
        let i = self.area.index(p);
        self.data[i] = node;
        self.flags[i] &= !NO_DATA;
        true
    }

    fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.loaded_chunks.get(&pos).copied().unwrap_or(false)
    }
}
