use std::collections::BTreeSet;

use strata_voxel::{ChunkPos, SectorPos};

/// The loaded chunks of one vertical column.
///
/// A sector exists while at least one chunk of its column is loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapSector {
    pos: SectorPos,
    ys: BTreeSet<i16>,
}

impl MapSector {
    pub fn new(pos: SectorPos) -> Self {
        Self {
            pos,
            ys: BTreeSet::new(),
        }
    }

    pub fn pos(&self) -> SectorPos {
        self.pos
    }

    /// Records the chunk at height `y`. Returns `false` if it was present.
    pub fn insert(&mut self, y: i16) -> bool {
        self.ys.insert(y)
    }

    pub fn remove(&mut self, y: i16) -> bool {
        self.ys.remove(&y)
    }

    pub fn contains(&self, y: i16) -> bool {
        self.ys.contains(&y)
    }

    pub fn len(&self) -> usize {
        self.ys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ys.is_empty()
    }

    /// Loaded chunks of the column, bottom to top.
    pub fn chunks(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.ys
            .iter()
            .map(move |&y| ChunkPos::new(self.pos.x, y, self.pos.z))
    }
}
