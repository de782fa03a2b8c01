//! Generator input captured for one region.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use strata_liquid::UniqueQueue;
use strata_voxel::{ChunkPos, ChunkTable, NodePos, VoxelArea, VoxelBuffer};

/// Everything a generator needs to fill one region, plus its outputs.
///
/// The buffer covers the region padded by one chunk on every side so
/// painters and the lighting pass can look across the region border.
#[derive(Debug)]
pub struct BlockMakeData {
    /// Seed for this region, derived from the world seed.
    pub seed: u64,
    pub blockpos_min: ChunkPos,
    pub blockpos_max: ChunkPos,
    /// The chunk whose request started this generation.
    pub blockpos_requested: ChunkPos,
    pub vmanip: VoxelBuffer,
    /// Liquid positions that still need settling once the region is live.
    pub transforming_liquid: UniqueQueue<NodePos>,
}

impl BlockMakeData {
    pub fn new(
        seed: u64,
        blockpos_min: ChunkPos,
        blockpos_max: ChunkPos,
        blockpos_requested: ChunkPos,
    ) -> Self {
        Self {
            seed,
            blockpos_min,
            blockpos_max,
            blockpos_requested,
            vmanip: VoxelBuffer::new(),
            transforming_liquid: UniqueQueue::new(),
        }
    }

    /// Node area of the region itself.
    pub fn node_area(&self) -> VoxelArea {
        VoxelArea::from_chunks(self.blockpos_min, self.blockpos_max)
    }

    /// First and last chunk of the padded region.
    pub fn padded_chunks(&self) -> (ChunkPos, ChunkPos) {
        (
            self.blockpos_min.offset(-1, -1, -1),
            self.blockpos_max.offset(1, 1, 1),
        )
    }

    /// Node area of the padded region.
    pub fn padded_area(&self) -> VoxelArea {
        let (min, max) = self.padded_chunks();
        VoxelArea::from_chunks(min, max)
    }

    /// Copies the padded region out of `table` into the buffer.
    pub fn emerge(&mut self, table: &ChunkTable) {
        let (min, max) = self.padded_chunks();
        self.vmanip.emerge(min, max, table);
    }
}

/// Seed for the region starting at `blockpos_min`.
pub fn region_seed(world_seed: u64, blockpos_min: ChunkPos) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    blockpos_min.x.hash(&mut hasher);
    blockpos_min.y.hash(&mut hasher);
    blockpos_min.z.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_seed_deterministic() {
        let pos = ChunkPos::new(-2, 0, 3);
        assert_eq!(region_seed(7, pos), region_seed(7, pos));
        assert_ne!(region_seed(7, pos), region_seed(8, pos));
        assert_ne!(region_seed(7, pos), region_seed(7, ChunkPos::new(3, 0, -2)));
    }

    #[test]
    fn test_padded_area_adds_one_chunk() {
        let data = BlockMakeData::new(
            0,
            ChunkPos::new(0, 0, 0),
            ChunkPos::new(1, 0, 1),
            ChunkPos::new(1, 0, 0),
        );
        assert_eq!(data.node_area().extent(), NodePos::new(32, 16, 32));
        assert_eq!(data.padded_area().extent(), NodePos::new(64, 48, 64));
        assert_eq!(data.padded_area().min, NodePos::new(-16, -16, -16));
    }
}
