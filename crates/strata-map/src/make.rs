//! Handing regions to the generator and taking them back.
//!
//! [`ServerMap::init_block_make`] claims a region, makes sure every chunk of
//! the padded region exists and copies them into a [`BlockMakeData`]. The
//! generator then runs without access to the map. Afterwards
//! [`ServerMap::finish_block_make`] writes the result back, marks the region
//! generated and releases the claim. A claimed region is never handed out a
//! second time, so each region is generated at most once.

use strata_mapgen::{BlockMakeData, region_seed};
use strata_voxel::{
    Chunk, ChunkPos, EditContext, ModState, ModifiedChunks, NodePos, VoxelArea,
};
use tracing::{debug, info};

use crate::error::MapError;
use crate::map::{ServerMap, is_underground};

/// Outcome of [`ServerMap::init_block_make`].
#[derive(Debug)]
pub enum BlockMakeStatus {
    /// The region is claimed; generate into the data and finish it.
    Ready(BlockMakeData),
    /// The requested chunk is generated already.
    AlreadyGenerated,
    /// Another generator holds the region.
    Busy,
    /// The padded region crosses the generation limit.
    OutOfLimits,
}

/// First and last chunk of the generation region containing `pos`.
///
/// Regions are `region_chunks` chunks per side, offset so that the region
/// around the origin is centred on it.
pub fn containing_region(pos: ChunkPos, region_chunks: u16) -> (ChunkPos, ChunkPos) {
    let size = i32::from(region_chunks.max(1));
    let offset = -(size / 2);
    let axis = |c: i16| ((i32::from(c) - offset).div_euclid(size) * size + offset) as i16;
    let min = ChunkPos::new(axis(pos.x), axis(pos.y), axis(pos.z));
    let last = (size - 1) as i16;
    (min, min.offset(last, last, last))
}

impl ServerMap {
    /// Region of `pos` under the configured region size.
    pub fn region_of(&self, pos: ChunkPos) -> (ChunkPos, ChunkPos) {
        containing_region(pos, self.config().world.region_chunks)
    }

    /// Whether a generator currently holds the region starting at `min`.
    pub fn is_region_in_progress(&self, min: ChunkPos) -> bool {
        self.regions_in_progress.contains(&min)
    }

    /// Prepares generation of the region containing `pos`.
    ///
    /// Missing chunks of the padded region are loaded or created blank, and
    /// all of them are pinned until the region is finished.
    pub fn init_block_make(&mut self, pos: ChunkPos) -> Result<BlockMakeStatus, MapError> {
        let (bpmin, bpmax) = self.region_of(pos);
        let full_min = bpmin.offset(-1, -1, -1);
        let full_max = bpmax.offset(1, 1, 1);
        if self.is_over_generation_limit(full_min) || self.is_over_generation_limit(full_max) {
            debug!(?pos, "region crosses the generation limit");
            return Ok(BlockMakeStatus::OutOfLimits);
        }
        if self.chunks.get(pos).is_some_and(Chunk::is_generated) {
            return Ok(BlockMakeStatus::AlreadyGenerated);
        }
        if self.regions_in_progress.contains(&bpmin) {
            return Ok(BlockMakeStatus::Busy);
        }

        let water_level = self.mapgen.water_level();
        for p in ChunkPos::iter_box(full_min, full_max) {
            if self.emerge_chunk(p, false)?.is_none() {
                self.create_chunk(p)?
                    .set_underground(is_underground(p, water_level));
            }
        }
        if self.chunks.get(pos).is_some_and(Chunk::is_generated) {
            return Ok(BlockMakeStatus::AlreadyGenerated);
        }

        for p in ChunkPos::iter_box(full_min, full_max) {
            self.pin(p);
        }
        self.regions_in_progress.insert(bpmin);

        let seed = region_seed(self.config().world.seed, bpmin);
        let mut data = BlockMakeData::new(seed, bpmin, bpmax, pos);
        data.emerge(&self.chunks);
        debug!(?bpmin, ?bpmax, requested = ?pos, "claimed region");
        Ok(BlockMakeStatus::Ready(data))
    }

    /// Writes a generated region back and releases its claim.
    ///
    /// Chunks generated in the meantime are left alone. Liquid still to
    /// settle moves to the map's liquid queue. The generated hook runs last;
    /// its decoration nodes raise no events inside the region. Every chunk
    /// touched is added to `modified` and marked as not yet sent.
    pub fn finish_block_make(&mut self, data: BlockMakeData, modified: &mut ModifiedChunks) {
        let BlockMakeData {
            seed,
            blockpos_min,
            blockpos_max,
            vmanip,
            mut transforming_liquid,
            ..
        } = data;

        vmanip.blit_back(&mut self.chunks, false, modified);
        self.liquid.add_transforming_from(&mut transforming_liquid);

        for p in ChunkPos::iter_box(blockpos_min, blockpos_max) {
            if let Some(chunk) = self.chunks.get_mut(p) {
                chunk.set_generated(true);
                chunk.raise_modified(ModState::WriteNeeded, "finish_block_make");
                modified.insert(p);
            }
        }
        for p in ChunkPos::iter_box(blockpos_min.offset(-1, -1, -1), blockpos_max.offset(1, 1, 1)) {
            self.unpin(p);
        }
        self.regions_in_progress.remove(&blockpos_min);

        let min = blockpos_min.min_node();
        let max = blockpos_max.max_node();
        let mut placements: Vec<(NodePos, _)> = Vec::new();
        self.hooks.on_generated(min, max, seed, &mut placements);
        if !placements.is_empty() {
            let ctx = EditContext::suppressing(VoxelArea::new(min, max));
            for (pos, node) in placements {
                match self.add_node_with_event(&ctx, pos, node, true) {
                    Ok(touched) => modified.extend(touched),
                    Err(err) => debug!(?pos, %err, "dropped decoration node"),
                }
            }
        }

        for &p in modified.iter() {
            if let Some(chunk) = self.chunks.get_mut(p) {
                chunk.mark_sent_stale();
            }
        }
        info!(
            min = ?blockpos_min,
            max = ?blockpos_max,
            chunks = modified.len(),
            "region generated"
        );
    }
}
