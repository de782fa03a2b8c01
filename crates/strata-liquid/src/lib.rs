//! Liquid simulation for the strata world.
//!
//! Liquids settle through a queue of positions that may still need to
//! change. [`LiquidLogic`] selects the engine from configuration: the classic
//! transform with sources, levels and viscosity, or a static variant where
//! placed liquid never moves.

mod classic;
mod queue;
mod scan;

use std::time::Duration;

use strata_config::{LiquidConfig, LiquidLogicKind};
use strata_voxel::{
    ChunkPos, ContentRegistry, ModifiedChunks, Node, NodeGrid, NodePos, VoxelBuffer,
};

pub use classic::{ClassicLiquid, WATER_DROP_BOOST};
pub use queue::UniqueQueue;
pub use scan::{scan_buffer, scan_chunk};

/// One node rewritten by a settling pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiquidChange {
    pub pos: NodePos,
    pub old: Node,
    pub new: Node,
}

/// The active liquid engine.
#[derive(Debug)]
pub enum LiquidLogic {
    Classic(ClassicLiquid),
    /// Liquids never move; every operation is a no-op.
    Static,
}

impl LiquidLogic {
    pub fn from_config(config: &LiquidConfig) -> Self {
        match config.logic {
            LiquidLogicKind::Classic => Self::Classic(ClassicLiquid::new(
                config.loop_max,
                Duration::from_secs(u64::from(config.queue_purge_time_secs)),
                config.ignored_neighbors,
            )),
            LiquidLogicKind::Static => Self::Static,
        }
    }

    /// Queues `p` for settling.
    pub fn add_transforming(&mut self, p: NodePos) {
        if let Self::Classic(c) = self {
            c.queue_mut().push_back(p);
        }
    }

    /// Moves every position from `queue` into the settling queue.
    pub fn add_transforming_from(&mut self, queue: &mut UniqueQueue<NodePos>) {
        match self {
            Self::Classic(c) => c.queue_mut().append(queue),
            Self::Static => queue.clear(),
        }
    }

    /// Queues liquid in and around a newly loaded chunk that may still flow.
    pub fn scan_chunk<G: NodeGrid + ?Sized>(
        &mut self,
        grid: &G,
        registry: &ContentRegistry,
        pos: ChunkPos,
    ) {
        if let Self::Classic(c) = self {
            scan::scan_chunk(grid, registry, pos, c.queue_mut());
        }
    }

    /// Queues liquid inside a generated buffer that may still flow.
    pub fn scan_buffer(
        &mut self,
        buf: &VoxelBuffer,
        nmin: NodePos,
        nmax: NodePos,
        registry: &ContentRegistry,
    ) {
        if let Self::Classic(c) = self {
            scan::scan_buffer(buf, nmin, nmax, registry, c.queue_mut());
        }
    }

    /// Runs one settling pass. See [`ClassicLiquid::settle`].
    pub fn settle<G: NodeGrid + ?Sized>(
        &mut self,
        grid: &mut G,
        registry: &ContentRegistry,
        on_flood: &mut dyn FnMut(NodePos, Node, Node) -> bool,
        modified: &mut ModifiedChunks,
    ) -> Vec<LiquidChange> {
        match self {
            Self::Classic(c) => c.settle(grid, registry, on_flood, modified),
            Self::Static => Vec::new(),
        }
    }

    /// Number of positions waiting to settle.
    pub fn queue_len(&self) -> usize {
        match self {
            Self::Classic(c) => c.queue().len(),
            Self::Static => 0,
        }
    }
}

impl Default for LiquidLogic {
    fn default() -> Self {
        Self::from_config(&LiquidConfig::default())
    }
}

#[cfg(test)]
#[path = "liquid_tests.rs"]
mod tests;
