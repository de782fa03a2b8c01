//! The emerge worker loop.

use std::sync::Arc;

use strata_map::{BlockMakeStatus, MapError, mark_emerge_worker};
use strata_mapgen::Mapgen;
use strata_voxel::{ChunkPos, ContentRegistry, ModifiedChunks};
use tracing::{debug, info, warn};

use crate::env::Environment;
use crate::request::{EmergeAction, EmergeFlags};
use crate::shared::Shared;

pub(crate) struct EmergeWorker {
    pub id: usize,
    pub shared: Arc<Shared>,
    pub env: Arc<Environment>,
    pub mapgen: Mapgen,
    pub registry: Arc<ContentRegistry>,
}

impl EmergeWorker {
    pub fn run(self) {
        mark_emerge_worker();
        debug!(id = self.id, "emerge worker started");

        while let Some((pos, request)) = self.shared.next_request(self.id) {
            let allow_generate = request.flags.contains(EmergeFlags::ALLOW_GENERATE);
            let mut modified = ModifiedChunks::new();
            match self.emerge(pos, allow_generate, &mut modified) {
                Ok(action) => {
                    debug!(?pos, ?action, "emerge finished");
                    self.shared
                        .complete(pos, action, request.callbacks, modified);
                }
                Err(err) if err.is_fatal() => {
                    self.shared.set_fatal(fatal_message(pos, &err));
                    self.shared
                        .complete(pos, EmergeAction::Errored, request.callbacks, modified);
                    break;
                }
                Err(err) => {
                    warn!(?pos, %err, "emerge failed");
                    self.shared
                        .complete(pos, EmergeAction::Errored, request.callbacks, modified);
                }
            }
        }

        let cancelled = self.shared.cancel_backlog(self.id);
        info!(id = self.id, cancelled, "emerge worker stopped");
    }

    /// Serves one request. The map is locked to look the chunk up and to
    /// claim its region, and again to write the result back; generation
    /// itself runs unlocked.
    fn emerge(
        &self,
        pos: ChunkPos,
        allow_generate: bool,
        modified: &mut ModifiedChunks,
    ) -> Result<EmergeAction, MapError> {
        let mut data = {
            let mut map = self.env.lock_map();
            loop {
                let resident = map
                    .get_chunk_mut(pos)
                    .filter(|c| !c.is_dummy())
                    .map(|c| c.is_generated());
                match resident {
                    Some(true) => return Ok(EmergeAction::FromMemory),
                    Some(false) => {}
                    None => {
                        if map.load_chunk(pos)?.is_some_and(|c| c.is_generated()) {
                            return Ok(EmergeAction::FromDisk);
                        }
                    }
                }
                if !allow_generate {
                    return Ok(EmergeAction::Cancelled);
                }

                match map.init_block_make(pos)? {
                    BlockMakeStatus::Ready(data) => break data,
                    BlockMakeStatus::AlreadyGenerated => return Ok(EmergeAction::FromMemory),
                    BlockMakeStatus::OutOfLimits => return Ok(EmergeAction::Cancelled),
                    BlockMakeStatus::Busy => {
                        let (region_min, _) = map.region_of(pos);
                        debug!(?pos, ?region_min, "region claimed elsewhere, waiting");
                        map = self.env.wait_for_claim(map, region_min);
                    }
                }
            }
        };

        self.mapgen.make_chunk(&mut data, &self.registry);

        self.env.lock_map().finish_block_make(data, modified);
        self.env.notify_claims_released();
        modified.insert(pos);
        Ok(EmergeAction::Generated)
    }
}

fn fatal_message(pos: ChunkPos, err: &MapError) -> String {
    match err {
        MapError::VersionMismatch { .. } => format!(
            "world data version mismatch in chunk {pos:?}: {err}; \
             the world was probably saved by a newer version"
        ),
        _ => format!(
            "invalid data in chunk {pos:?}: {err}; \
             set storage.ignore_world_load_errors to skip such chunks"
        ),
    }
}
