use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use strata_map::ServerMap;
use strata_voxel::ChunkPos;

/// The map shared between the primary thread and the emerge workers.
///
/// Whoever holds the lock owns every chunk. Workers release it while the
/// generator runs and notify `claims_released` once a region is finished.
pub struct Environment {
    map: Mutex<ServerMap>,
    claims_released: Condvar,
}

impl Environment {
    pub fn new(map: ServerMap) -> Self {
        Self {
            map: Mutex::new(map),
            claims_released: Condvar::new(),
        }
    }

    pub fn lock_map(&self) -> MutexGuard<'_, ServerMap> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until the region starting at `region_min` is no longer claimed.
    pub fn wait_for_claim<'a>(
        &'a self,
        map: MutexGuard<'a, ServerMap>,
        region_min: ChunkPos,
    ) -> MutexGuard<'a, ServerMap> {
        self.claims_released
            .wait_while(map, |map| map.is_region_in_progress(region_min))
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn notify_claims_released(&self) {
        self.claims_released.notify_all();
    }

    pub fn into_map(self) -> ServerMap {
        self.map.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment").finish_non_exhaustive()
    }
}
