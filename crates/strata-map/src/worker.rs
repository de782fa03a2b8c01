//! Marks emerge worker threads and the handle the map uses to queue
//! generation from them.

use std::cell::Cell;

use strata_voxel::ChunkPos;

thread_local! {
    static EMERGE_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as an emerge worker.
pub fn mark_emerge_worker() {
    EMERGE_WORKER.with(|w| w.set(true));
}

pub fn is_emerge_worker() -> bool {
    EMERGE_WORKER.with(Cell::get)
}

/// Queues generation without running it on the calling thread.
///
/// Installed on the map by the emerge pipeline so that code running on a
/// worker never generates inline while the worker holds the map.
pub trait AsyncEmerge: Send + Sync {
    /// Returns whether the request was accepted.
    fn request_generate(&self, pos: ChunkPos) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_flag_is_per_thread() {
        assert!(!is_emerge_worker());
        std::thread::spawn(|| {
            mark_emerge_worker();
            assert!(is_emerge_worker());
        })
        .join()
        .unwrap();
        assert!(!is_emerge_worker());
    }
}
