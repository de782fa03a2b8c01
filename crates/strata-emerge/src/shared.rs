use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Sender;
use strata_map::{AsyncEmerge, chunk_over_limit};
use strata_voxel::{ChunkPos, ModifiedChunks};
use tracing::{debug, error};

use crate::queue::{EmergeQueue, Pushed, QueuedRequest};
use crate::request::{
    EmergeAction, EmergeCallback, EmergeCompletion, EmergeFlags, EnqueueResult, RejectReason,
    RequesterId,
};

/// State shared by the manager, its workers and the map's async handle.
///
/// Lock order: the map lock may be held while taking the queue lock, never
/// the other way round.
pub(crate) struct Shared {
    queue: Mutex<EmergeQueue>,
    /// One per worker, all paired with `queue`.
    signals: Vec<Condvar>,
    stopping: AtomicBool,
    completions: Sender<EmergeCompletion>,
    fatal: Mutex<Option<String>>,
    generation_limit: i32,
}

impl Shared {
    pub fn new(
        queue: EmergeQueue,
        threads: usize,
        completions: Sender<EmergeCompletion>,
        generation_limit: i32,
    ) -> Self {
        Self {
            queue: Mutex::new(queue),
            signals: (0..threads.max(1)).map(|_| Condvar::new()).collect(),
            stopping: AtomicBool::new(false),
            completions,
            fatal: Mutex::new(None),
            generation_limit,
        }
    }

    pub fn lock_queue(&self) -> MutexGuard<'_, EmergeQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(
        &self,
        pos: ChunkPos,
        requester: RequesterId,
        flags: EmergeFlags,
        callback: Option<EmergeCallback>,
    ) -> EnqueueResult {
        if chunk_over_limit(pos, self.generation_limit) {
            return EnqueueResult::Rejected(RejectReason::OutOfLimits);
        }
        let pushed = {
            let mut queue = self.lock_queue();
            if self.is_stopping() {
                return EnqueueResult::Rejected(RejectReason::Stopped);
            }
            queue.push(pos, requester, flags, callback)
        };
        match pushed {
            Ok(Pushed::Queued(thread)) => {
                self.signals[thread].notify_one();
                debug!(?pos, ?requester, thread, "queued emerge request");
                EnqueueResult::Queued
            }
            Ok(Pushed::Coalesced) => EnqueueResult::Coalesced,
            Err(reason) => EnqueueResult::Rejected(reason),
        }
    }

    /// Blocks until `thread` has a request or the workers are stopping.
    pub fn next_request(&self, thread: usize) -> Option<(ChunkPos, QueuedRequest)> {
        let mut queue = self.lock_queue();
        loop {
            if self.is_stopping() {
                return None;
            }
            if let Some(next) = queue.pop(thread) {
                return Some(next);
            }
            queue = self.signals[thread]
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stops the workers; they finish their current request first.
    pub fn request_stop(&self) {
        {
            let _queue = self.lock_queue();
            self.stopping.store(true, Ordering::Release);
        }
        for signal in &self.signals {
            signal.notify_all();
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Completes every request left in `thread`'s backlog as cancelled.
    pub fn cancel_backlog(&self, thread: usize) -> usize {
        let pending = self.lock_queue().take_backlog(thread);
        let cancelled = pending.len();
        for (pos, request) in pending {
            self.complete(
                pos,
                EmergeAction::Cancelled,
                request.callbacks,
                ModifiedChunks::new(),
            );
        }
        cancelled
    }

    /// Runs the callbacks of a finished request and reports it.
    pub fn complete(
        &self,
        pos: ChunkPos,
        action: EmergeAction,
        callbacks: Vec<EmergeCallback>,
        modified: ModifiedChunks,
    ) {
        for callback in callbacks {
            callback(pos, action);
        }
        // The manager may be gone during shutdown.
        let _ = self.completions.send(EmergeCompletion {
            pos,
            action,
            modified,
        });
    }

    /// Records the first unrecoverable error.
    pub fn set_fatal(&self, message: String) {
        error!("{message}");
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        fatal.get_or_insert(message);
    }

    pub fn fatal(&self) -> Option<String> {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// [`AsyncEmerge`] over the queue, installed on the map.
///
/// Holds only the queue state so the map does not keep the environment
/// alive.
pub(crate) struct QueueHandle {
    pub shared: std::sync::Arc<Shared>,
}

impl AsyncEmerge for QueueHandle {
    fn request_generate(&self, pos: ChunkPos) -> bool {
        self.shared
            .enqueue(pos, RequesterId::SERVER, EmergeFlags::ALLOW_GENERATE, None)
            .is_accepted()
    }
}
