use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, unbounded};
use strata_config::Config;
use strata_voxel::ChunkPos;
use tracing::{error, info};

use crate::env::Environment;
use crate::error::EmergeError;
use crate::queue::{EmergeQueue, QueueLimits, resolve_thread_count};
use crate::request::{EmergeAction, EmergeCompletion, EmergeFlags, EnqueueResult, RequesterId};
use crate::shared::{QueueHandle, Shared};
use crate::worker::EmergeWorker;

/// Owns the emerge queue and the worker pool.
///
/// Requests are accepted as soon as the manager exists; they are served once
/// [`start_threads`](Self::start_threads) has been called.
pub struct EmergeManager {
    env: Arc<Environment>,
    shared: Arc<Shared>,
    completions: Receiver<EmergeCompletion>,
    threads: usize,
    limits: QueueLimits,
    handles: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl EmergeManager {
    /// Sizes the queue from `config.emerge` and installs the queue as the
    /// map's async emerge handle.
    pub fn new(config: &Config, env: Arc<Environment>) -> Self {
        let threads = resolve_thread_count(&config.emerge);
        let limits = QueueLimits::from_config(&config.emerge, threads);
        let (sender, completions) = unbounded();
        let shared = Arc::new(Shared::new(
            EmergeQueue::new(limits, threads),
            threads,
            sender,
            config.world.generation_limit,
        ));
        env.lock_map().set_async_emerge(Arc::new(QueueHandle {
            shared: Arc::clone(&shared),
        }));
        info!(
            threads,
            total = limits.total,
            diskonly = limits.diskonly,
            generate = limits.generate,
            "emerge manager ready"
        );
        Self {
            env,
            shared,
            completions,
            threads,
            limits,
            handles: Vec::new(),
            stopped: false,
        }
    }

    pub fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    pub fn thread_count(&self) -> usize {
        self.threads
    }

    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Spawns the workers, named `emerge-0`, `emerge-1`, ...
    pub fn start_threads(&mut self) -> Result<(), EmergeError> {
        if self.stopped {
            return Err(EmergeError::Stopped);
        }
        if self.is_running() {
            return Ok(());
        }
        let (mapgen, registry) = {
            let map = self.env.lock_map();
            (map.mapgen().clone(), Arc::clone(map.registry()))
        };
        for id in 0..self.threads {
            let worker = EmergeWorker {
                id,
                shared: Arc::clone(&self.shared),
                env: Arc::clone(&self.env),
                mapgen: mapgen.clone(),
                registry: Arc::clone(&registry),
            };
            let handle = std::thread::Builder::new()
                .name(format!("emerge-{id}"))
                .spawn(move || worker.run())
                .map_err(|source| EmergeError::Spawn { id, source })?;
            self.handles.push(handle);
        }
        info!(threads = self.threads, "emerge threads started");
        Ok(())
    }

    /// Stops and joins the workers. Requests still queued complete as
    /// [`EmergeAction::Cancelled`]; later enqueues are rejected.
    pub fn stop_threads(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.shared.request_stop();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("emerge worker panicked");
            }
        }
        let cancelled: usize = (0..self.threads)
            .map(|id| self.shared.cancel_backlog(id))
            .sum();
        info!(cancelled, "emerge threads stopped");
    }

    /// Queues `pos` for `requester`. An already queued chunk takes on the
    /// new flags instead of being queued twice.
    pub fn enqueue(
        &self,
        pos: ChunkPos,
        requester: RequesterId,
        flags: EmergeFlags,
    ) -> EnqueueResult {
        self.shared.enqueue(pos, requester, flags, None)
    }

    /// Like [`enqueue`](Self::enqueue); `callback` runs on the worker once
    /// the request completes. A rejected request never calls it.
    pub fn enqueue_with_callback<F>(
        &self,
        pos: ChunkPos,
        requester: RequesterId,
        flags: EmergeFlags,
        callback: F,
    ) -> EnqueueResult
    where
        F: FnOnce(ChunkPos, EmergeAction) + Send + 'static,
    {
        self.shared
            .enqueue(pos, requester, flags, Some(Box::new(callback)))
    }

    pub fn is_queued(&self, pos: ChunkPos) -> bool {
        self.shared.lock_queue().contains(pos)
    }

    pub fn queued_flags(&self, pos: ChunkPos) -> Option<EmergeFlags> {
        self.shared.lock_queue().flags(pos)
    }

    /// Requests queued and not yet picked up by a worker.
    pub fn queue_len(&self) -> usize {
        self.shared.lock_queue().len()
    }

    /// Completions reported since the last call.
    pub fn drain_completions(&self) -> Vec<EmergeCompletion> {
        self.completions.try_iter().collect()
    }

    /// Description of the data error that stopped a worker, if any.
    pub fn fatal_error(&self) -> Option<String> {
        self.shared.fatal()
    }
}

impl Drop for EmergeManager {
    fn drop(&mut self) {
        self.stop_threads();
    }
}

impl std::fmt::Debug for EmergeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmergeManager")
            .field("threads", &self.threads)
            .field("limits", &self.limits)
            .field("running", &self.is_running())
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}
