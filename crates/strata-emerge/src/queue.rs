//! The emerge queue: one entry per queued chunk, per-requester counters and
//! one FIFO backlog per worker thread.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use strata_config::EmergeConfig;
use strata_voxel::ChunkPos;

use crate::request::{EmergeCallback, EmergeFlags, RejectReason, RequesterId};

/// Upper bound for every queue limit.
pub const QUEUE_LIMIT_MAX: u32 = 1_000_000;

/// Worker count for `config`; `0` means one per available CPU.
pub fn resolve_thread_count(config: &EmergeConfig) -> usize {
    if config.threads == 0 {
        num_cpus::get().max(1)
    } else {
        config.threads
    }
}

/// Queue limits after defaults and clamping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueLimits {
    pub total: u32,
    pub diskonly: u32,
    pub generate: u32,
}

impl QueueLimits {
    pub fn from_config(config: &EmergeConfig, threads: usize) -> Self {
        let threads = u32::try_from(threads).unwrap_or(QUEUE_LIMIT_MAX);
        let clamp = |limit: u32| limit.clamp(1, QUEUE_LIMIT_MAX);
        Self {
            total: clamp(config.queue_limit_total),
            diskonly: clamp(
                config
                    .queue_limit_diskonly
                    .unwrap_or_else(|| threads.saturating_mul(5).saturating_add(1)),
            ),
            generate: clamp(
                config
                    .queue_limit_generate
                    .unwrap_or_else(|| threads.saturating_add(1)),
            ),
        }
    }
}

pub(crate) struct QueuedRequest {
    pub flags: EmergeFlags,
    pub requester: RequesterId,
    pub callbacks: Vec<EmergeCallback>,
}

pub(crate) enum Pushed {
    /// New entry, appended to the backlog of this worker.
    Queued(usize),
    Coalesced,
}

pub(crate) struct EmergeQueue {
    limits: QueueLimits,
    enqueued: FxHashMap<ChunkPos, QueuedRequest>,
    requester_counts: FxHashMap<RequesterId, u32>,
    backlogs: Vec<VecDeque<ChunkPos>>,
}

impl EmergeQueue {
    pub fn new(limits: QueueLimits, threads: usize) -> Self {
        Self {
            limits,
            enqueued: FxHashMap::default(),
            requester_counts: FxHashMap::default(),
            backlogs: (0..threads.max(1)).map(|_| VecDeque::new()).collect(),
        }
    }

    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    pub fn push(
        &mut self,
        pos: ChunkPos,
        requester: RequesterId,
        flags: EmergeFlags,
        callback: Option<EmergeCallback>,
    ) -> Result<Pushed, RejectReason> {
        let count = self.requester_counts.get(&requester).copied().unwrap_or(0);
        if !flags.contains(EmergeFlags::FORCE_QUEUE) {
            if self.enqueued.len() >= self.limits.total as usize {
                return Err(RejectReason::QueueFull);
            }
            if requester == RequesterId::SERVER {
                if count.saturating_mul(2) >= self.limits.total {
                    return Err(RejectReason::RequesterQuota);
                }
            } else {
                let quota = if flags.contains(EmergeFlags::ALLOW_GENERATE) {
                    self.limits.generate
                } else {
                    self.limits.diskonly
                };
                if count >= quota {
                    return Err(RejectReason::RequesterQuota);
                }
            }
        }

        if let Some(existing) = self.enqueued.get_mut(&pos) {
            existing.flags |= flags;
            existing.callbacks.extend(callback);
            return Ok(Pushed::Coalesced);
        }

        self.enqueued.insert(
            pos,
            QueuedRequest {
                flags,
                requester,
                callbacks: callback.into_iter().collect(),
            },
        );
        *self.requester_counts.entry(requester).or_insert(0) += 1;
        let thread = self.optimal_thread();
        self.backlogs[thread].push_back(pos);
        Ok(Pushed::Queued(thread))
    }

    /// Next request of `thread`'s backlog, removed from the queue.
    pub fn pop(&mut self, thread: usize) -> Option<(ChunkPos, QueuedRequest)> {
        while let Some(pos) = self.backlogs.get_mut(thread)?.pop_front() {
            if let Some(request) = self.remove_entry(pos) {
                return Some((pos, request));
            }
        }
        None
    }

    /// Empties `thread`'s backlog.
    pub fn take_backlog(&mut self, thread: usize) -> Vec<(ChunkPos, QueuedRequest)> {
        let mut taken = Vec::new();
        while let Some(next) = self.pop(thread) {
            taken.push(next);
        }
        taken
    }

    fn remove_entry(&mut self, pos: ChunkPos) -> Option<QueuedRequest> {
        let request = self.enqueued.remove(&pos)?;
        if let Some(count) = self.requester_counts.get_mut(&request.requester) {
            debug_assert!(*count > 0, "requester count underflow");
            *count = count.saturating_sub(1);
        }
        Some(request)
    }

    /// Worker with the shortest backlog; the lowest index wins ties.
    fn optimal_thread(&self) -> usize {
        self.backlogs
            .iter()
            .enumerate()
            .min_by_key(|(i, backlog)| (backlog.len(), *i))
            .map_or(0, |(i, _)| i)
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.enqueued.contains_key(&pos)
    }

    pub fn flags(&self, pos: ChunkPos) -> Option<EmergeFlags> {
        self.enqueued.get(&pos).map(|r| r.flags)
    }

    pub fn len(&self) -> usize {
        self.enqueued.len()
    }

    pub fn has_work(&self, thread: usize) -> bool {
        self.backlogs.get(thread).is_some_and(|b| !b.is_empty())
    }

    #[cfg(test)]
    pub fn backlog_len(&self, thread: usize) -> usize {
        self.backlogs[thread].len()
    }

    #[cfg(test)]
    pub fn requester_count(&self, requester: RequesterId) -> u32 {
        self.requester_counts.get(&requester).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::request::EmergeAction;

    const PLAYER: RequesterId = RequesterId(7);

    fn limits(total: u32, diskonly: u32, generate: u32) -> QueueLimits {
        QueueLimits {
            total,
            diskonly,
            generate,
        }
    }

    fn at(x: i16) -> ChunkPos {
        ChunkPos::new(x, 0, 0)
    }

    #[test]
    fn test_limits_default_from_threads() {
        let limits = QueueLimits::from_config(&EmergeConfig::default(), 4);
        assert_eq!(limits, QueueLimits {
            total: 1024,
            diskonly: 21,
            generate: 5,
        });
    }

    #[test]
    fn test_limits_are_clamped() {
        let config = EmergeConfig {
            queue_limit_total: 0,
            queue_limit_diskonly: Some(5_000_000),
            queue_limit_generate: Some(0),
            ..EmergeConfig::default()
        };
        let limits = QueueLimits::from_config(&config, 1);
        assert_eq!(limits.total, 1);
        assert_eq!(limits.diskonly, QUEUE_LIMIT_MAX);
        assert_eq!(limits.generate, 1);
    }

    #[test]
    fn test_explicit_thread_count_is_kept() {
        let config = EmergeConfig {
            threads: 3,
            ..EmergeConfig::default()
        };
        assert_eq!(resolve_thread_count(&config), 3);
        assert!(resolve_thread_count(&EmergeConfig::default()) >= 1);
    }

    #[test]
    fn test_disk_only_then_generate_coalesces() {
        let mut queue = EmergeQueue::new(limits(16, 4, 4), 2);
        assert!(matches!(
            queue.push(at(1), PLAYER, EmergeFlags::NONE, None),
            Ok(Pushed::Queued(0))
        ));
        assert!(matches!(
            queue.push(at(1), PLAYER, EmergeFlags::ALLOW_GENERATE, None),
            Ok(Pushed::Coalesced)
        ));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.requester_count(PLAYER), 1);
        assert_eq!(queue.flags(at(1)), Some(EmergeFlags::ALLOW_GENERATE));
        assert_eq!(queue.backlog_len(0) + queue.backlog_len(1), 1);
    }

    #[test]
    fn test_coalesced_callbacks_all_kept() {
        let mut queue = EmergeQueue::new(limits(16, 4, 4), 1);
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let callback: EmergeCallback = Box::new(move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
            queue
                .push(at(2), PLAYER, EmergeFlags::NONE, Some(callback))
                .ok();
        }
        let (pos, request) = queue.pop(0).unwrap();
        assert_eq!(pos, at(2));
        for callback in request.callbacks {
            callback(pos, EmergeAction::Cancelled);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.requester_count(PLAYER), 0);
    }

    #[test]
    fn test_requester_quota_depends_on_generation() {
        let mut queue = EmergeQueue::new(limits(100, 3, 1), 1);
        assert!(queue.push(at(0), PLAYER, EmergeFlags::ALLOW_GENERATE, None).is_ok());
        assert_eq!(
            queue
                .push(at(1), PLAYER, EmergeFlags::ALLOW_GENERATE, None)
                .err(),
            Some(RejectReason::RequesterQuota)
        );
        // Disk-only requests still fit the larger quota.
        assert!(queue.push(at(1), PLAYER, EmergeFlags::NONE, None).is_ok());
        assert!(queue.push(at(2), PLAYER, EmergeFlags::NONE, None).is_ok());
        assert_eq!(
            queue.push(at(3), PLAYER, EmergeFlags::NONE, None).err(),
            Some(RejectReason::RequesterQuota)
        );
        // Another requester has its own quota.
        assert!(queue.push(at(3), RequesterId(8), EmergeFlags::NONE, None).is_ok());
    }

    #[test]
    fn test_server_limited_to_half_the_queue() {
        let mut queue = EmergeQueue::new(limits(4, 100, 100), 1);
        let generate = EmergeFlags::ALLOW_GENERATE;
        assert!(queue.push(at(0), RequesterId::SERVER, generate, None).is_ok());
        assert!(queue.push(at(1), RequesterId::SERVER, generate, None).is_ok());
        assert_eq!(
            queue.push(at(2), RequesterId::SERVER, generate, None).err(),
            Some(RejectReason::RequesterQuota)
        );
    }

    #[test]
    fn test_total_limit_and_force_queue() {
        let mut queue = EmergeQueue::new(limits(2, 100, 100), 1);
        assert!(queue.push(at(0), PLAYER, EmergeFlags::NONE, None).is_ok());
        assert!(queue.push(at(1), RequesterId(9), EmergeFlags::NONE, None).is_ok());
        assert_eq!(
            queue.push(at(2), RequesterId(10), EmergeFlags::NONE, None).err(),
            Some(RejectReason::QueueFull)
        );
        assert!(queue
            .push(at(2), RequesterId(10), EmergeFlags::FORCE_QUEUE, None)
            .is_ok());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_requests_go_to_shortest_backlog() {
        let mut queue = EmergeQueue::new(limits(100, 100, 100), 3);
        for x in 0..3 {
            queue.push(at(x), PLAYER, EmergeFlags::NONE, None).ok();
        }
        assert_eq!(
            (queue.backlog_len(0), queue.backlog_len(1), queue.backlog_len(2)),
            (1, 1, 1)
        );

        queue.pop(1);
        assert!(matches!(
            queue.push(at(5), PLAYER, EmergeFlags::NONE, None),
            Ok(Pushed::Queued(1))
        ));
    }

    #[test]
    fn test_backlog_is_fifo() {
        let mut queue = EmergeQueue::new(limits(100, 100, 100), 1);
        for x in [4, 2, 9] {
            queue.push(at(x), PLAYER, EmergeFlags::NONE, None).ok();
        }
        assert!(queue.has_work(0));
        let order: Vec<_> = queue.take_backlog(0).into_iter().map(|(p, _)| p).collect();
        assert_eq!(order, [at(4), at(2), at(9)]);
        assert!(!queue.has_work(0));
        assert!(queue.pop(0).is_none());
    }
}
