use std::ops::{BitOr, BitOrAssign};

use strata_voxel::{ChunkPos, ModifiedChunks};

/// Options of an emerge request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EmergeFlags(u8);

impl EmergeFlags {
    pub const NONE: Self = Self(0);
    /// Generate the chunk if neither memory nor disk has it.
    pub const ALLOW_GENERATE: Self = Self(0x01);
    /// Bypass the queue limits.
    pub const FORCE_QUEUE: Self = Self(0x02);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for EmergeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EmergeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Who asked for a chunk. Each requester has its own queue quota.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequesterId(pub u16);

impl RequesterId {
    /// The server itself (active area upkeep, map callbacks). Limited to half
    /// of the total queue.
    pub const SERVER: Self = Self(0);
}

/// How a request ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EmergeAction {
    /// Not found and not generated, or dropped at shutdown.
    Cancelled,
    Errored,
    FromMemory,
    FromDisk,
    Generated,
}

/// Why [`crate::EmergeManager::enqueue`] refused a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The queue holds `queue_limit_total` requests.
    QueueFull,
    /// The requester used up its quota.
    RequesterQuota,
    /// The chunk lies beyond the generation limit.
    OutOfLimits,
    /// The workers have been stopped.
    Stopped,
}

/// Outcome of an enqueue.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueResult {
    /// A new request was queued.
    Queued,
    /// The chunk was queued already; the flags were merged into that request.
    Coalesced,
    Rejected(RejectReason),
}

impl EnqueueResult {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Called once on the worker thread when the request completes.
pub type EmergeCallback = Box<dyn FnOnce(ChunkPos, EmergeAction) + Send>;

/// Completion report delivered to the primary thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmergeCompletion {
    pub pos: ChunkPos,
    pub action: EmergeAction,
    /// Chunks written while serving the request.
    pub modified: ModifiedChunks,
}
