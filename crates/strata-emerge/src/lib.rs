//! The strata generation pipeline.
//!
//! [`EmergeManager`] keeps a bounded queue of chunk requests and a fixed
//! pool of worker threads. Each worker serves its own FIFO backlog: it looks
//! the chunk up in memory, then on disk, and if allowed generates its region
//! with the map unlocked. Completions are reported through per-request
//! callbacks and a channel drained by the primary thread.

mod env;
mod error;
mod manager;
mod queue;
mod request;
mod shared;
mod worker;

pub use env::Environment;
pub use error::EmergeError;
pub use manager::EmergeManager;
pub use queue::{QUEUE_LIMIT_MAX, QueueLimits, resolve_thread_count};
pub use request::{
    EmergeAction, EmergeCallback, EmergeCompletion, EmergeFlags, EnqueueResult, RejectReason,
    RequesterId,
};

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
