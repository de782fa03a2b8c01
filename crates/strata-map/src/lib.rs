//! The strata spatial index.
//!
//! [`ServerMap`] maps chunk coordinates to loaded chunks and brokers their
//! creation: a chunk missing from memory is read from the [`ChunkStore`],
//! and a chunk missing from both is generated. The map also applies node
//! edits with relighting and liquid updates, reports them to event sinks,
//! and saves and evicts chunks.

mod error;
mod hooks;
mod make;
mod map;
mod sector;
mod store;
mod worker;

pub use error::{MapError, StoreError};
pub use hooks::{
    CHooks, CNode, CNodePos, FloodCallback, GeneratedCallback, MapHooks, NoHooks, PlaceNodeFn,
};
pub use make::{BlockMakeStatus, containing_region};
pub use map::{ServerMap, chunk_over_limit, is_underground};
pub use sector::MapSector;
pub use store::{ChunkStore, MemoryStore, SQLITE_FILE_NAME, SqliteStore, open_store};
pub use worker::{AsyncEmerge, is_emerge_worker, mark_emerge_worker};

#[cfg(test)]
#[path = "map_tests.rs"]
mod tests;
