//! Persistent chunk storage.
//!
//! Chunk records are opaque byte strings keyed by
//! [`ChunkPos::storage_key`]. Writes between [`ChunkStore::begin_save`] and
//! [`ChunkStore::end_save`] form one batch; the SQLite backend commits the
//! batch as a single transaction.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use strata_config::{StorageBackend, StorageConfig};
use strata_voxel::ChunkPos;
use tracing::{debug, error, info};

use crate::error::StoreError;

/// File name of the SQLite database inside a world directory.
pub const SQLITE_FILE_NAME: &str = "map.sqlite";

/// Backend that persists serialized chunk records.
pub trait ChunkStore: Send {
    /// Opens a write batch. Nested calls are ignored.
    fn begin_save(&mut self) -> Result<(), StoreError>;

    /// Commits the open write batch, if any.
    fn end_save(&mut self) -> Result<(), StoreError>;

    fn save_chunk(&mut self, pos: ChunkPos, data: &[u8]) -> Result<(), StoreError>;

    /// Stored record of `pos`, or `None` if nothing was ever saved there.
    fn load_chunk(&mut self, pos: ChunkPos) -> Result<Option<Vec<u8>>, StoreError>;

    /// Deletes the record of `pos`. Returns whether one existed.
    fn delete_chunk(&mut self, pos: ChunkPos) -> Result<bool, StoreError>;

    /// Positions of every stored record.
    fn list_all(&mut self) -> Result<Vec<ChunkPos>, StoreError>;
}

/// Opens the backend selected by `config` for the world in `world_dir`.
pub fn open_store(
    config: &StorageConfig,
    world_dir: &Path,
) -> Result<Box<dyn ChunkStore>, StoreError> {
    match config.backend {
        StorageBackend::Sqlite => Ok(Box::new(SqliteStore::open(world_dir)?)),
        StorageBackend::Memory => Ok(Box::new(MemoryStore::new())),
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// Chunk store backed by a `blocks(pos INTEGER PRIMARY KEY, data BLOB)` table.
pub struct SqliteStore {
    conn: Connection,
    in_batch: bool,
}

impl SqliteStore {
    /// Opens (or creates) `map.sqlite` inside `world_dir`.
    pub fn open(world_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(world_dir).map_err(|source| StoreError::CreateDir {
            path: world_dir.to_path_buf(),
            source,
        })?;
        let path = world_dir.join(SQLITE_FILE_NAME);
        let conn = Connection::open(&path)?;
        info!(path = %path.display(), "opened chunk database");
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blocks (
                pos INTEGER PRIMARY KEY,
                data BLOB
            );",
        )?;
        Ok(Self {
            conn,
            in_batch: false,
        })
    }
}

impl ChunkStore for SqliteStore {
    fn begin_save(&mut self) -> Result<(), StoreError> {
        if !self.in_batch {
            self.conn.execute_batch("BEGIN;")?;
            self.in_batch = true;
        }
        Ok(())
    }

    fn end_save(&mut self) -> Result<(), StoreError> {
        if self.in_batch {
            self.in_batch = false;
            self.conn.execute_batch("COMMIT;")?;
        }
        Ok(())
    }

    fn save_chunk(&mut self, pos: ChunkPos, data: &[u8]) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR REPLACE INTO blocks (pos, data) VALUES (?1, ?2)")?;
        stmt.execute(params![pos.storage_key(), data])?;
        Ok(())
    }

    fn load_chunk(&mut self, pos: ChunkPos) -> Result<Option<Vec<u8>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data FROM blocks WHERE pos = ?1")?;
        let data = stmt
            .query_row([pos.storage_key()], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(data)
    }

    fn delete_chunk(&mut self, pos: ChunkPos) -> Result<bool, StoreError> {
        let mut stmt = self.conn.prepare_cached("DELETE FROM blocks WHERE pos = ?1")?;
        Ok(stmt.execute([pos.storage_key()])? > 0)
    }

    fn list_all(&mut self) -> Result<Vec<ChunkPos>, StoreError> {
        let mut stmt = self.conn.prepare_cached("SELECT pos FROM blocks")?;
        let keys = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut positions = Vec::new();
        for key in keys {
            positions.push(ChunkPos::from_storage_key(key?));
        }
        Ok(positions)
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Err(err) = self.end_save() {
            error!(%err, "failed to commit pending chunk writes");
        }
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("in_batch", &self.in_batch)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Chunk store that keeps records in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<i64, Vec<u8>>,
    batches: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of completed write batches.
    pub fn batches(&self) -> u64 {
        self.batches
    }
}

impl ChunkStore for MemoryStore {
    fn begin_save(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn end_save(&mut self) -> Result<(), StoreError> {
        self.batches += 1;
        debug!(records = self.records.len(), "memory store batch complete");
        Ok(())
    }

    fn save_chunk(&mut self, pos: ChunkPos, data: &[u8]) -> Result<(), StoreError> {
        self.records.insert(pos.storage_key(), data.to_vec());
        Ok(())
    }

    fn load_chunk(&mut self, pos: ChunkPos) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records.get(&pos.storage_key()).cloned())
    }

    fn delete_chunk(&mut self, pos: ChunkPos) -> Result<bool, StoreError> {
        Ok(self.records.remove(&pos.storage_key()).is_some())
    }

    fn list_all(&mut self) -> Result<Vec<ChunkPos>, StoreError> {
        Ok(self
            .records
            .keys()
            .map(|&key| ChunkPos::from_storage_key(key))
            .collect())
    }
}
