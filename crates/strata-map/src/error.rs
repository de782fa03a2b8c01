use std::path::PathBuf;

use strata_voxel::{ChunkPos, NodePos, SerializationError};
use thiserror::Error;

/// Errors raised by a [`ChunkStore`](crate::ChunkStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to create world directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the spatial index.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("chunk {0:?} is beyond the generation limit")]
    OutOfLimits(ChunkPos),

    #[error("no chunk is loaded at {0:?}")]
    ChunkNotLoaded(ChunkPos),

    #[error("no node data is loaded at {0:?}")]
    NodeNotLoaded(NodePos),

    #[error("stored chunk {pos:?} was written in an unsupported format: {source}")]
    VersionMismatch {
        pos: ChunkPos,
        #[source]
        source: SerializationError,
    },

    #[error("stored chunk {pos:?} is corrupt: {source}")]
    Corrupt {
        pos: ChunkPos,
        #[source]
        source: SerializationError,
    },

    #[error("failed to serialize chunk {pos:?}: {source}")]
    Serialize {
        pos: ChunkPos,
        #[source]
        source: SerializationError,
    },

    #[error("chunk store: {0}")]
    Store(#[from] StoreError),
}

impl MapError {
    /// Classifies a failure to decode the stored record of `pos`.
    pub fn from_load(pos: ChunkPos, source: SerializationError) -> Self {
        if source.is_version_mismatch() {
            Self::VersionMismatch { pos, source }
        } else {
            Self::Corrupt { pos, source }
        }
    }

    /// Whether continuing would silently lose or damage world data.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::VersionMismatch { .. } | Self::Corrupt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_errors_are_classified() {
        let pos = ChunkPos::new(1, 2, 3);
        let err = MapError::from_load(pos, SerializationError::UnsupportedVersion(9));
        assert!(matches!(err, MapError::VersionMismatch { .. }));
        assert!(err.is_fatal());

        let err = MapError::from_load(pos, SerializationError::TrailingData(4));
        assert!(matches!(err, MapError::Corrupt { .. }));
        assert!(err.is_fatal());

        assert!(!MapError::OutOfLimits(pos).is_fatal());
    }
}
