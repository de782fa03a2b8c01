use std::path::PathBuf;

use strata_config::ConfigError;
use strata_emerge::EmergeError;
use strata_map::{MapError, StoreError};
use strata_mapgen::MapgenError;
use strata_voxel::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("no world directory given and the OS has no data directory")]
    NoWorldDir,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid content definitions: {0}")]
    Content(#[from] RegistryError),

    #[error(transparent)]
    Mapgen(#[from] MapgenError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Emerge(#[from] EmergeError),

    /// A worker hit world data it must not continue past.
    #[error("{0}")]
    Fatal(String),
}
