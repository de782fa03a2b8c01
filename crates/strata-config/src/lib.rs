//! Configuration for the strata world server.
//!
//! Settings persist to disk as `config.ron` and are overridable from the
//! command line. The loaded [`Config`] is built once at startup and handed by
//! reference (usually behind an `Arc`) to the map and the emerge pipeline.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME, Config, DebugConfig, EmergeConfig, IgnoredNeighborPolicy, LiquidConfig,
    LiquidLogicKind, MapgenKind, StorageBackend, StorageConfig, WorldConfig,
};
pub use error::ConfigError;
