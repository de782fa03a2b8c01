//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// World shape and terrain generation.
    pub world: WorldConfig,
    /// Chunk persistence and eviction.
    pub storage: StorageConfig,
    /// Generation pipeline sizing.
    pub emerge: EmergeConfig,
    /// Liquid simulation.
    pub liquid: LiquidConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Which terrain painter fills freshly generated regions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MapgenKind {
    /// Level ground at a fixed height.
    Flat,
    /// Noise heightmap with water, sand beaches and trees.
    #[default]
    Heightmap,
}

/// World shape and terrain generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed for deterministic generation.
    pub seed: u64,
    /// Terrain painter selection.
    pub mapgen: MapgenKind,
    /// Absolute node coordinate beyond which nothing is loaded or generated.
    pub generation_limit: i32,
    /// Sea level in nodes. Also drives the "underground" chunk heuristic.
    pub water_level: i32,
    /// Side length, in chunks, of the region generated in one pass.
    pub region_chunks: u16,
    /// Ground height used by the flat painter.
    pub flat_ground_level: i32,
    /// Probability per surface column of placing a tree (heightmap painter).
    pub tree_density: f64,
}

/// Backend used for the persisted block store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageBackend {
    /// `map.sqlite` inside the world directory.
    #[default]
    Sqlite,
    /// Volatile in-process store; everything is lost on exit.
    Memory,
}

/// Chunk persistence and eviction settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Block store backend.
    pub backend: StorageBackend,
    /// Treat corrupt or version-mismatched chunks as absent instead of stopping.
    ///
    /// Regenerating over damaged data loses whatever it held, so this is off
    /// by default and logged at error level whenever it triggers.
    pub ignore_world_load_errors: bool,
    /// Seconds an unreferenced chunk may stay idle before it is unloaded.
    pub unload_timeout_secs: f32,
    /// Upper bound on resident chunks (0 = unbounded).
    pub max_loaded_chunks: usize,
    /// Seconds between periodic saves of modified chunks.
    pub save_interval_secs: f32,
}

/// Generation pipeline sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmergeConfig {
    /// Worker thread count (0 = one per available CPU).
    pub threads: usize,
    /// Maximum number of queued requests across all requesters.
    pub queue_limit_total: u32,
    /// Per-requester limit for disk-only requests (default: `threads * 5 + 1`).
    pub queue_limit_diskonly: Option<u32>,
    /// Per-requester limit for generating requests (default: `threads + 1`).
    pub queue_limit_generate: Option<u32>,
}

/// Liquid engine variant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LiquidLogicKind {
    /// Queue-driven flowing liquid with sources, levels and viscosity.
    #[default]
    Classic,
    /// Liquids stay exactly where they are placed.
    Static,
}

/// How the classic liquid transform treats neighbors that are not loaded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum IgnoredNeighborPolicy {
    /// Unloaded below blocks outward spread; unloaded elsewhere may hide a
    /// source, so the node keeps its level.
    #[default]
    Classic,
    /// Unloaded neighbors behave like any solid node.
    TreatAsSolid,
}

/// Liquid simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LiquidConfig {
    /// Liquid engine variant.
    pub logic: LiquidLogicKind,
    /// Maximum queue entries processed per settling pass.
    pub loop_max: u32,
    /// Seconds of continuous queue growth before the oldest entries are
    /// dropped (0 disables purging).
    pub queue_purge_time_secs: u16,
    /// Unloaded-neighbor policy for the classic transform.
    pub ignored_neighbors: IgnoredNeighborPolicy,
    /// Seconds between settling passes.
    pub update_interval_secs: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for the JSON log file. No file logging when unset.
    pub log_dir: Option<PathBuf>,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            mapgen: MapgenKind::default(),
            generation_limit: 31000,
            water_level: 1,
            region_chunks: 5,
            flat_ground_level: 8,
            tree_density: 0.004,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            ignore_world_load_errors: false,
            unload_timeout_secs: 29.0,
            max_loaded_chunks: 5000,
            save_interval_secs: 5.3,
        }
    }
}

impl Default for EmergeConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            queue_limit_total: 1024,
            queue_limit_diskonly: None,
            queue_limit_generate: None,
        }
    }
}

impl Default for LiquidConfig {
    fn default() -> Self {
        Self {
            logic: LiquidLogicKind::default(),
            loop_max: 100_000,
            queue_purge_time_secs: 0,
            ignored_neighbors: IgnoredNeighborPolicy::default(),
            update_interval_secs: 1.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

// --- Load / Save / Reload ---

/// File name of the config inside its directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let write_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ConfigError::Write { path, source }
        };
        std::fs::create_dir_all(config_dir).map_err(write_error(config_dir))?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized = ron::ser::to_string_pretty(self, pretty)?;

        std::fs::write(&config_path, serialized).map_err(write_error(&config_path))?;
        Ok(())
    }

    /// Re-read `config.ron`: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = read_config(&config_dir.join(CONFIG_FILE_NAME))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Rejects settings the map or the emerge pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(16..=31000).contains(&self.world.generation_limit) {
            return Err(ConfigError::Invalid {
                key: "world.generation_limit",
                reason: format!("{} is outside 16..=31000", self.world.generation_limit),
            });
        }
        if self.world.region_chunks == 0 || self.world.region_chunks > 10 {
            return Err(ConfigError::Invalid {
                key: "world.region_chunks",
                reason: format!("{} is outside 1..=10", self.world.region_chunks),
            });
        }
        if !(0.0..=1.0).contains(&self.world.tree_density) {
            return Err(ConfigError::Invalid {
                key: "world.tree_density",
                reason: format!("{} is not a probability", self.world.tree_density),
            });
        }
        if self.liquid.loop_max == 0 {
            return Err(ConfigError::Invalid {
                key: "liquid.loop_max",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
