//! Command-line argument parsing for the strata server.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, MapgenKind};

/// strata server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "strata-server", about = "Voxel world storage and generation server")]
pub struct CliArgs {
    /// World directory holding `map.sqlite` (and `config.ron` unless --config is given).
    #[arg(long)]
    pub world: Option<PathBuf>,

    /// Path to config directory (overrides the world directory).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Emerge worker thread count (0 = one per CPU).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Terrain painter: flat or heightmap.
    #[arg(long, value_parser = parse_mapgen)]
    pub mapgen: Option<MapgenKind>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Radius, in chunks, of the area emerged around the origin at startup.
    #[arg(long, default_value_t = 2)]
    pub radius: i16,

    /// Number of server ticks to run before saving and exiting (0 = run forever).
    #[arg(long, default_value_t = 0)]
    pub ticks: u64,
}

fn parse_mapgen(s: &str) -> Result<MapgenKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "flat" => Ok(MapgenKind::Flat),
        "heightmap" => Ok(MapgenKind::Heightmap),
        other => Err(format!("unknown mapgen `{other}` (expected flat or heightmap)")),
    }
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(threads) = args.threads {
            self.emerge.threads = threads;
        }
        if let Some(mapgen) = args.mapgen {
            self.world.mapgen = mapgen;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
