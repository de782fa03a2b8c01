//! The binary entry point for the Strata world server.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use strata_config::{CliArgs, Config};
use strata_server::{Server, ServerError, TickLoop, resolve_world_dir};
use strata_voxel::ChunkPos;
use tracing::{error, info};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "server stopped with an error");
            eprintln!("strata-server: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<(), ServerError> {
    let world_dir = resolve_world_dir(args.world.as_deref())?;
    let config_dir = args.config.clone().unwrap_or_else(|| world_dir.clone());

    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(args);
    config.validate()?;
    strata_log::init_logging(&config.debug);
    info!(world = %world_dir.display(), config = %config_dir.display(), "starting");

    let mut server = Server::open(Arc::new(config), &world_dir)?;
    server.start()?;
    server.emerge_area(ChunkPos::new(0, 0, 0), args.radius);

    let mut tick_loop = TickLoop::new();
    while args.ticks == 0 || tick_loop.step_count() < args.ticks {
        if let Err(err) = tick_loop.tick(|dt| server.step(dt as f32).map(drop)) {
            // Save what is loaded before reporting the error.
            if let Err(save_err) = server.shutdown() {
                error!(%save_err, "final save failed");
            }
            return Err(err);
        }
        std::thread::sleep(tick_loop.time_to_next_step());
    }

    info!(steps = tick_loop.step_count(), uptime = tick_loop.uptime(), "shutting down");
    server.shutdown()
}
