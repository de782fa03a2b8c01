//! Wiring of map, store and emerge pipeline, and the per-step upkeep run on
//! the primary thread.

use std::path::Path;
use std::sync::Arc;

use strata_config::Config;
use strata_emerge::{EmergeAction, EmergeFlags, EmergeManager, Environment, RequesterId};
use strata_map::{ServerMap, open_store};
use strata_mapgen::Mapgen;
use strata_voxel::{ChunkPos, EditContext, ModState, ModifiedChunks};
use tracing::{debug, error, info};

use crate::error::ServerError;
use crate::world::load_registry;

/// What one step did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub completions: usize,
    pub generated: usize,
    pub liquid_changes: usize,
    pub timers_fired: usize,
    /// Chunks changed since the previous step's resend pass.
    pub stale: usize,
    pub unloaded: usize,
    pub saved: usize,
}

pub struct Server {
    config: Arc<Config>,
    emerge: EmergeManager,
    liquid_timer: f32,
    save_timer: f32,
}

impl Server {
    /// Opens the world in `world_dir`. Workers are not started yet.
    pub fn open(config: Arc<Config>, world_dir: &Path) -> Result<Self, ServerError> {
        let registry = Arc::new(load_registry(world_dir)?);
        let store = open_store(&config.storage, world_dir)?;
        let mapgen = Mapgen::new(&config.world, &registry)?;
        let map = ServerMap::new(Arc::clone(&config), registry, store, mapgen);
        let emerge = EmergeManager::new(&config, Arc::new(Environment::new(map)));
        info!(world = %world_dir.display(), "world opened");
        Ok(Self {
            config,
            emerge,
            liquid_timer: 0.0,
            save_timer: 0.0,
        })
    }

    pub fn start(&mut self) -> Result<(), ServerError> {
        self.emerge.start_threads()?;
        Ok(())
    }

    pub fn emerge(&self) -> &EmergeManager {
        &self.emerge
    }

    /// Queues generation of every chunk within `radius` of `center`.
    /// Returns how many requests were accepted.
    pub fn emerge_area(&self, center: ChunkPos, radius: i16) -> usize {
        let radius = radius.max(0);
        let min = center.offset(-radius, -radius, -radius);
        let max = center.offset(radius, radius, radius);
        let flags = EmergeFlags::ALLOW_GENERATE | EmergeFlags::FORCE_QUEUE;
        let accepted = ChunkPos::iter_box(min, max)
            .filter(|&pos| {
                self.emerge
                    .enqueue(pos, RequesterId::SERVER, flags)
                    .is_accepted()
            })
            .count();
        info!(?center, radius, accepted, "queued startup area");
        accepted
    }

    /// One server step of `dt` seconds.
    ///
    /// Fails only on an unrecoverable world error reported by a worker.
    pub fn step(&mut self, dt: f32) -> Result<StepReport, ServerError> {
        if let Some(message) = self.emerge.fatal_error() {
            return Err(ServerError::Fatal(message));
        }

        let mut report = StepReport::default();
        let completions = self.emerge.drain_completions();
        report.completions = completions.len();
        report.generated = completions
            .iter()
            .filter(|c| c.action == EmergeAction::Generated)
            .count();

        let storage = &self.config.storage;
        let mut map = self.emerge.env().lock_map();

        self.liquid_timer += dt;
        let interval = self.config.liquid.update_interval_secs.max(f32::EPSILON);
        if self.liquid_timer >= interval {
            self.liquid_timer -= interval;
            let mut modified = ModifiedChunks::new();
            report.liquid_changes = map.transform_liquids(&EditContext::normal(), &mut modified);
        }

        let fired = map.step_node_timers(dt);
        report.timers_fired = fired.len();
        for (pos, timer) in &fired {
            debug!(?pos, timeout = timer.timeout, "node timer fired");
        }

        report.stale = map.take_sent_stale().len();

        let max_loaded = (storage.max_loaded_chunks > 0).then_some(storage.max_loaded_chunks);
        match map.timer_update(dt, storage.unload_timeout_secs, max_loaded) {
            Ok(unloaded) => report.unloaded = unloaded,
            Err(err) => error!(%err, "chunk unloading failed"),
        }

        self.save_timer += dt;
        if self.save_timer >= storage.save_interval_secs {
            self.save_timer = 0.0;
            match map.save(ModState::WriteNeeded) {
                Ok(saved) => report.saved = saved,
                Err(err) => error!(%err, "periodic save failed"),
            }
        }

        if report != StepReport::default() {
            debug!(?report, loaded = map.loaded_chunk_count(), "server step");
        }
        Ok(report)
    }

    /// Stops the workers and saves every modified chunk.
    pub fn shutdown(mut self) -> Result<(), ServerError> {
        self.emerge.stop_threads();
        let saved = self.emerge.env().lock_map().save(ModState::WriteAtUnload)?;
        info!(saved, "server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("emerge", &self.emerge)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use strata_config::{MapgenKind, StorageBackend};
    use strata_map::{SQLITE_FILE_NAME, SqliteStore};

    use super::*;

    fn test_config(edit: impl FnOnce(&mut Config)) -> Arc<Config> {
        let mut config = Config::default();
        config.world.mapgen = MapgenKind::Flat;
        config.world.region_chunks = 1;
        config.emerge.threads = 2;
        edit(&mut config);
        Arc::new(config)
    }

    fn run_until(server: &mut Server, mut done: impl FnMut(&StepReport, usize) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(60);
        let mut total = 0;
        loop {
            let report = server.step(0.1).unwrap();
            total += report.completions;
            if done(&report, total) {
                return;
            }
            assert!(Instant::now() < deadline, "server did not settle");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_startup_area_is_generated_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(|c| c.storage.unload_timeout_secs = 1.0e6);
        let mut server = Server::open(config, dir.path()).unwrap();
        server.start().unwrap();

        let queued = server.emerge_area(ChunkPos::new(0, 0, 0), 1);
        assert_eq!(queued, 27);
        run_until(&mut server, |_, total| total >= queued);
        {
            let map = server.emerge().env().lock_map();
            assert!(map.get_chunk_if_loaded(ChunkPos::new(1, 1, 1)).unwrap().is_generated());
        }
        server.shutdown().unwrap();

        assert!(dir.path().join(SQLITE_FILE_NAME).exists());
        let mut store = SqliteStore::open(dir.path()).unwrap();
        let stored = strata_map::ChunkStore::list_all(&mut store).unwrap();
        assert!(stored.contains(&ChunkPos::new(0, 0, 0)));
    }

    #[test]
    fn test_periodic_save_and_unload() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(|c| {
            c.storage.backend = StorageBackend::Memory;
            c.storage.save_interval_secs = 0.5;
            c.storage.unload_timeout_secs = 1.0;
        });
        let mut server = Server::open(config, dir.path()).unwrap();
        {
            let mut map = server.emerge().env().lock_map();
            map.get_or_emerge_chunk(ChunkPos::new(0, 0, 0), true)
                .unwrap()
                .unwrap();
        }

        let mut saved = 0;
        let mut unloaded = 0;
        let mut stale = 0;
        for _ in 0..15 {
            let report = server.step(0.1).unwrap();
            saved += report.saved;
            unloaded += report.unloaded;
            stale += report.stale;
        }
        assert!(stale >= 1);
        assert!(saved > 0);
        assert_eq!(unloaded, 27);
        assert_eq!(server.emerge().env().lock_map().loaded_chunk_count(), 0);
        assert!(!dir.path().join(SQLITE_FILE_NAME).exists());
    }

    #[test]
    fn test_fatal_worker_error_stops_step() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = SqliteStore::open(dir.path()).unwrap();
            strata_map::ChunkStore::save_chunk(
                &mut store,
                ChunkPos::new(0, 0, 0),
                &[strata_voxel::SER_FMT_VER_HIGHEST, 0],
            )
            .unwrap();
        }
        let config = test_config(|_| {});
        let mut server = Server::open(config, dir.path()).unwrap();
        server.start().unwrap();
        assert!(server
            .emerge()
            .enqueue(ChunkPos::new(0, 0, 0), RequesterId(1), EmergeFlags::ALLOW_GENERATE)
            .is_accepted());

        let deadline = Instant::now() + Duration::from_secs(60);
        loop {
            match server.step(0.1) {
                Err(ServerError::Fatal(message)) => {
                    assert!(message.contains("invalid data"));
                    break;
                }
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => {
                    assert!(Instant::now() < deadline, "fatal error never surfaced");
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
        }
    }
}
