//! The authoritative spatial index of the world.
//!
//! [`ServerMap`] owns every loaded [`Chunk`] by value inside a
//! [`ChunkTable`]; everything else refers to chunks by position. Chunks come
//! from memory, then from the [`ChunkStore`], then from the generator.

use std::collections::hash_map::Entry;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_config::Config;
use strata_light::{spread_light, update_lighting_nodes};
use strata_liquid::LiquidLogic;
use strata_mapgen::Mapgen;
use strata_voxel::{
    CHUNK_SIZE, Chunk, ChunkPos, ChunkTable, ContentId, ContentRegistry, EditContext,
    EventDispatcher, LightBank, LocalPos, MapEditEvent, MapEditKind, MapEventSink, ModState,
    ModifiedChunks, Node, NodeGrid, NodeMetadata, NodePos, NodeTimer, SER_FMT_VER_HIGHEST,
    SectorPos, VoxelArea, deserialize_chunk, serialize_chunk,
};
use tracing::{debug, error, info, warn};

use crate::error::MapError;
use crate::hooks::{MapHooks, NoHooks};
use crate::make::BlockMakeStatus;
use crate::sector::MapSector;
use crate::store::ChunkStore;
use crate::worker::{AsyncEmerge, is_emerge_worker};

/// Whether a chunk lies low enough that, with nothing known above it, it
/// gets no sunlight.
pub fn is_underground(pos: ChunkPos, water_level: i32) -> bool {
    i32::from(pos.y) * (CHUNK_SIZE + 1) <= water_level
}

/// Whether any coordinate of `pos` lies beyond `generation_limit` nodes.
pub fn chunk_over_limit(pos: ChunkPos, generation_limit: i32) -> bool {
    let limit = generation_limit / CHUNK_SIZE;
    [pos.x, pos.y, pos.z]
        .into_iter()
        .any(|c| i32::from(c).abs() > limit)
}

/// Spatial index of loaded chunks.
pub struct ServerMap {
    config: Arc<Config>,
    registry: Arc<ContentRegistry>,
    pub(crate) chunks: ChunkTable,
    sectors: FxHashMap<SectorPos, MapSector>,
    pub(crate) store: Box<dyn ChunkStore>,
    pub(crate) mapgen: Mapgen,
    pub(crate) liquid: LiquidLogic,
    pub(crate) hooks: Box<dyn MapHooks>,
    events: EventDispatcher,
    /// Minimum corners of regions a generator is working on.
    pub(crate) regions_in_progress: FxHashSet<ChunkPos>,
    async_emerge: Option<Arc<dyn AsyncEmerge>>,
}

impl ServerMap {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<ContentRegistry>,
        store: Box<dyn ChunkStore>,
        mapgen: Mapgen,
    ) -> Self {
        let liquid = LiquidLogic::from_config(&config.liquid);
        info!(
            seed = config.world.seed,
            generation_limit = config.world.generation_limit,
            region_chunks = config.world.region_chunks,
            "map ready"
        );
        Self {
            config,
            registry,
            chunks: ChunkTable::new(),
            sectors: FxHashMap::default(),
            store,
            mapgen,
            liquid,
            hooks: Box::new(NoHooks),
            events: EventDispatcher::new(),
            regions_in_progress: FxHashSet::default(),
            async_emerge: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ContentRegistry> {
        &self.registry
    }

    pub fn mapgen(&self) -> &Mapgen {
        &self.mapgen
    }

    pub fn liquid(&self) -> &LiquidLogic {
        &self.liquid
    }

    pub fn liquid_mut(&mut self) -> &mut LiquidLogic {
        &mut self.liquid
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn MapHooks>) {
        self.hooks = hooks;
    }

    pub fn add_event_sink(&mut self, sink: Box<dyn MapEventSink>) {
        self.events.add_sink(sink);
    }

    /// Installs the handle used to queue generation from emerge workers.
    pub fn set_async_emerge(&mut self, handle: Arc<dyn AsyncEmerge>) {
        self.async_emerge = Some(handle);
    }

    pub fn chunks(&self) -> &ChunkTable {
        &self.chunks
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn sector(&self, pos: SectorPos) -> Option<&MapSector> {
        self.sectors.get(&pos)
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Whether any coordinate of `pos` lies beyond the generation limit.
    pub fn is_over_generation_limit(&self, pos: ChunkPos) -> bool {
        chunk_over_limit(pos, self.config.world.generation_limit)
    }

    // -----------------------------------------------------------------------
    // Chunk lifetime
    // -----------------------------------------------------------------------

    fn insert_chunk(&mut self, chunk: Chunk) {
        let pos = chunk.pos();
        self.sectors
            .entry(pos.sector())
            .or_insert_with(|| MapSector::new(pos.sector()))
            .insert(pos.y);
        self.chunks.insert(chunk);
    }

    fn detach_chunk(&mut self, pos: ChunkPos) -> Option<Chunk> {
        let chunk = self.chunks.remove(pos)?;
        if let Entry::Occupied(mut sector) = self.sectors.entry(pos.sector()) {
            sector.get_mut().remove(pos.y);
            if sector.get().is_empty() {
                sector.remove();
            }
        }
        Some(chunk)
    }

    /// Chunk at `pos` if it is in memory. May be a dummy.
    pub fn get_chunk_if_loaded(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(pos)
    }

    /// Chunk at `pos` if it is in memory, restarting its unload timer.
    pub fn get_chunk_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        self.touch(pos)
    }

    /// Mutable access that counts as a use of the chunk.
    fn touch(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        let chunk = self.chunks.get_mut(pos)?;
        chunk.reset_usage_timer();
        Some(chunk)
    }

    /// Returns the chunk at `pos`, inserting a blank one if none is loaded.
    ///
    /// Blank chunks are filled with IGNORE and not generated.
    pub fn create_chunk(&mut self, pos: ChunkPos) -> Result<&mut Chunk, MapError> {
        if self.is_over_generation_limit(pos) {
            return Err(MapError::OutOfLimits(pos));
        }
        if !self.chunks.has_chunk(pos) {
            self.insert_chunk(Chunk::filled(pos, Node::IGNORE));
        }
        self.touch(pos).ok_or(MapError::ChunkNotLoaded(pos))
    }

    /// Returns the chunk at `pos`, reading it from the store if it is not in
    /// memory. `None` when the store has no usable record.
    pub fn load_chunk(&mut self, pos: ChunkPos) -> Result<Option<&mut Chunk>, MapError> {
        if self.chunks.has_chunk(pos) || self.load_from_store(pos)? {
            Ok(self.touch(pos))
        } else {
            Ok(None)
        }
    }

    /// Reads `pos` from the store into memory. Returns whether it was read.
    ///
    /// Store failures count as a missing record. Records that do not decode
    /// are fatal unless `storage.ignore_world_load_errors` is set.
    fn load_from_store(&mut self, pos: ChunkPos) -> Result<bool, MapError> {
        if self.is_over_generation_limit(pos) {
            return Ok(false);
        }
        let data = match self.store.load_chunk(pos) {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(false),
            Err(err) => {
                warn!(?pos, %err, "chunk store read failed, treating chunk as absent");
                return Ok(false);
            }
        };

        let chunk = match deserialize_chunk(pos, &data, &self.registry) {
            Ok(chunk) => chunk,
            Err(source) => {
                let err = MapError::from_load(pos, source);
                if self.config.storage.ignore_world_load_errors {
                    error!(?pos, %err, "ignoring unreadable chunk, it will be replaced");
                    return Ok(false);
                }
                error!(?pos, %err, "unreadable chunk in world storage");
                return Err(err);
            }
        };

        self.insert_chunk(chunk);
        self.liquid.scan_chunk(&self.chunks, &self.registry, pos);
        let mut modified = ModifiedChunks::new();
        self.fix_border_lighting(pos, &mut modified);
        for &relit in modified.iter() {
            if let Some(chunk) = self.chunks.get_mut(relit) {
                chunk.mark_sent_stale();
            }
        }
        debug!(?pos, relit = modified.len(), "loaded chunk");
        Ok(true)
    }

    /// Spreads light across the faces of a freshly loaded chunk in both
    /// directions.
    fn fix_border_lighting(&mut self, pos: ChunkPos, modified: &mut ModifiedChunks) {
        let inner = VoxelArea::of_chunk(pos);
        let outer = inner.pad(1);
        let on_shell = |p: NodePos| {
            p.x <= inner.min.x
                || p.x >= inner.max.x
                || p.y <= inner.min.y
                || p.y >= inner.max.y
                || p.z <= inner.min.z
                || p.z >= inner.max.z
        };
        let sources: Vec<NodePos> = outer.iter().filter(|&p| on_shell(p)).collect();
        for bank in LightBank::ALL {
            spread_light(
                &mut self.chunks,
                &self.registry,
                bank,
                sources.iter().copied(),
                modified,
            );
        }
    }

    /// Returns the chunk at `pos` from memory or the store, creating a blank
    /// chunk when `create_blank` is set and neither has it.
    pub fn emerge_chunk(
        &mut self,
        pos: ChunkPos,
        create_blank: bool,
    ) -> Result<Option<&mut Chunk>, MapError> {
        if self.is_over_generation_limit(pos) {
            return Ok(None);
        }
        if self.chunks.has_chunk(pos) || self.load_from_store(pos)? {
            return Ok(self.touch(pos));
        }
        if create_blank {
            return self.create_chunk(pos).map(Some);
        }
        Ok(None)
    }

    /// Returns a usable chunk at `pos`, loading or generating it.
    ///
    /// With `allow_generate`, a chunk that is not generated yet is generated
    /// on this thread. On an emerge worker the request is queued instead and
    /// `None` is returned. Coordinates beyond the generation limit yield
    /// `None` without touching the store.
    pub fn get_or_emerge_chunk(
        &mut self,
        pos: ChunkPos,
        allow_generate: bool,
    ) -> Result<Option<&mut Chunk>, MapError> {
        if self.is_over_generation_limit(pos) {
            return Ok(None);
        }
        let resident = self.chunks.has_chunk(pos) || self.load_from_store(pos)?;
        let generated = self.chunks.get(pos).is_some_and(Chunk::is_generated);
        if resident && (generated || !allow_generate) {
            return Ok(self.touch(pos));
        }
        if !allow_generate {
            return Ok(None);
        }

        if is_emerge_worker() {
            match &self.async_emerge {
                Some(handle) => {
                    if !handle.request_generate(pos) {
                        debug!(?pos, "generation request refused");
                    }
                }
                None => warn!(?pos, "no emerge handle installed, chunk not generated"),
            }
            return Ok(None);
        }

        self.generate_chunk(pos)?;
        Ok(self.touch(pos).filter(|c| c.is_generated()))
    }

    /// Generates the region containing `pos` on the calling thread.
    ///
    /// Returns whether the chunk is generated afterwards. Never waits: a
    /// region claimed by a worker yields `false`.
    pub fn generate_chunk(&mut self, pos: ChunkPos) -> Result<bool, MapError> {
        match self.init_block_make(pos)? {
            BlockMakeStatus::Ready(mut data) => {
                self.mapgen.make_chunk(&mut data, &self.registry);
                let mut modified = ModifiedChunks::new();
                self.finish_block_make(data, &mut modified);
                Ok(true)
            }
            BlockMakeStatus::AlreadyGenerated => Ok(true),
            BlockMakeStatus::Busy | BlockMakeStatus::OutOfLimits => Ok(false),
        }
    }

    /// Loaded chunks whose client copies are out of date, sorted. Clears
    /// the flag on each, so a chunk is reported once per change.
    pub fn take_sent_stale(&mut self) -> Vec<ChunkPos> {
        let mut stale = Vec::new();
        for (&pos, chunk) in self.chunks.iter_mut() {
            if chunk.is_sent_stale() && !chunk.is_dummy() {
                chunk.mark_sent();
                stale.push(pos);
            }
        }
        stale.sort_unstable();
        stale
    }

    pub fn pin(&mut self, pos: ChunkPos) -> bool {
        match self.chunks.get_mut(pos) {
            Some(chunk) => {
                chunk.pin();
                true
            }
            None => false,
        }
    }

    pub fn unpin(&mut self, pos: ChunkPos) -> bool {
        match self.chunks.get_mut(pos) {
            Some(chunk) => {
                chunk.unpin();
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Node at `pos`, or IGNORE when its chunk has no data in memory.
    pub fn get_node(&self, pos: NodePos) -> Node {
        self.chunks.node(pos)
    }

    /// Writes `node` as is: no relighting, no liquid updates, no events.
    pub fn set_node(&mut self, pos: NodePos, node: Node) -> Result<(), MapError> {
        if self.chunks.set_node(pos, node) {
            Ok(())
        } else {
            Err(MapError::NodeNotLoaded(pos))
        }
    }

    /// Places `node`, relights around it and queues nearby liquid.
    ///
    /// Returns the node that was replaced. Every chunk written, including
    /// chunks relit as a side effect, is added to `modified`.
    pub fn add_node_and_update(
        &mut self,
        pos: NodePos,
        node: Node,
        modified: &mut ModifiedChunks,
        remove_metadata: bool,
    ) -> Result<Node, MapError> {
        let cpos = pos.chunk();
        let local = pos.local();
        let chunk = self
            .chunks
            .get_mut(cpos)
            .filter(|c| !c.is_dummy())
            .ok_or(MapError::NodeNotLoaded(pos))?;
        chunk.reset_usage_timer();

        let old = chunk.get_node(local);
        if remove_metadata {
            let index = local.index() as u16;
            chunk.metadata.remove(index);
            chunk.timers.remove(index);
        }
        let mut placed = node;
        placed.clear_light();
        chunk.set_node(local, placed);
        modified.insert(cpos);

        update_lighting_nodes(&mut self.chunks, &self.registry, &[(pos, old)], modified);

        for p in std::iter::once(pos).chain(pos.neighbors()) {
            let n = self.chunks.node(p);
            if n.content == ContentId::AIR || self.registry.get(n.content).is_liquid() {
                self.liquid.add_transforming(p);
            }
        }
        Ok(old)
    }

    /// Replaces the node at `pos` with air. See [`Self::add_node_and_update`].
    pub fn remove_node_and_update(
        &mut self,
        pos: NodePos,
        modified: &mut ModifiedChunks,
    ) -> Result<Node, MapError> {
        self.add_node_and_update(pos, Node::AIR, modified, true)
    }

    /// Places `node` and reports the edit to the event sinks.
    ///
    /// Keeping metadata makes the edit a swap.
    pub fn add_node_with_event(
        &mut self,
        ctx: &EditContext,
        pos: NodePos,
        node: Node,
        remove_metadata: bool,
    ) -> Result<ModifiedChunks, MapError> {
        let kind = if remove_metadata {
            MapEditKind::AddNode
        } else {
            MapEditKind::SwapNode
        };
        self.edit_with_event(ctx, kind, pos, node, remove_metadata)
    }

    pub fn remove_node_with_event(
        &mut self,
        ctx: &EditContext,
        pos: NodePos,
    ) -> Result<ModifiedChunks, MapError> {
        self.edit_with_event(ctx, MapEditKind::RemoveNode, pos, Node::AIR, true)
    }

    /// Replaces the node at `pos` keeping its metadata and timers.
    pub fn swap_node(
        &mut self,
        ctx: &EditContext,
        pos: NodePos,
        node: Node,
    ) -> Result<ModifiedChunks, MapError> {
        self.add_node_with_event(ctx, pos, node, false)
    }

    fn edit_with_event(
        &mut self,
        ctx: &EditContext,
        kind: MapEditKind,
        pos: NodePos,
        node: Node,
        remove_metadata: bool,
    ) -> Result<ModifiedChunks, MapError> {
        let mut modified = ModifiedChunks::new();
        let old = self.add_node_and_update(pos, node, &mut modified, remove_metadata)?;
        self.events.dispatch(
            ctx,
            &MapEditEvent {
                kind,
                position: pos,
                old_node: Some(old),
                new_node: node,
                modified_chunks: modified.clone(),
            },
        );
        Ok(modified)
    }

    // -----------------------------------------------------------------------
    // Metadata and timers
    // -----------------------------------------------------------------------

    fn chunk_for_node(&mut self, pos: NodePos) -> Result<&mut Chunk, MapError> {
        self.emerge_chunk(pos.chunk(), false)?
            .ok_or(MapError::NodeNotLoaded(pos))
    }

    pub fn node_metadata(&self, pos: NodePos) -> Option<&NodeMetadata> {
        self.chunks
            .get(pos.chunk())?
            .metadata
            .get(pos.local().index() as u16)
    }

    /// Stores `meta` for the node at `pos`, loading its chunk if needed.
    pub fn set_node_metadata(
        &mut self,
        ctx: &EditContext,
        pos: NodePos,
        meta: NodeMetadata,
    ) -> Result<(), MapError> {
        let local = pos.local();
        let chunk = self.chunk_for_node(pos)?;
        chunk.metadata.set(local.index() as u16, meta);
        chunk.raise_modified(ModState::WriteNeeded, "set_node_metadata");
        let node = chunk.get_node(local);
        self.dispatch_metadata_changed(ctx, pos, node);
        Ok(())
    }

    pub fn remove_node_metadata(
        &mut self,
        ctx: &EditContext,
        pos: NodePos,
    ) -> Result<Option<NodeMetadata>, MapError> {
        let local = pos.local();
        let chunk = self.chunk_for_node(pos)?;
        let removed = chunk.metadata.remove(local.index() as u16);
        if removed.is_none() {
            return Ok(None);
        }
        chunk.raise_modified(ModState::WriteNeeded, "remove_node_metadata");
        let node = chunk.get_node(local);
        self.dispatch_metadata_changed(ctx, pos, node);
        Ok(removed)
    }

    fn dispatch_metadata_changed(&self, ctx: &EditContext, pos: NodePos, node: Node) {
        self.events.dispatch(
            ctx,
            &MapEditEvent {
                kind: MapEditKind::MetadataChanged,
                position: pos,
                old_node: Some(node),
                new_node: node,
                modified_chunks: ModifiedChunks::from([pos.chunk()]),
            },
        );
    }

    pub fn node_timer(&self, pos: NodePos) -> Option<NodeTimer> {
        self.chunks
            .get(pos.chunk())?
            .timers
            .get(pos.local().index() as u16)
    }

    pub fn set_node_timer(&mut self, pos: NodePos, timer: NodeTimer) -> Result<(), MapError> {
        let index = pos.local().index() as u16;
        let chunk = self.chunk_for_node(pos)?;
        chunk.timers.set(index, timer);
        chunk.raise_modified(ModState::WriteAtUnload, "set_node_timer");
        Ok(())
    }

    pub fn remove_node_timer(&mut self, pos: NodePos) -> Result<Option<NodeTimer>, MapError> {
        let index = pos.local().index() as u16;
        let chunk = self.chunk_for_node(pos)?;
        let removed = chunk.timers.remove(index);
        if removed.is_some() {
            chunk.raise_modified(ModState::WriteAtUnload, "remove_node_timer");
        }
        Ok(removed)
    }

    /// Advances the node timers of every loaded chunk by `dt` seconds and
    /// returns those that fired, ordered by position.
    pub fn step_node_timers(&mut self, dt: f32) -> Vec<(NodePos, NodeTimer)> {
        let mut fired = Vec::new();
        for (&cpos, chunk) in self.chunks.iter_mut() {
            for (index, timer) in chunk.step_timers(dt) {
                fired.push((cpos.node_at(LocalPos::from_index(usize::from(index))), timer));
            }
        }
        fired.sort_by_key(|(pos, _)| *pos);
        fired
    }

    // -----------------------------------------------------------------------
    // Persistence and eviction
    // -----------------------------------------------------------------------

    /// Writes the chunk at `pos` to the store and marks it clean.
    pub fn save_chunk(&mut self, pos: ChunkPos) -> Result<(), MapError> {
        let chunk = self.chunks.get(pos).ok_or(MapError::ChunkNotLoaded(pos))?;
        let data = serialize_chunk(chunk, &self.registry, SER_FMT_VER_HIGHEST)
            .map_err(|source| MapError::Serialize { pos, source })?;
        self.store.save_chunk(pos, &data)?;
        if let Some(chunk) = self.chunks.get_mut(pos) {
            chunk.reset_modified();
        }
        Ok(())
    }

    /// Saves every loaded chunk whose modification state is at least
    /// `level`, in one store batch. Returns how many were written.
    ///
    /// A chunk that fails to save is logged and skipped; the first such
    /// error is returned after the batch is committed.
    pub fn save(&mut self, level: ModState) -> Result<usize, MapError> {
        let mut dirty: Vec<ChunkPos> = self
            .chunks
            .iter()
            .filter(|(_, c)| !c.is_dummy() && c.mod_state() >= level)
            .map(|(&pos, _)| pos)
            .collect();
        if dirty.is_empty() {
            return Ok(0);
        }
        dirty.sort_unstable();

        self.store.begin_save()?;
        let mut saved = 0;
        let mut first_error = None;
        for pos in dirty {
            match self.save_chunk(pos) {
                Ok(()) => saved += 1,
                Err(err) => {
                    error!(?pos, %err, "failed to save chunk");
                    first_error.get_or_insert(err);
                }
            }
        }
        self.store.end_save()?;

        info!(saved, ?level, "saved chunks");
        match first_error {
            Some(err) => Err(err),
            None => Ok(saved),
        }
    }

    /// Ages loaded chunks by `dt` seconds and unloads idle ones. Returns how
    /// many were unloaded.
    ///
    /// Pinned chunks always stay. Without `max_loaded`, chunks idle for
    /// longer than `unload_timeout` are unloaded. With it, idle chunks are
    /// unloaded oldest first while more than `max_loaded` are in memory, in
    /// addition to those past the timeout. Modified chunks are saved first;
    /// one whose save fails stays loaded.
    pub fn timer_update(
        &mut self,
        dt: f32,
        unload_timeout: f32,
        max_loaded: Option<usize>,
    ) -> Result<usize, MapError> {
        for (_, chunk) in self.chunks.iter_mut() {
            chunk.increment_usage_timer(dt);
        }

        let mut candidates: Vec<(ChunkPos, f32)> = self
            .chunks
            .iter()
            .filter(|(_, c)| c.refcount() == 0)
            .map(|(&pos, c)| (pos, c.usage_timer()))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut remaining = self.chunks.len();
        let mut victims = Vec::new();
        for (pos, idle) in candidates {
            let over_limit = max_loaded.is_some_and(|max| remaining > max);
            if !over_limit && idle <= unload_timeout {
                break;
            }
            victims.push(pos);
            remaining -= 1;
        }
        if victims.is_empty() {
            return Ok(0);
        }

        let mut batch_open = false;
        let mut unloaded = 0;
        for pos in victims {
            let dirty = self
                .chunks
                .get(pos)
                .is_some_and(|c| !c.is_dummy() && c.mod_state() != ModState::Clean);
            if dirty {
                if !batch_open {
                    self.store.begin_save()?;
                    batch_open = true;
                }
                if let Err(err) = self.save_chunk(pos) {
                    warn!(?pos, %err, "keeping chunk loaded after failed save");
                    continue;
                }
            }
            self.detach_chunk(pos);
            unloaded += 1;
        }
        if batch_open {
            self.store.end_save()?;
        }

        debug!(unloaded, loaded = self.chunks.len(), "unloaded idle chunks");
        Ok(unloaded)
    }

    /// Unloads every unpinned chunk idle for longer than `timeout` seconds.
    pub fn unload_unused(&mut self, timeout: f32) -> Result<usize, MapError> {
        self.timer_update(0.0, timeout, None)
    }

    /// Removes `pos` from memory and from the store. Returns whether it
    /// existed in either.
    pub fn delete_chunk(&mut self, pos: ChunkPos) -> Result<bool, MapError> {
        let stored = self.store.delete_chunk(pos)?;
        let loaded = self.detach_chunk(pos).is_some();
        Ok(stored || loaded)
    }

    pub fn list_stored_chunks(&mut self) -> Result<Vec<ChunkPos>, MapError> {
        Ok(self.store.list_all()?)
    }

    // -----------------------------------------------------------------------
    // Liquids
    // -----------------------------------------------------------------------

    /// Runs one liquid settling pass over the loaded map. Returns the
    /// number of nodes changed; each change is reported as a liquid flow
    /// event.
    pub fn transform_liquids(
        &mut self,
        ctx: &EditContext,
        modified: &mut ModifiedChunks,
    ) -> usize {
        let hooks = &mut self.hooks;
        let mut on_flood =
            |pos: NodePos, old: Node, new: Node| -> bool { hooks.on_flood(pos, old, new) };
        let changes = self
            .liquid
            .settle(&mut self.chunks, &self.registry, &mut on_flood, modified);

        for change in &changes {
            self.events.dispatch(
                ctx,
                &MapEditEvent {
                    kind: MapEditKind::LiquidFlow,
                    position: change.pos,
                    old_node: Some(change.old),
                    new_node: change.new,
                    modified_chunks: ModifiedChunks::from([change.pos.chunk()]),
                },
            );
        }
        changes.len()
    }
}

impl std::fmt::Debug for ServerMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMap")
            .field("loaded_chunks", &self.chunks.len())
            .field("sectors", &self.sectors.len())
            .field("regions_in_progress", &self.regions_in_progress.len())
            .field("liquid_queue", &self.liquid.queue_len())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
