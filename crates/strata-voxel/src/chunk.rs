//! A 16³ chunk of nodes plus its persistence and lifecycle state.

use crate::metadata::{NodeMetadataList, NodeTimer, NodeTimerList};
use crate::node::Node;
use crate::pos::{CHUNK_VOLUME, ChunkPos, LocalPos};

/// How urgently a chunk has to be written back to the store.
///
/// Ordered so that a chunk's state only ever rises until it is saved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModState {
    /// Matches what is stored.
    #[default]
    Clean,
    /// Save when the chunk is unloaded.
    WriteAtUnload,
    /// Save at the next periodic save.
    WriteNeeded,
}

/// A 16×16×16 block of nodes.
///
/// A chunk without a node array is a *dummy*: a placeholder for a position
/// whose data has not been produced yet. Reading a dummy yields
/// [`Node::IGNORE`].
#[derive(Clone, Debug)]
pub struct Chunk {
    pos: ChunkPos,
    nodes: Option<Box<[Node]>>,
    mod_state: ModState,
    mod_reason: Vec<&'static str>,
    generated: bool,
    underground: bool,
    lighting_expired: bool,
    sent_stale: bool,
    refcount: u32,
    usage_timer: f32,
    timestamp: Option<u32>,
    version: u64,
    /// Per-node metadata.
    pub metadata: NodeMetadataList,
    /// Per-node timers.
    pub timers: NodeTimerList,
}

impl Chunk {
    /// Creates a chunk filled with air. Not yet generated.
    pub fn new(pos: ChunkPos) -> Self {
        Self::filled(pos, Node::AIR)
    }

    /// Creates a chunk filled with `node`.
    pub fn filled(pos: ChunkPos, node: Node) -> Self {
        Self {
            nodes: Some(vec![node; CHUNK_VOLUME].into_boxed_slice()),
            ..Self::dummy(pos)
        }
    }

    /// Creates a dummy chunk (no node data).
    pub fn dummy(pos: ChunkPos) -> Self {
        Self {
            pos,
            nodes: None,
            mod_state: ModState::Clean,
            mod_reason: Vec::new(),
            generated: false,
            underground: false,
            lighting_expired: true,
            sent_stale: true,
            refcount: 0,
            usage_timer: 0.0,
            timestamp: None,
            version: 0,
            metadata: NodeMetadataList::new(),
            timers: NodeTimerList::new(),
        }
    }

    /// Builds a chunk around an existing node array of exactly
    /// [`CHUNK_VOLUME`] entries.
    pub fn from_nodes(pos: ChunkPos, nodes: Box<[Node]>) -> Option<Self> {
        if nodes.len() != CHUNK_VOLUME {
            return None;
        }
        Some(Self {
            nodes: Some(nodes),
            ..Self::dummy(pos)
        })
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn is_dummy(&self) -> bool {
        self.nodes.is_none()
    }

    /// Gives a dummy chunk an all-air node array.
    pub fn allocate(&mut self) {
        if self.nodes.is_none() {
            self.nodes = Some(vec![Node::AIR; CHUNK_VOLUME].into_boxed_slice());
        }
    }

    /// Node at `local`, or IGNORE for dummies.
    pub fn get_node(&self, local: LocalPos) -> Node {
        match &self.nodes {
            Some(nodes) => nodes[local.index()],
            None => Node::IGNORE,
        }
    }

    /// Writes a node and raises the chunk to [`ModState::WriteNeeded`].
    ///
    /// Returns `false` (and writes nothing) for dummies.
    pub fn set_node(&mut self, local: LocalPos, node: Node) -> bool {
        if !self.set_node_no_check(local, node) {
            return false;
        }
        self.raise_modified(ModState::WriteNeeded, "set_node");
        true
    }

    /// Writes a node without touching the modification state.
    pub fn set_node_no_check(&mut self, local: LocalPos, node: Node) -> bool {
        match &mut self.nodes {
            Some(nodes) => {
                nodes[local.index()] = node;
                true
            }
            None => false,
        }
    }

    /// Raw node array, `None` for dummies.
    pub fn nodes(&self) -> Option<&[Node]> {
        self.nodes.as_deref()
    }

    pub fn nodes_mut(&mut self) -> Option<&mut [Node]> {
        self.nodes.as_deref_mut()
    }

    // -- Modification tracking -------------------------------------------

    pub fn mod_state(&self) -> ModState {
        self.mod_state
    }

    /// Raises the modification state to at least `state`, recording why.
    /// Also marks the chunk stale for clients and bumps its version.
    pub fn raise_modified(&mut self, state: ModState, reason: &'static str) {
        if state > self.mod_state {
            self.mod_state = state;
        }
        if state > ModState::Clean && !self.mod_reason.contains(&reason) {
            self.mod_reason.push(reason);
        }
        self.sent_stale = true;
        self.version = self.version.wrapping_add(1);
    }

    /// Resets the state to clean after a successful save.
    pub fn reset_modified(&mut self) {
        self.mod_state = ModState::Clean;
        self.mod_reason.clear();
    }

    /// Reasons recorded since the last save, joined for logging.
    pub fn mod_reason_string(&self) -> String {
        self.mod_reason.join(", ")
    }

    /// Counter bumped on every modification.
    pub fn version(&self) -> u64 {
        self.version
    }

    // -- Flags -----------------------------------------------------------

    /// Whether the generator has finished this chunk.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn set_generated(&mut self, generated: bool) {
        if self.generated != generated {
            self.generated = generated;
            self.raise_modified(ModState::WriteNeeded, "set_generated");
        }
    }

    pub fn is_underground(&self) -> bool {
        self.underground
    }

    pub fn set_underground(&mut self, underground: bool) {
        if self.underground != underground {
            self.underground = underground;
            self.raise_modified(ModState::WriteNeeded, "set_underground");
        }
    }

    pub fn lighting_expired(&self) -> bool {
        self.lighting_expired
    }

    pub fn set_lighting_expired(&mut self, expired: bool) {
        if self.lighting_expired != expired {
            self.lighting_expired = expired;
            self.raise_modified(ModState::WriteNeeded, "set_lighting_expired");
        }
    }

    /// Whether clients hold an outdated copy.
    pub fn is_sent_stale(&self) -> bool {
        self.sent_stale
    }

    pub fn mark_sent(&mut self) {
        self.sent_stale = false;
    }

    pub fn mark_sent_stale(&mut self) {
        self.sent_stale = true;
    }

    /// Game time of the last save, if known.
    pub fn timestamp(&self) -> Option<u32> {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: Option<u32>) {
        self.timestamp = timestamp;
    }

    /// Sets the flags read from a stored record without dirtying the chunk.
    pub fn restore_flags(&mut self, generated: bool, underground: bool, lighting_expired: bool) {
        self.generated = generated;
        self.underground = underground;
        self.lighting_expired = lighting_expired;
    }

    /// Advances node timers, returning the expired ones. Dirties the chunk
    /// at unload when any timer is running.
    pub fn step_timers(&mut self, dt: f32) -> Vec<(u16, NodeTimer)> {
        if self.timers.is_empty() {
            return Vec::new();
        }
        let expired = self.timers.step(dt);
        self.raise_modified(ModState::WriteAtUnload, "node timers");
        expired
    }

    // -- Lifetime --------------------------------------------------------

    /// Prevents eviction until a matching [`Chunk::unpin`].
    pub fn pin(&mut self) {
        self.refcount += 1;
    }

    pub fn unpin(&mut self) {
        debug_assert!(self.refcount > 0, "unpin of unpinned chunk {:?}", self.pos);
        self.refcount = self.refcount.saturating_sub(1);
    }

    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    /// Seconds since the chunk was last used.
    pub fn usage_timer(&self) -> f32 {
        self.usage_timer
    }

    pub fn increment_usage_timer(&mut self, dt: f32) {
        self.usage_timer += dt;
    }

    pub fn reset_usage_timer(&mut self) {
        self.usage_timer = 0.0;
    }

    /// Whether the chunk may be evicted after `timeout` idle seconds.
    pub fn is_evictable(&self, timeout: f32) -> bool {
        self.refcount == 0 && self.usage_timer > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ContentId;

    #[test]
    fn test_new_chunk_is_air() {
        let chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        assert!(!chunk.is_dummy());
        assert!(!chunk.is_generated());
        assert_eq!(chunk.get_node(LocalPos::new(5, 5, 5)), Node::AIR);
        assert_eq!(chunk.mod_state(), ModState::Clean);
    }

    #[test]
    fn test_dummy_reads_ignore_and_rejects_writes() {
        let mut chunk = Chunk::dummy(ChunkPos::new(1, 2, 3));
        assert!(chunk.is_dummy());
        assert_eq!(chunk.get_node(LocalPos::new(0, 0, 0)), Node::IGNORE);
        assert!(!chunk.set_node(LocalPos::new(0, 0, 0), Node::AIR));
        assert_eq!(chunk.mod_state(), ModState::Clean);

        chunk.allocate();
        assert!(chunk.set_node(LocalPos::new(0, 0, 0), Node::new(ContentId(3))));
    }

    #[test]
    fn test_set_raises_write_needed() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        chunk.mark_sent();
        let before = chunk.version();
        chunk.set_node(LocalPos::new(1, 1, 1), Node::new(ContentId(3)));
        assert_eq!(chunk.mod_state(), ModState::WriteNeeded);
        assert!(chunk.is_sent_stale());
        assert!(chunk.version() > before);
        assert_eq!(chunk.mod_reason_string(), "set_node");
    }

    #[test]
    fn test_mod_state_never_lowers() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        chunk.raise_modified(ModState::WriteNeeded, "a");
        chunk.raise_modified(ModState::WriteAtUnload, "b");
        assert_eq!(chunk.mod_state(), ModState::WriteNeeded);
        chunk.reset_modified();
        assert_eq!(chunk.mod_state(), ModState::Clean);
        assert!(chunk.mod_reason_string().is_empty());
    }

    #[test]
    fn test_pinning_blocks_eviction() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        chunk.increment_usage_timer(10.0);
        chunk.pin();
        assert!(!chunk.is_evictable(5.0));
        chunk.unpin();
        assert!(chunk.is_evictable(5.0));
        chunk.reset_usage_timer();
        assert!(!chunk.is_evictable(5.0));
    }

    #[test]
    fn test_from_nodes_checks_length() {
        let short = vec![Node::AIR; 10].into_boxed_slice();
        assert!(Chunk::from_nodes(ChunkPos::new(0, 0, 0), short).is_none());
        let full = vec![Node::AIR; CHUNK_VOLUME].into_boxed_slice();
        assert!(Chunk::from_nodes(ChunkPos::new(0, 0, 0), full).is_some());
    }
}
