//! Map edit event stream.
//!
//! Every committed node change produces a [`MapEditEvent`] that the
//! [`EventDispatcher`] hands synchronously to each registered
//! [`MapEventSink`] (audit logs, replication). Delivery is best effort: a
//! sink that fails is logged and the edit stands.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::area::VoxelArea;
use crate::node::Node;
use crate::pos::NodePos;
use crate::table::ModifiedChunks;

/// What kind of edit produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapEditKind {
    /// A node was placed.
    AddNode,
    /// A node was replaced by air.
    RemoveNode,
    /// A node was replaced without place/dig side effects.
    SwapNode,
    /// Node metadata changed; the node itself did not.
    MetadataChanged,
    /// The liquid engine changed a node.
    LiquidFlow,
}

/// One committed edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapEditEvent {
    pub kind: MapEditKind,
    pub position: NodePos,
    /// Node before the edit, when known.
    pub old_node: Option<Node>,
    pub new_node: Node,
    /// Every chunk the edit touched, including chunks relit as a side effect.
    pub modified_chunks: ModifiedChunks,
}

/// Error reported by a sink that could not accept an event.
#[derive(Debug, thiserror::Error)]
#[error("event sink failed: {0}")]
pub struct SinkError(pub String);

/// Receiver of map edit events.
pub trait MapEventSink: Send {
    fn on_map_edit(&self, event: &MapEditEvent) -> Result<(), SinkError>;
}

/// Request-scoped event suppression.
///
/// Passed down to the code that performs a batch of edits instead of
/// toggling shared state on the map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditContext {
    /// Drop every event raised within this context.
    pub suppress_events: bool,
    /// Drop events whose position lies in this area.
    pub suppressed_area: Option<VoxelArea>,
}

impl EditContext {
    /// Context that delivers every event.
    pub fn normal() -> Self {
        Self::default()
    }

    /// Context that suppresses events inside `area`.
    pub fn suppressing(area: VoxelArea) -> Self {
        Self {
            suppress_events: false,
            suppressed_area: Some(area),
        }
    }

    /// Whether an event at `position` should be dropped.
    pub fn is_suppressed(&self, position: NodePos) -> bool {
        self.suppress_events
            || self
                .suppressed_area
                .is_some_and(|area| area.contains(position))
    }
}

/// Fans events out to all registered sinks.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn MapEventSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn MapEventSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Delivers `event` unless `ctx` suppresses it. Returns how many sinks
    /// accepted it.
    pub fn dispatch(&self, ctx: &EditContext, event: &MapEditEvent) -> usize {
        if ctx.is_suppressed(event.position) {
            return 0;
        }
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.on_map_edit(event) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(position = ?event.position, kind = ?event.kind, %err, "map edit sink failed"),
            }
        }
        delivered
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Sink that keeps every event in memory.
///
/// Clones share the same event list, so a clone can be registered with a
/// dispatcher while the original is used to read events back.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<MapEditEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<MapEditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns the events received so far.
    pub fn take(&self) -> Vec<MapEditEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MapEventSink for RecordingSink {
    fn on_map_edit(&self, event: &MapEditEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ContentId;
    use crate::pos::ChunkPos;

    struct FailingSink;

    impl MapEventSink for FailingSink {
        fn on_map_edit(&self, _event: &MapEditEvent) -> Result<(), SinkError> {
            Err(SinkError("disk full".to_string()))
        }
    }

    fn event_at(position: NodePos) -> MapEditEvent {
        MapEditEvent {
            kind: MapEditKind::AddNode,
            position,
            old_node: Some(Node::AIR),
            new_node: Node::new(ContentId(3)),
            modified_chunks: [position.chunk()].into_iter().collect(),
        }
    }

    #[test]
    fn test_dispatch_reaches_all_sinks() {
        let a = RecordingSink::new();
        let b = RecordingSink::new();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(a.clone()));
        dispatcher.add_sink(Box::new(b.clone()));

        let event = event_at(NodePos::new(1, 2, 3));
        assert_eq!(dispatcher.dispatch(&EditContext::normal(), &event), 2);
        assert_eq!(a.events(), vec![event.clone()]);
        assert_eq!(b.take(), vec![event]);
        assert!(b.is_empty());
    }

    #[test]
    fn test_failing_sink_does_not_block_others() {
        let recorder = RecordingSink::new();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(FailingSink));
        dispatcher.add_sink(Box::new(recorder.clone()));

        let delivered = dispatcher.dispatch(&EditContext::normal(), &event_at(NodePos::default()));
        assert_eq!(delivered, 1);
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_suppressed_area() {
        let recorder = RecordingSink::new();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(recorder.clone()));

        let ctx = EditContext::suppressing(VoxelArea::of_chunk(ChunkPos::new(0, 0, 0)));
        dispatcher.dispatch(&ctx, &event_at(NodePos::new(4, 4, 4)));
        dispatcher.dispatch(&ctx, &event_at(NodePos::new(40, 4, 4)));
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].position, NodePos::new(40, 4, 4));

        let silent = EditContext {
            suppress_events: true,
            suppressed_area: None,
        };
        assert_eq!(dispatcher.dispatch(&silent, &event_at(NodePos::new(40, 4, 4))), 0);
    }
}
