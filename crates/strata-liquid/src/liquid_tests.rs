//! Tests for liquid scanning, settling and queue purging.

use std::time::{Duration, Instant};

use strata_config::{IgnoredNeighborPolicy, LiquidConfig, LiquidLogicKind};
use strata_voxel::{
    CHUNK_SIZE, Chunk, ChunkPos, ChunkTable, ContentId, ContentRegistry, ModifiedChunks, Node,
    NodeGrid, NodePos, VoxelBuffer,
};

use crate::{ClassicLiquid, LiquidChange, LiquidLogic, UniqueQueue, scan_buffer, scan_chunk};

fn id(registry: &ContentRegistry, name: &str) -> ContentId {
    registry.id_of(name).unwrap()
}

/// Air chunks at y = 0 for every x/z chunk in `-radius..=radius`, with a
/// stone floor at node y = 0.
fn floor_world(registry: &ContentRegistry, radius: i16) -> ChunkTable {
    let stone = Node::new(id(registry, "stone"));
    let mut table = ChunkTable::new();
    for cz in -radius..=radius {
        for cx in -radius..=radius {
            table.insert(Chunk::new(ChunkPos::new(cx, 0, cz)));
        }
    }
    let lo = -i32::from(radius) * CHUNK_SIZE;
    let hi = (i32::from(radius) + 1) * CHUNK_SIZE;
    for z in lo..hi {
        for x in lo..hi {
            table.set_node(NodePos::new(x, 0, z), stone);
        }
    }
    table
}

fn classic() -> LiquidLogic {
    LiquidLogic::from_config(&LiquidConfig::default())
}

fn settle_once(
    logic: &mut LiquidLogic,
    table: &mut ChunkTable,
    registry: &ContentRegistry,
) -> Vec<LiquidChange> {
    let mut modified = ModifiedChunks::new();
    logic.settle(table, registry, &mut |_, _, _| false, &mut modified)
}

/// Settles until the queue drains, returning every change made.
fn settle_all(
    logic: &mut LiquidLogic,
    table: &mut ChunkTable,
    registry: &ContentRegistry,
    modified: &mut ModifiedChunks,
) -> Vec<LiquidChange> {
    let mut changes = Vec::new();
    for _ in 0..500 {
        if logic.queue_len() == 0 {
            break;
        }
        changes.extend(logic.settle(table, registry, &mut |_, _, _| false, modified));
    }
    assert_eq!(logic.queue_len(), 0, "liquid never settled");
    changes
}

fn level_at(table: &ChunkTable, registry: &ContentRegistry, p: NodePos) -> Option<u8> {
    let n = table.node(p);
    (n.content == id(registry, "water_flowing")).then(|| n.liquid_level())
}

#[test]
fn test_source_spreads_into_diamond() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 1);
    let src = NodePos::new(8, 1, 8);
    table.set_node(src, Node::new(id(&registry, "water_source")));

    let mut logic = classic();
    logic.add_transforming(src);
    let mut modified = ModifiedChunks::new();
    let changes = settle_all(&mut logic, &mut table, &registry, &mut modified);
    assert!(!changes.is_empty());

    assert_eq!(table.node(src).content, id(&registry, "water_source"));
    assert_eq!(level_at(&table, &registry, NodePos::new(9, 1, 8)), Some(7));
    assert_eq!(level_at(&table, &registry, NodePos::new(8, 1, 12)), Some(4));
    assert_eq!(level_at(&table, &registry, NodePos::new(10, 1, 10)), Some(4));
    // Range 8 reaches level 0 at distance 8 and nothing past it.
    assert_eq!(level_at(&table, &registry, NodePos::new(16, 1, 8)), Some(0));
    assert_eq!(level_at(&table, &registry, NodePos::new(0, 1, 8)), Some(0));
    assert_eq!(table.node(NodePos::new(17, 1, 8)).content, ContentId::AIR);
    assert_eq!(table.node(NodePos::new(-1, 1, 8)).content, ContentId::AIR);
    // Nothing climbs.
    assert_eq!(table.node(src.up()).content, ContentId::AIR);

    assert!(modified.contains(&ChunkPos::new(1, 0, 0)));
    assert!(changes.iter().all(|c| c.pos.chunk() != ChunkPos::new(-1, 0, 0)));
}

#[test]
fn test_settled_pool_is_idempotent() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 1);
    let src = NodePos::new(8, 1, 8);
    table.set_node(src, Node::new(id(&registry, "water_source")));

    let mut logic = classic();
    logic.add_transforming(src);
    let mut modified = ModifiedChunks::new();
    settle_all(&mut logic, &mut table, &registry, &mut modified);

    for z in -16..32 {
        for x in -16..32 {
            let p = NodePos::new(x, 1, z);
            if registry.get(table.node(p).content).is_liquid() {
                logic.add_transforming(p);
            }
        }
    }
    assert!(logic.queue_len() > 100);
    let again = settle_all(&mut logic, &mut table, &registry, &mut modified);
    assert!(again.is_empty(), "settled liquid changed: {again:?}");
}

#[test]
fn test_two_sources_renew_water() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 0);
    let source = Node::new(id(&registry, "water_source"));
    table.set_node(NodePos::new(5, 1, 8), source);
    table.set_node(NodePos::new(7, 1, 8), source);
    let between = NodePos::new(6, 1, 8);
    table.set_node(
        between,
        Node::with_params(id(&registry, "water_flowing"), 0, 3),
    );

    let mut logic = classic();
    logic.add_transforming(between);
    let changes = settle_once(&mut logic, &mut table, &registry);

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].pos, between);
    assert_eq!(table.node(between).content, id(&registry, "water_source"));
}

#[test]
fn test_lava_does_not_renew() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 0);
    let source = Node::new(id(&registry, "lava_source"));
    table.set_node(NodePos::new(5, 1, 8), source);
    table.set_node(NodePos::new(7, 1, 8), source);
    let between = NodePos::new(6, 1, 8);

    let mut logic = classic();
    logic.add_transforming(between);
    settle_once(&mut logic, &mut table, &registry);

    let n = table.node(between);
    assert_eq!(n.content, id(&registry, "lava_flowing"));
    assert_eq!(n.liquid_level(), 7);
}

#[test]
fn test_water_falls_with_flow_down_bit() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 0);
    let stone = Node::new(id(&registry, "stone"));
    // A ledge at y = 5 with a drop next to it.
    for x in 0..8 {
        table.set_node(NodePos::new(x, 4, 8), stone);
    }
    let src = NodePos::new(6, 5, 8);
    table.set_node(src, Node::new(id(&registry, "water_source")));

    let mut logic = classic();
    logic.add_transforming(src);
    let mut modified = ModifiedChunks::new();
    settle_all(&mut logic, &mut table, &registry, &mut modified);

    // Over the edge the flow turns downward.
    let edge = table.node(NodePos::new(8, 5, 8));
    assert_eq!(edge.content, id(&registry, "water_flowing"));
    assert!(edge.is_flowing_down());
    let falling = table.node(NodePos::new(8, 3, 8));
    assert_eq!(falling.content, id(&registry, "water_flowing"));
    // Water reaching the floor spreads from there.
    assert!(level_at(&table, &registry, NodePos::new(9, 1, 8)).is_some());
}

#[test]
fn test_on_flood_can_cancel() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 0);
    let torch = Node::new(id(&registry, "torch"));
    table.set_node(NodePos::new(8, 1, 8), Node::new(id(&registry, "water_source")));
    let p = NodePos::new(9, 1, 8);
    table.set_node(p, torch);

    let mut logic = classic();
    logic.add_transforming(p);
    let mut calls = Vec::new();
    let mut modified = ModifiedChunks::new();
    let changes = logic.settle(
        &mut table,
        &registry,
        &mut |pos, old, new| {
            calls.push((pos, old, new));
            true
        },
        &mut modified,
    );
    assert!(changes.is_empty());
    assert_eq!(table.node(p).content, torch.content);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, p);
    assert_eq!(calls[0].1.content, torch.content);
    assert_eq!(calls[0].2.content, id(&registry, "water_flowing"));

    logic.add_transforming(p);
    let changes = settle_once(&mut logic, &mut table, &registry);
    assert_eq!(changes.len(), 1);
    assert_eq!(level_at(&table, &registry, p), Some(7));
}

#[test]
fn test_unloaded_neighbor_policy() {
    let registry = ContentRegistry::with_basic_content();
    let flowing = Node::with_params(id(&registry, "water_flowing"), 0, 5);
    // x = -1 lies in a chunk that is not loaded.
    let p = NodePos::new(0, 1, 8);

    let mut table = floor_world(&registry, 0);
    table.set_node(p, flowing);
    let mut logic = classic();
    logic.add_transforming(p);
    let changes = settle_once(&mut logic, &mut table, &registry);
    assert!(changes.is_empty());
    assert_eq!(level_at(&table, &registry, p), Some(5));

    let mut table = floor_world(&registry, 0);
    table.set_node(p, flowing);
    let mut logic = LiquidLogic::from_config(&LiquidConfig {
        ignored_neighbors: IgnoredNeighborPolicy::TreatAsSolid,
        ..LiquidConfig::default()
    });
    logic.add_transforming(p);
    let changes = settle_once(&mut logic, &mut table, &registry);
    assert_eq!(changes.len(), 1);
    assert_eq!(table.node(p).content, ContentId::AIR);
}

#[test]
fn test_viscosity_slows_flow() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 0);
    table.set_node(
        NodePos::new(8, 1, 8),
        Node::with_params(id(&registry, "lava_flowing"), 0, 7),
    );
    let p = NodePos::new(9, 1, 8);

    let mut logic = ClassicLiquid::new(100, Duration::ZERO, IgnoredNeighborPolicy::Classic);
    logic.queue_mut().push_back(p);
    let mut modified = ModifiedChunks::new();
    logic.settle(&mut table, &registry, &mut |_, _, _| false, &mut modified);

    // Lava wants level 6 here but climbs one level per pass.
    let n = table.node(p);
    assert_eq!(n.content, id(&registry, "lava_flowing"));
    assert_eq!(n.liquid_level(), 0);
    assert!(logic.queue().contains(&p));
}

#[test]
fn test_pass_is_bounded_by_loop_max() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 0);
    let mut logic = ClassicLiquid::new(3, Duration::ZERO, IgnoredNeighborPolicy::Classic);
    for x in 0..10 {
        logic.queue_mut().push_back(NodePos::new(x, 5, 5));
    }
    let mut modified = ModifiedChunks::new();
    let changes = logic.settle(&mut table, &registry, &mut |_, _, _| false, &mut modified);
    assert!(changes.is_empty());
    assert_eq!(logic.queue().len(), 7);
}

#[test]
fn test_queue_purge_drops_oldest() {
    let mut logic = ClassicLiquid::new(2, Duration::from_secs(1), IgnoredNeighborPolicy::Classic);
    for x in 0..5 {
        logic.queue_mut().push_back(NodePos::new(x, 0, 0));
    }
    let t0 = Instant::now();
    logic.manage_queue(t0);
    assert_eq!(logic.queue().len(), 5);

    logic.queue_mut().push_back(NodePos::new(5, 0, 0));
    logic.manage_queue(t0 + Duration::from_secs(2));

    let remaining: Vec<_> = logic.queue().iter().map(|p| p.x).collect();
    assert_eq!(remaining, vec![4, 5]);
}

#[test]
fn test_queue_purge_waits_for_growth() {
    let mut logic = ClassicLiquid::new(2, Duration::from_secs(1), IgnoredNeighborPolicy::Classic);
    for x in 0..5 {
        logic.queue_mut().push_back(NodePos::new(x, 0, 0));
    }
    let t0 = Instant::now();
    logic.manage_queue(t0);
    // No growth since the last check resets the timer.
    logic.manage_queue(t0 + Duration::from_secs(5));
    assert_eq!(logic.queue().len(), 5);

    let mut disabled = ClassicLiquid::new(2, Duration::ZERO, IgnoredNeighborPolicy::Classic);
    for x in 0..5 {
        disabled.queue_mut().push_back(NodePos::new(x, 0, 0));
    }
    disabled.manage_queue(t0);
    disabled.queue_mut().push_back(NodePos::new(9, 0, 0));
    disabled.manage_queue(t0 + Duration::from_secs(60));
    assert_eq!(disabled.queue().len(), 6);
}

#[test]
fn test_static_logic_is_inert() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 0);
    let src = NodePos::new(8, 1, 8);
    table.set_node(src, Node::new(id(&registry, "water_source")));

    let mut logic = LiquidLogic::from_config(&LiquidConfig {
        logic: LiquidLogicKind::Static,
        ..LiquidConfig::default()
    });
    logic.add_transforming(src);
    logic.scan_chunk(&table, &registry, ChunkPos::new(0, 0, 0));
    assert_eq!(logic.queue_len(), 0);
    assert!(settle_once(&mut logic, &mut table, &registry).is_empty());
    assert_eq!(table.node(src.offset(1, 0, 0)).content, ContentId::AIR);
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

#[test]
fn test_scan_chunk_finds_open_liquid() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 0);
    let src = NodePos::new(8, 1, 8);
    table.set_node(src, Node::new(id(&registry, "water_source")));

    let mut queue = UniqueQueue::new();
    scan_chunk(&table, &registry, ChunkPos::new(0, 0, 0), &mut queue);
    assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![src]);
}

#[test]
fn test_scan_chunk_skips_enclosed_source() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 0);
    let stone = Node::new(id(&registry, "stone"));
    let src = NodePos::new(8, 1, 8);
    table.set_node(src, Node::new(id(&registry, "water_source")));
    for (dx, dz) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
        table.set_node(src.offset(dx, 0, dz), stone);
    }

    let mut queue = UniqueQueue::new();
    scan_chunk(&table, &registry, ChunkPos::new(0, 0, 0), &mut queue);
    assert!(queue.is_empty());
}

#[test]
fn test_scan_buffer_matches_chunk_scan() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = floor_world(&registry, 0);
    let src = NodePos::new(8, 1, 8);
    table.set_node(src, Node::new(id(&registry, "water_source")));

    let chunk = ChunkPos::new(0, 0, 0);
    let mut buf = VoxelBuffer::new();
    buf.emerge(chunk, chunk, &table);
    let mut queue = UniqueQueue::new();
    scan_buffer(&buf, chunk.min_node(), chunk.max_node(), &registry, &mut queue);
    assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![src]);

    let mut logic = classic();
    logic.scan_buffer(&buf, chunk.min_node(), chunk.max_node(), &registry);
    assert_eq!(logic.queue_len(), 1);
}
