//! Unit tests for light spreading, unspreading and relighting.

use rustc_hash::FxHashSet;
use strata_voxel::{
    Chunk, ChunkPos, ChunkTable, ContentRegistry, LIGHT_MAX, LightBank, ModifiedChunks, Node,
    NodeGrid, NodePos, VoxelArea,
};

use crate::{light_region, propagate_sunlight, spread_light, update_lighting_nodes};

const TUNNEL_Y: i32 = 8;
const TUNNEL_Z: i32 = 8;
const TUNNEL_LEN: i32 = 40;

fn node(registry: &ContentRegistry, name: &str) -> Node {
    Node::new(registry.id_of(name).unwrap())
}

fn tunnel_pos(x: i32) -> NodePos {
    NodePos::new(x, TUNNEL_Y, TUNNEL_Z)
}

/// Three chunks of stone along +x with a one-node air tunnel through them.
fn tunnel_world(registry: &ContentRegistry) -> ChunkTable {
    let stone = node(registry, "stone");
    let mut table = ChunkTable::new();
    for x in 0..3 {
        table.insert(Chunk::filled(ChunkPos::new(x, 0, 0), stone));
    }
    for x in 0..=TUNNEL_LEN {
        table.set_node(tunnel_pos(x), Node::AIR);
    }
    table
}

fn artificial(table: &ChunkTable, x: i32) -> u8 {
    table.node(tunnel_pos(x)).raw_light(LightBank::Artificial)
}

fn sky(table: &ChunkTable, p: NodePos) -> u8 {
    table.node(p).raw_light(LightBank::Sky)
}

fn place_torch(table: &mut ChunkTable, registry: &ContentRegistry, x: i32) -> NodePos {
    let p = tunnel_pos(x);
    table.set_node(p, node(registry, "torch"));
    p
}

#[test]
fn test_light_falls_off_one_level_per_node() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = tunnel_world(&registry);
    let torch = place_torch(&mut table, &registry, 0);

    let mut modified = ModifiedChunks::new();
    spread_light(&mut table, &registry, LightBank::Artificial, [torch], &mut modified);

    for x in 1..=TUNNEL_LEN {
        let expected = (14 - x).max(0) as u8;
        assert_eq!(artificial(&table, x), expected, "x = {x}");
    }
    // Light dies out at x = 14, before reaching the second chunk.
    assert!(modified.contains(&ChunkPos::new(0, 0, 0)));
    assert!(!modified.contains(&ChunkPos::new(1, 0, 0)));
}

#[test]
fn test_light_stops_at_opaque_node() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = tunnel_world(&registry);
    let torch = place_torch(&mut table, &registry, 0);
    table.set_node(tunnel_pos(6), node(&registry, "stone"));

    let mut modified = ModifiedChunks::new();
    spread_light(&mut table, &registry, LightBank::Artificial, [torch], &mut modified);

    for x in 1..6 {
        assert_eq!(artificial(&table, x), (14 - x) as u8);
    }
    for x in 6..=TUNNEL_LEN {
        assert_eq!(artificial(&table, x), 0, "x = {x}");
    }
}

#[test]
fn test_spread_is_order_independent() {
    let registry = ContentRegistry::with_basic_content();

    let mut together = tunnel_world(&registry);
    let a = place_torch(&mut together, &registry, 0);
    let b = place_torch(&mut together, &registry, 10);
    let mut modified = ModifiedChunks::new();
    spread_light(&mut together, &registry, LightBank::Artificial, [a, b], &mut modified);

    let mut b_first = tunnel_world(&registry);
    place_torch(&mut b_first, &registry, 0);
    place_torch(&mut b_first, &registry, 10);
    spread_light(&mut b_first, &registry, LightBank::Artificial, [b], &mut modified);
    spread_light(&mut b_first, &registry, LightBank::Artificial, [a], &mut modified);

    let mut a_first = tunnel_world(&registry);
    place_torch(&mut a_first, &registry, 0);
    place_torch(&mut a_first, &registry, 10);
    spread_light(&mut a_first, &registry, LightBank::Artificial, [a], &mut modified);
    spread_light(&mut a_first, &registry, LightBank::Artificial, [b], &mut modified);

    for x in 0..=TUNNEL_LEN {
        let expected = if x == 0 || x == 10 {
            0
        } else {
            (14 - x).max(14 - (x - 10).abs()).max(0) as u8
        };
        assert_eq!(artificial(&together, x), expected, "x = {x}");
        assert_eq!(artificial(&b_first, x), expected, "x = {x}");
        assert_eq!(artificial(&a_first, x), expected, "x = {x}");
    }
}

#[test]
fn test_removing_emitter_matches_fresh_lighting() {
    let registry = ContentRegistry::with_basic_content();

    let mut edited = tunnel_world(&registry);
    let a = place_torch(&mut edited, &registry, 0);
    let b = place_torch(&mut edited, &registry, 10);
    let mut modified = ModifiedChunks::new();
    spread_light(&mut edited, &registry, LightBank::Artificial, [a, b], &mut modified);

    let old = edited.node(b);
    edited.set_node(b, Node::AIR);
    update_lighting_nodes(&mut edited, &registry, &[(b, old)], &mut modified);

    let mut fresh = tunnel_world(&registry);
    let only = place_torch(&mut fresh, &registry, 0);
    spread_light(&mut fresh, &registry, LightBank::Artificial, [only], &mut modified);

    for x in 0..=TUNNEL_LEN {
        assert_eq!(artificial(&edited, x), artificial(&fresh, x), "x = {x}");
    }
}

#[test]
fn test_placing_emitter_lights_tunnel() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = tunnel_world(&registry);
    let p = tunnel_pos(20);
    let old = table.node(p);
    table.set_node(p, node(&registry, "torch"));

    let mut modified = ModifiedChunks::new();
    update_lighting_nodes(&mut table, &registry, &[(p, old)], &mut modified);

    assert_eq!(artificial(&table, 19), 13);
    assert_eq!(artificial(&table, 21), 13);
    assert_eq!(artificial(&table, 33), 1);
    assert_eq!(artificial(&table, 34), 0);
    assert!(modified.contains(&ChunkPos::new(2, 0, 0)));
}

// ---------------------------------------------------------------------------
// Sky light
// ---------------------------------------------------------------------------

fn open_air_chunk() -> ChunkTable {
    let mut table = ChunkTable::new();
    table.insert(Chunk::new(ChunkPos::new(0, 0, 0)));
    table
}

#[test]
fn test_region_open_to_sky_is_fully_lit() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = open_air_chunk();
    let area = VoxelArea::of_chunk(ChunkPos::new(0, 0, 0));

    let mut modified = ModifiedChunks::new();
    light_region(&mut table, &registry, area, true, &mut modified);
    for p in area.iter() {
        assert_eq!(sky(&table, p), LIGHT_MAX);
    }

    light_region(&mut table, &registry, area, false, &mut modified);
    for p in area.iter() {
        assert_eq!(sky(&table, p), 0);
    }
}

#[test]
fn test_region_under_full_slab_is_dark() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = open_air_chunk();
    let stone = node(&registry, "stone");
    for z in 0..16 {
        for x in 0..16 {
            table.set_node(NodePos::new(x, 10, z), stone);
        }
    }
    let torch = NodePos::new(4, 2, 4);
    table.set_node(torch, node(&registry, "torch"));

    let area = VoxelArea::of_chunk(ChunkPos::new(0, 0, 0));
    let mut modified = ModifiedChunks::new();
    light_region(&mut table, &registry, area, true, &mut modified);

    assert_eq!(sky(&table, NodePos::new(3, 11, 3)), LIGHT_MAX);
    assert_eq!(sky(&table, NodePos::new(3, 9, 3)), 0);
    assert_eq!(sky(&table, NodePos::new(3, 0, 3)), 0);
    assert_eq!(
        table.node(torch.offset(1, 0, 0)).raw_light(LightBank::Artificial),
        13
    );
    assert_eq!(
        table
            .node(NodePos::new(4, 11, 4))
            .raw_light(LightBank::Artificial),
        0
    );
}

#[test]
fn test_sunlight_run_stops_at_opaque() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = open_air_chunk();
    table.set_node(NodePos::new(0, 5, 0), node(&registry, "dirt"));

    let mut lit = FxHashSet::default();
    let mut modified = ModifiedChunks::new();
    let run = propagate_sunlight(
        &mut table,
        &registry,
        NodePos::new(0, 15, 0),
        0,
        &mut lit,
        &mut modified,
    );
    assert!(!run.reached_bottom);
    assert_eq!(run.lowest_lit, Some(NodePos::new(0, 6, 0)));
    assert_eq!(lit.len(), 10);

    let run = propagate_sunlight(
        &mut table,
        &registry,
        NodePos::new(1, 15, 1),
        0,
        &mut lit,
        &mut modified,
    );
    assert!(run.reached_bottom);
    assert_eq!(run.lowest_lit, Some(NodePos::new(1, 0, 1)));
}

#[test]
fn test_block_shadows_and_reopens_column() {
    let registry = ContentRegistry::with_basic_content();
    let mut table = open_air_chunk();
    let area = VoxelArea::of_chunk(ChunkPos::new(0, 0, 0));
    let mut modified = ModifiedChunks::new();
    light_region(&mut table, &registry, area, true, &mut modified);

    let p = NodePos::new(8, 10, 8);
    let old = table.node(p);
    table.set_node(p, node(&registry, "stone"));
    update_lighting_nodes(&mut table, &registry, &[(p, old)], &mut modified);

    assert_eq!(sky(&table, p.up()), LIGHT_MAX);
    assert_eq!(sky(&table, p), 0);
    assert_eq!(sky(&table, p.down()), LIGHT_MAX - 1);
    assert_eq!(sky(&table, NodePos::new(8, 0, 8)), LIGHT_MAX - 1);
    assert_eq!(sky(&table, NodePos::new(9, 5, 8)), LIGHT_MAX);

    let old = table.node(p);
    table.set_node(p, Node::AIR);
    update_lighting_nodes(&mut table, &registry, &[(p, old)], &mut modified);

    for y in 0..16 {
        assert_eq!(sky(&table, NodePos::new(8, y, 8)), LIGHT_MAX, "y = {y}");
    }
}
