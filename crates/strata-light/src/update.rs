//! Relighting after individual node replacements.

use rustc_hash::{FxHashMap, FxHashSet};
use strata_voxel::{
    ContentRegistry, LIGHT_MAX, LightBank, ModifiedChunks, Node, NodeGrid, NodePos,
};

use crate::region::propagate_sunlight;
use crate::spread::{spread_light, unspread_light};

/// Restores consistent lighting after the nodes in `changes` were replaced.
///
/// Each entry is a position and the node that was there before. The new
/// nodes must already be written to `grid`. For every bank the old light is
/// unspread and the area is refilled from the surviving sources. On the sky
/// bank a node that now passes sunlight under an open sky reopens the column
/// below it, and a node that blocks it darkens the full-sun run underneath.
pub fn update_lighting_nodes<G: NodeGrid + ?Sized>(
    grid: &mut G,
    registry: &ContentRegistry,
    changes: &[(NodePos, Node)],
    modified: &mut ModifiedChunks,
) {
    for bank in LightBank::ALL {
        let mut from_nodes: FxHashMap<NodePos, u8> = FxHashMap::default();
        let mut light_sources: FxHashSet<NodePos> = FxHashSet::default();

        for &(pos, old_node) in changes {
            let mut node = grid.node(pos);
            if node.is_ignore() {
                continue;
            }
            let old_light = old_node.light(bank, registry.get(old_node.content));
            let features = registry.get(node.content);

            node.set_light(bank, 0);
            if grid.set_node(pos, node) {
                modified.insert(pos.chunk());
            }
            from_nodes
                .entry(pos)
                .and_modify(|l| *l = (*l).max(old_light))
                .or_insert(old_light);

            match bank {
                LightBank::Sky => {
                    let above = grid.node(pos.up());
                    let open = !above.is_ignore() && above.raw_light(LightBank::Sky) == LIGHT_MAX;
                    if open && features.sunlight_propagates {
                        propagate_sunlight(
                            grid,
                            registry,
                            pos,
                            i32::MIN,
                            &mut light_sources,
                            modified,
                        );
                    } else {
                        darken_sun_column(grid, pos.down(), &mut from_nodes, modified);
                    }
                }
                LightBank::Artificial => {
                    if features.light_source > 0 {
                        light_sources.insert(pos);
                    }
                }
            }
        }

        // Sunlit nodes reopened above must not be unspread again.
        for pos in &light_sources {
            from_nodes.remove(pos);
        }

        unspread_light(
            grid,
            registry,
            bank,
            from_nodes,
            &mut light_sources,
            modified,
        );
        spread_light(grid, registry, bank, light_sources, modified);
    }
}

/// Zeroes the run of full-sun nodes starting at `start` and going down,
/// queuing each for unspreading.
fn darken_sun_column<G: NodeGrid + ?Sized>(
    grid: &mut G,
    start: NodePos,
    from_nodes: &mut FxHashMap<NodePos, u8>,
    modified: &mut ModifiedChunks,
) {
    let mut pos = start;
    loop {
        let mut node = grid.node(pos);
        if node.is_ignore() || node.raw_light(LightBank::Sky) != LIGHT_MAX {
            break;
        }
        node.set_light(LightBank::Sky, 0);
        if !grid.set_node(pos, node) {
            break;
        }
        modified.insert(pos.chunk());
        from_nodes.insert(pos, LIGHT_MAX);
        pos = pos.down();
    }
}
