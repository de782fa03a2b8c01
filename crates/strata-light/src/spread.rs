//! Breadth-first light spreading and its inverse.

use rustc_hash::{FxHashMap, FxHashSet};
use strata_voxel::{
    ContentRegistry, LightBank, ModifiedChunks, NodeGrid, NodePos, diminish_light,
    undiminish_light,
};
use tracing::trace;

/// Spreads light outward from `sources` until nothing changes.
///
/// Each wave raises every light-propagating neighbour that is dimmer than the
/// diminished source level. Neighbours brighter than the undiminished source
/// level join the next wave as well, since they are sources in their own
/// right. Processing whole waves makes the result independent of visit order.
pub fn spread_light<G: NodeGrid + ?Sized>(
    grid: &mut G,
    registry: &ContentRegistry,
    bank: LightBank,
    sources: impl IntoIterator<Item = NodePos>,
    modified: &mut ModifiedChunks,
) {
    let mut wave: FxHashSet<NodePos> = sources.into_iter().collect();
    let mut waves = 0usize;

    while !wave.is_empty() {
        waves += 1;
        let mut next = FxHashSet::default();

        for pos in wave {
            let node = grid.node(pos);
            if node.is_ignore() {
                continue;
            }
            let old_light = node.light(bank, registry.get(node.content));
            let new_light = diminish_light(old_light);

            for npos in pos.neighbors() {
                let mut neighbor = grid.node(npos);
                if neighbor.is_ignore() {
                    continue;
                }
                let features = registry.get(neighbor.content);
                let neighbor_light = neighbor.light(bank, features);

                if neighbor_light > undiminish_light(old_light) {
                    next.insert(npos);
                }
                if neighbor_light < new_light && features.light_propagates {
                    neighbor.set_light(bank, new_light);
                    if grid.set_node(npos, neighbor) {
                        modified.insert(npos.chunk());
                        next.insert(npos);
                    }
                }
            }
        }
        wave = next;
    }
    trace!(?bank, waves, "spread_light converged");
}

/// Removes light that came from the positions in `from_nodes`.
///
/// `from_nodes` maps each darkened position to the light level it had. A
/// neighbour strictly dimmer than that level, light-propagating and lit is
/// zeroed and unspread in turn. A neighbour at least as bright is recorded in
/// `light_sources` so a following [`spread_light`] can refill the dark area.
/// Artificial emitters keep their light and are always recorded as sources.
pub fn unspread_light<G: NodeGrid + ?Sized>(
    grid: &mut G,
    registry: &ContentRegistry,
    bank: LightBank,
    from_nodes: FxHashMap<NodePos, u8>,
    light_sources: &mut FxHashSet<NodePos>,
    modified: &mut ModifiedChunks,
) {
    let mut pending = from_nodes;

    while !pending.is_empty() {
        let mut unlighted: FxHashMap<NodePos, u8> = FxHashMap::default();

        for (pos, old_light) in pending {
            for npos in pos.neighbors() {
                let mut neighbor = grid.node(npos);
                if neighbor.is_ignore() {
                    continue;
                }
                let features = registry.get(neighbor.content);

                if bank == LightBank::Artificial && features.light_source > 0 {
                    light_sources.insert(npos);
                    continue;
                }

                let current = neighbor.light(bank, features);
                if current < old_light {
                    if features.light_propagates && current != 0 {
                        neighbor.set_light(bank, 0);
                        if grid.set_node(npos, neighbor) {
                            modified.insert(npos.chunk());
                            unlighted.insert(npos, current);
                            light_sources.remove(&npos);
                        }
                    }
                } else {
                    light_sources.insert(npos);
                }
            }
        }
        pending = unlighted;
    }
}
