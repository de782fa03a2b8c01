//! Finding liquid nodes that may still need to flow.
//!
//! Both scanners walk columns top to bottom and look at the transitions
//! between liquid and non-liquid runs. The topmost node of a liquid run is
//! queued when it could spread sideways, and the lowest node of a run is
//! queued when the node under it could take liquid.

use strata_voxel::{
    CHUNK_SIZE, ChunkPos, ContentRegistry, LiquidType, NodeGrid, NodePos, VoxelBuffer,
};

use crate::queue::UniqueQueue;

/// Queues the liquid nodes of chunk `pos` and of the columns bordering it
/// that may still have somewhere to flow.
///
/// Border columns are included because liquids there may have been held
/// back while this chunk was missing. Columns in chunks that are not loaded
/// are skipped.
pub fn scan_chunk<G: NodeGrid + ?Sized>(
    grid: &G,
    registry: &ContentRegistry,
    pos: ChunkPos,
    out: &mut UniqueQueue<NodePos>,
) {
    let origin = pos.min_node();
    for z in 0..CHUNK_SIZE {
        for x in 0..CHUNK_SIZE {
            scan_column(grid, registry, origin, x, z, out);
        }
    }
    for i in 0..CHUNK_SIZE {
        scan_column(grid, registry, origin, i, -1, out);
        scan_column(grid, registry, origin, i, CHUNK_SIZE, out);
        scan_column(grid, registry, origin, -1, i, out);
        scan_column(grid, registry, origin, CHUNK_SIZE, i, out);
    }
}

/// Whether liquid at `p` could spread onto one of its horizontal neighbours.
fn flows_sideways<G: NodeGrid + ?Sized>(grid: &G, registry: &ContentRegistry, p: NodePos) -> bool {
    [(-1, 0), (1, 0), (0, -1), (0, 1)].into_iter().any(|(dx, dz)| {
        let n = grid.node(p.offset(dx, 0, dz));
        !n.is_ignore() && registry.get(n.content).floodable
    })
}

/// Scans one column of the chunk at `origin`; `x` and `z` are relative to it
/// and may lie one node outside.
fn scan_column<G: NodeGrid + ?Sized>(
    grid: &G,
    registry: &ContentRegistry,
    origin: NodePos,
    x: i32,
    z: i32,
    out: &mut UniqueQueue<NodePos>,
) {
    let at = |y: i32| origin.offset(x, y, z);
    if !grid.has_chunk(at(0).chunk()) {
        return;
    }

    let above = grid.node(at(CHUNK_SIZE));
    let mut was_ignore = above.is_ignore();
    let mut was_liquid = !was_ignore && registry.get(above.content).is_liquid();
    let mut was_checked = false;
    let mut was_pushed = false;

    for y in (0..CHUNK_SIZE).rev() {
        let node = grid.node(at(y));
        let features = registry.get(node.content);
        let is_ignore = node.is_ignore();
        let is_liquid = features.is_liquid();

        if is_ignore || was_ignore || is_liquid == was_liquid {
            was_checked = false;
            was_pushed = false;
        } else if is_liquid {
            let pushed = features.liquid_type == LiquidType::Flowing
                || flows_sideways(grid, registry, at(y));
            if pushed {
                out.push_back(at(y));
            }
            was_checked = true;
            was_pushed = pushed;
        } else if !was_pushed
            && (features.floodable || (!was_checked && flows_sideways(grid, registry, at(y + 1))))
        {
            out.push_back(at(y + 1));
        }

        was_liquid = is_liquid;
        was_ignore = is_ignore;
    }

    // The top of the column below continues this one.
    let node = grid.node(at(-1));
    if node.is_ignore() || was_ignore {
        return;
    }
    let features = registry.get(node.content);
    let is_liquid = features.is_liquid();
    if is_liquid == was_liquid {
        return;
    }
    if is_liquid {
        if features.liquid_type == LiquidType::Flowing || flows_sideways(grid, registry, at(-1)) {
            out.push_back(at(-1));
        }
    } else if !was_pushed
        && (features.floodable || (!was_checked && flows_sideways(grid, registry, at(0))))
    {
        out.push_back(at(0));
    }
}

/// Queues liquid nodes inside `nmin..=nmax` of a freshly generated buffer.
///
/// The outermost x and z columns are skipped since their neighbours are not
/// part of the buffer. Only non-liquid floodable neighbours count as room to
/// spread into.
pub fn scan_buffer(
    buf: &VoxelBuffer,
    nmin: NodePos,
    nmax: NodePos,
    registry: &ContentRegistry,
    out: &mut UniqueQueue<NodePos>,
) {
    let flows_sideways = |p: NodePos| {
        [(-1, 0), (1, 0), (0, -1), (0, 1)].into_iter().any(|(dx, dz)| {
            let n = buf.node(p.offset(dx, 0, dz));
            if n.is_ignore() {
                return false;
            }
            let f = registry.get(n.content);
            f.floodable && !f.is_liquid()
        })
    };

    for z in nmin.z + 1..nmax.z {
        for x in nmin.x + 1..nmax.x {
            let mut was_ignore = true;
            let mut was_liquid = false;
            let mut was_checked = false;
            let mut was_pushed = false;

            for y in (nmin.y..=nmax.y).rev() {
                let p = NodePos::new(x, y, z);
                let node = buf.node(p);
                let features = registry.get(node.content);
                let is_ignore = node.is_ignore();
                let is_liquid = features.is_liquid();

                if is_ignore || was_ignore || is_liquid == was_liquid {
                    was_checked = false;
                    was_pushed = false;
                } else if is_liquid {
                    let pushed = flows_sideways(p);
                    if pushed {
                        out.push_back(p);
                    }
                    was_checked = true;
                    was_pushed = pushed;
                } else if !was_pushed
                    && (features.floodable || (!was_checked && flows_sideways(p.up())))
                {
                    out.push_back(p.up());
                }

                was_liquid = is_liquid;
                was_ignore = is_ignore;
            }
        }
    }
}
