//! Sunlight columns and initial lighting of freshly generated areas.

use rustc_hash::FxHashSet;
use strata_voxel::{
    ContentRegistry, LIGHT_MAX, LightBank, ModifiedChunks, NodeGrid, NodePos, VoxelArea,
};

use crate::spread::spread_light;

/// Outcome of pushing sunlight down one column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SunlightRun {
    /// Sunlight passed through every node down to `bottom_y`.
    pub reached_bottom: bool,
    /// Lowest position that received sunlight.
    pub lowest_lit: Option<NodePos>,
}

/// Gives full sky light to `top` and every node straight below it down to
/// `bottom_y`, stopping at the first node that does not pass sunlight or
/// has no data. Lit positions are added to `lit`.
pub fn propagate_sunlight<G: NodeGrid + ?Sized>(
    grid: &mut G,
    registry: &ContentRegistry,
    top: NodePos,
    bottom_y: i32,
    lit: &mut FxHashSet<NodePos>,
    modified: &mut ModifiedChunks,
) -> SunlightRun {
    let mut lowest_lit = None;
    let mut pos = top;

    while pos.y >= bottom_y {
        let mut node = grid.node(pos);
        if node.is_ignore() || !registry.get(node.content).sunlight_propagates {
            return SunlightRun {
                reached_bottom: false,
                lowest_lit,
            };
        }
        if node.raw_light(LightBank::Sky) != LIGHT_MAX {
            node.set_light(LightBank::Sky, LIGHT_MAX);
            if grid.set_node(pos, node) {
                modified.insert(pos.chunk());
            }
        }
        lit.insert(pos);
        lowest_lit = Some(pos);
        pos = pos.down();
    }

    SunlightRun {
        reached_bottom: true,
        lowest_lit,
    }
}

/// Computes lighting for `area` from scratch.
///
/// Light inside the area is cleared, sunlight is dropped down every column
/// that is open to the sky, and both banks are spread from lit nodes,
/// emitters, and lit nodes bordering the area. When the node above a column
/// has no data, the column counts as open iff `sunlit_from_above`.
pub fn light_region<G: NodeGrid + ?Sized>(
    grid: &mut G,
    registry: &ContentRegistry,
    area: VoxelArea,
    sunlit_from_above: bool,
    modified: &mut ModifiedChunks,
) {
    if area.is_empty() {
        return;
    }

    let mut emitters = FxHashSet::default();
    for pos in area.iter() {
        let mut node = grid.node(pos);
        if node.is_ignore() {
            continue;
        }
        if registry.get(node.content).light_source > 0 {
            emitters.insert(pos);
        }
        if node.param1 != 0 {
            node.clear_light();
            if grid.set_node(pos, node) {
                modified.insert(pos.chunk());
            }
        }
    }

    let mut sky_sources = FxHashSet::default();
    for z in area.min.z..=area.max.z {
        for x in area.min.x..=area.max.x {
            let above = grid.node(NodePos::new(x, area.max.y + 1, z));
            let open = if above.is_ignore() {
                sunlit_from_above
            } else {
                above.raw_light(LightBank::Sky) == LIGHT_MAX
            };
            if open {
                propagate_sunlight(
                    grid,
                    registry,
                    NodePos::new(x, area.max.y, z),
                    area.min.y,
                    &mut sky_sources,
                    modified,
                );
            }
        }
    }

    let mut artificial_sources = emitters;
    for pos in border_positions(area) {
        let node = grid.node(pos);
        if node.is_ignore() {
            continue;
        }
        let features = registry.get(node.content);
        if node.light(LightBank::Sky, features) > 0 {
            sky_sources.insert(pos);
        }
        if node.light(LightBank::Artificial, features) > 0 {
            artificial_sources.insert(pos);
        }
    }

    spread_light(grid, registry, LightBank::Sky, sky_sources, modified);
    spread_light(
        grid,
        registry,
        LightBank::Artificial,
        artificial_sources,
        modified,
    );
}

/// Positions just outside `area` that share a face with it.
fn border_positions(area: VoxelArea) -> impl Iterator<Item = NodePos> {
    let VoxelArea { min, max } = area;
    let x_faces = (min.z..=max.z).flat_map(move |z| {
        (min.y..=max.y).flat_map(move |y| {
            [NodePos::new(min.x - 1, y, z), NodePos::new(max.x + 1, y, z)]
        })
    });
    let y_faces = (min.z..=max.z).flat_map(move |z| {
        (min.x..=max.x).flat_map(move |x| {
            [NodePos::new(x, min.y - 1, z), NodePos::new(x, max.y + 1, z)]
        })
    });
    let z_faces = (min.y..=max.y).flat_map(move |y| {
        (min.x..=max.x).flat_map(move |x| {
            [NodePos::new(x, y, min.z - 1), NodePos::new(x, y, max.z + 1)]
        })
    });
    x_faces.chain(y_faces).chain(z_faces)
}
