use rand::Rng;
use strata_voxel::{ContentId, Node, NodeGrid, NodePos, VoxelBuffer};

/// Grows a tree with its trunk starting at `base`.
///
/// Only air and unpainted cells inside the buffer are written, so the tree
/// never replaces terrain.
pub fn make_tree(
    buf: &mut VoxelBuffer,
    base: NodePos,
    trunk: Node,
    leaves: Node,
    rng: &mut impl Rng,
) {
    let height: i32 = rng.random_range(4..=6);

    for dy in 0..height {
        let p = base.offset(0, dy, 0);
        if is_open(buf, p) {
            buf.set_node(p, trunk);
        }
    }

    let top = base.offset(0, height - 1, 0);
    for dy in -2..=1 {
        for dz in -2..=2i32 {
            for dx in -2..=2i32 {
                let corner = dx.abs() == 2 && dz.abs() == 2;
                if corner && (dy == 1 || rng.random_bool(0.5)) {
                    continue;
                }
                let p = top.offset(dx, dy, dz);
                if is_open(buf, p) {
                    buf.set_node(p, leaves);
                }
            }
        }
    }
}

fn is_open(buf: &VoxelBuffer, p: NodePos) -> bool {
    let content = buf.node(p).content;
    buf.area().contains(p) && (content == ContentId::AIR || content == ContentId::IGNORE)
}
