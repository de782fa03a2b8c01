//! Queue-driven liquid settling with sources, levels and viscosity.

use std::time::{Duration, Instant};

use strata_config::IgnoredNeighborPolicy;
use strata_light::update_lighting_nodes;
use strata_voxel::{
    ContentId, ContentRegistry, LIQUID_FLOW_DOWN_MASK, LIQUID_LEVEL_MASK, LIQUID_LEVEL_MAX,
    LIQUID_LEVEL_SOURCE, LiquidType, ModifiedChunks, NEIGHBORS_6, Node, NodeGrid, NodePos,
};
use tracing::{debug, info};

use crate::LiquidChange;
use crate::queue::UniqueQueue;

/// Extra levels a liquid gains when it falls onto a node.
pub const WATER_DROP_BOOST: i8 = 4;

/// Where a neighbour sits relative to the node being settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Upper,
    Same,
    Lower,
}

#[derive(Clone, Copy, Debug)]
struct Neighbor {
    node: Node,
    pos: NodePos,
    side: Side,
}

/// Classic liquid state: the pending queue and the purge bookkeeping.
#[derive(Debug)]
pub struct ClassicLiquid {
    queue: UniqueQueue<NodePos>,
    loop_max: usize,
    purge_time: Option<Duration>,
    policy: IgnoredNeighborPolicy,
    unprocessed: usize,
    growing_since: Option<Instant>,
}

impl ClassicLiquid {
    /// `purge_time` of zero disables dropping old queue entries.
    pub fn new(loop_max: u32, purge_time: Duration, policy: IgnoredNeighborPolicy) -> Self {
        Self {
            queue: UniqueQueue::new(),
            loop_max: loop_max.max(1) as usize,
            purge_time: (!purge_time.is_zero()).then_some(purge_time),
            policy,
            unprocessed: 0,
            growing_since: None,
        }
    }

    pub fn queue(&self) -> &UniqueQueue<NodePos> {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut UniqueQueue<NodePos> {
        &mut self.queue
    }

    /// Processes up to the number of entries queued on entry (capped by the
    /// loop limit) and returns the node changes it made.
    ///
    /// `on_flood` is called before a floodable node is replaced by liquid;
    /// returning `true` cancels that replacement. Lighting around every
    /// changed node is refreshed before returning.
    pub fn settle<G: NodeGrid + ?Sized>(
        &mut self,
        grid: &mut G,
        registry: &ContentRegistry,
        on_flood: &mut dyn FnMut(NodePos, Node, Node) -> bool,
        modified: &mut ModifiedChunks,
    ) -> Vec<LiquidChange> {
        let initial_size = self.queue.len();
        let mut processed = 0usize;
        let mut changes = Vec::new();
        let mut changed_nodes: Vec<(NodePos, Node)> = Vec::new();
        let mut must_reflow: Vec<NodePos> = Vec::new();

        while processed < initial_size && processed < self.loop_max {
            let Some(p0) = self.queue.pop_front() else {
                break;
            };
            processed += 1;

            let n0 = grid.node(p0);
            let f0 = registry.get(n0.content);

            // Level -1 stands for "no liquid here".
            let (liquid_level, mut liquid_kind, floodable_node) = match f0.liquid_type {
                LiquidType::Source => (
                    LIQUID_LEVEL_SOURCE as i8,
                    registry.alternative_flowing(n0.content),
                    ContentId::AIR,
                ),
                LiquidType::Flowing => (n0.liquid_level() as i8, n0.content, ContentId::AIR),
                LiquidType::None => {
                    if !f0.floodable {
                        continue;
                    }
                    (-1, ContentId::AIR, n0.content)
                }
            };

            let mut sources: Vec<Neighbor> = Vec::new();
            let mut flows: Vec<Neighbor> = Vec::new();
            let mut airs: Vec<Neighbor> = Vec::new();
            let mut flowing_down = false;
            let mut ignored_sources = false;

            for (i, dir) in NEIGHBORS_6.iter().enumerate() {
                let side = match i {
                    1 => Side::Upper,
                    4 => Side::Lower,
                    _ => Side::Same,
                };
                let pos = p0.offset(dir.x, dir.y, dir.z);
                let node = grid.node(pos);
                let nb = Neighbor { node, pos, side };
                let fnb = registry.get(node.content);

                match fnb.liquid_type {
                    LiquidType::None => {
                        if fnb.floodable {
                            airs.push(nb);
                            // Air above a liquid never gets filled by it.
                            if side != Side::Upper && f0.liquid_type != LiquidType::None {
                                self.queue.push_back(pos);
                            }
                            if side == Side::Lower {
                                flowing_down = true;
                            }
                        } else if node.is_ignore()
                            && self.policy == IgnoredNeighborPolicy::Classic
                        {
                            // An unloaded node may hide a source; below it
                            // only blocks outward spread.
                            if side == Side::Lower {
                                flowing_down = true;
                            } else {
                                ignored_sources = true;
                            }
                        }
                    }
                    LiquidType::Source => {
                        let alt = registry.alternative_flowing(node.content);
                        if liquid_kind == ContentId::AIR {
                            liquid_kind = alt;
                        }
                        if alt == liquid_kind && side != Side::Lower {
                            sources.push(nb);
                        }
                    }
                    LiquidType::Flowing => {
                        let alt = registry.alternative_flowing(node.content);
                        if liquid_kind == ContentId::AIR {
                            liquid_kind = alt;
                        }
                        if alt == liquid_kind {
                            flows.push(nb);
                            if side == Side::Lower {
                                flowing_down = true;
                            }
                        }
                    }
                }
            }

            let kind_features = registry.get(liquid_kind);
            let range = kind_features.liquid_range.min(LIQUID_LEVEL_MAX + 1) as i8;
            let min_level = LIQUID_LEVEL_MAX as i8 + 1 - range;
            let mut new_level: i8 = -1;

            let new_content = if (sources.len() >= 2 && kind_features.liquid_renewable)
                || f0.liquid_type == LiquidType::Source
            {
                registry.alternative_source(liquid_kind)
            } else if !sources.is_empty() {
                new_level = LIQUID_LEVEL_MAX as i8;
                if new_level >= min_level {
                    liquid_kind
                } else {
                    floodable_node
                }
            } else if ignored_sources && liquid_level >= 0 {
                new_level = liquid_level;
                liquid_kind
            } else {
                let max_level = highest_inflow(&flows);
                let viscosity = kind_features.liquid_viscosity as i8;
                if viscosity > 1 && max_level != liquid_level {
                    let step = max_level - liquid_level;
                    new_level = if step.abs() > viscosity {
                        liquid_level + step / viscosity
                    } else {
                        liquid_level + step.signum()
                    };
                    if new_level != max_level {
                        must_reflow.push(p0);
                    }
                } else {
                    new_level = max_level;
                }
                if max_level >= min_level {
                    liquid_kind
                } else {
                    floodable_node
                }
            };

            let unchanged = new_content == n0.content
                && (f0.liquid_type != LiquidType::Flowing
                    || (n0.liquid_level() as i8 == new_level
                        && n0.is_flowing_down() == flowing_down));
            if unchanged {
                continue;
            }

            let mut n = n0;
            n.content = new_content;
            if registry.get(new_content).liquid_type == LiquidType::Flowing {
                let down = if flowing_down { LIQUID_FLOW_DOWN_MASK } else { 0 };
                n.param2 = down | (new_level as u8 & LIQUID_LEVEL_MASK);
            } else {
                n.param2 &= !(LIQUID_LEVEL_MASK | LIQUID_FLOW_DOWN_MASK);
            }

            if floodable_node != ContentId::AIR && on_flood(p0, n0, n) {
                continue;
            }

            n.clear_light();
            if !grid.set_node(p0, n) {
                continue;
            }
            modified.insert(p0.chunk());
            changed_nodes.push((p0, n0));
            changes.push(LiquidChange {
                pos: p0,
                old: n0,
                new: n,
            });

            if registry.get(new_content).is_liquid() {
                for nb in flows.iter().chain(airs.iter()) {
                    if nb.side != Side::Upper {
                        self.queue.push_back(nb.pos);
                    }
                }
            } else {
                for nb in &flows {
                    self.queue.push_back(nb.pos);
                }
            }
        }

        for p in must_reflow {
            self.queue.push_back(p);
        }

        update_lighting_nodes(grid, registry, &changed_nodes, modified);
        debug!(
            processed,
            changed = changes.len(),
            queued = self.queue.len(),
            "liquid settle pass"
        );

        self.manage_queue(Instant::now());
        changes
    }

    /// Drops the oldest queue entries once the queue has kept growing for
    /// longer than the purge time.
    pub(crate) fn manage_queue(&mut self, now: Instant) {
        let Some(purge_time) = self.purge_time else {
            return;
        };

        let previous = self.unprocessed;
        self.unprocessed = self.queue.len();
        if self.unprocessed <= previous {
            self.growing_since = None;
        } else if self.growing_since.is_none() {
            self.growing_since = Some(now);
        }

        let Some(since) = self.growing_since else {
            return;
        };
        if now.duration_since(since) > purge_time && self.unprocessed > self.loop_max {
            let dump = self.unprocessed - self.loop_max;
            for _ in 0..dump {
                self.queue.pop_front();
            }
            info!(
                dropped = dump,
                remaining = self.queue.len(),
                "liquid queue kept growing, dropped oldest entries"
            );
            self.growing_since = None;
            self.unprocessed = self.queue.len();
        }
    }
}

/// Highest level the flowing neighbours can feed into a node.
///
/// Liquid falling from above is boosted; liquid beside loses one level
/// unless it is itself falling. Flows below never feed upward.
fn highest_inflow(flows: &[Neighbor]) -> i8 {
    let mut max_level: i8 = -1;
    for nb in flows {
        let level = nb.node.liquid_level() as i8;
        match nb.side {
            Side::Upper => {
                if level + WATER_DROP_BOOST > max_level {
                    max_level = (level + WATER_DROP_BOOST).min(LIQUID_LEVEL_MAX as i8);
                } else if level > max_level {
                    max_level = level;
                }
            }
            Side::Same => {
                if !nb.node.is_flowing_down() && level > 0 && level - 1 > max_level {
                    max_level = level - 1;
                }
            }
            Side::Lower => {}
        }
    }
    max_level
}
