//! Terrain generation for strata regions.
//!
//! A [`Mapgen`] fills the buffer of a [`BlockMakeData`] in three steps: the
//! configured [`TerrainPainter`] paints the region, liquid that may still flow
//! is queued, and the region is lit from scratch. All of this runs on the
//! buffer alone, so it needs no access to the live map.

mod data;
mod flat;
mod heightmap;
mod trees;

use std::ops::RangeInclusive;

use strata_config::{MapgenKind, WorldConfig};
use strata_light::light_region;
use strata_liquid::scan_buffer;
use strata_voxel::{
    ContentId, ContentRegistry, ModifiedChunks, Node, NodeGrid, NodePos, VoxelArea, VoxelBuffer,
};
use thiserror::Error;
use tracing::debug;

pub use data::{BlockMakeData, region_seed};
pub use flat::FlatPainter;
pub use heightmap::{HeightmapPainter, HeightmapParams, HeightmapSampler};
pub use trees::make_tree;

/// Errors from setting up a generator.
#[derive(Debug, Error)]
pub enum MapgenError {
    #[error("content '{0}' needed by the terrain painter is not registered")]
    MissingContent(String),
}

// ---------------------------------------------------------------------------
// Content ids
// ---------------------------------------------------------------------------

/// Content ids the painters place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerrainIds {
    pub stone: ContentId,
    pub dirt: ContentId,
    pub grass: ContentId,
    pub sand: ContentId,
    pub water: ContentId,
    pub tree: ContentId,
    pub leaves: ContentId,
}

impl TerrainIds {
    pub fn resolve(registry: &ContentRegistry) -> Result<Self, MapgenError> {
        let lookup = |name: &str| {
            registry
                .id_of(name)
                .ok_or_else(|| MapgenError::MissingContent(name.to_string()))
        };
        Ok(Self {
            stone: lookup("stone")?,
            dirt: lookup("dirt")?,
            grass: lookup("grass")?,
            sand: lookup("sand")?,
            water: lookup("water_source")?,
            tree: lookup("tree")?,
            leaves: lookup("leaves")?,
        })
    }
}

/// Paints one column of terrain whose top solid node is at `surface`.
///
/// Only cells still holding IGNORE are painted, so content a neighbouring
/// region already placed survives. Air up to the water level is flooded.
/// Ground near or below the water line becomes sand.
pub(crate) fn paint_column(
    buf: &mut VoxelBuffer,
    ids: &TerrainIds,
    x: i32,
    z: i32,
    ys: RangeInclusive<i32>,
    surface: i32,
    water_level: i32,
) {
    let beach = surface <= water_level + 1;
    for y in ys {
        let p = NodePos::new(x, y, z);
        let current = buf.node(p).content;
        let content = if y > surface {
            if y <= water_level && (current == ContentId::AIR || current == ContentId::IGNORE) {
                ids.water
            } else if current == ContentId::IGNORE {
                ContentId::AIR
            } else {
                continue;
            }
        } else if current != ContentId::IGNORE {
            continue;
        } else if y == surface {
            if beach { ids.sand } else { ids.grass }
        } else if y >= surface - 3 {
            if beach { ids.sand } else { ids.dirt }
        } else {
            ids.stone
        };
        buf.set_node(p, Node::new(content));
    }
}

// ---------------------------------------------------------------------------
// Painters
// ---------------------------------------------------------------------------

/// The terrain painter selected for a world.
#[derive(Clone, Debug)]
pub enum TerrainPainter {
    Flat(FlatPainter),
    Heightmap(HeightmapPainter),
}

impl TerrainPainter {
    pub fn from_config(world: &WorldConfig, registry: &ContentRegistry) -> Result<Self, MapgenError> {
        let ids = TerrainIds::resolve(registry)?;
        Ok(match world.mapgen {
            MapgenKind::Flat => Self::Flat(FlatPainter::new(
                world.flat_ground_level,
                world.water_level,
                ids,
            )),
            MapgenKind::Heightmap => Self::Heightmap(HeightmapPainter::new(
                HeightmapParams {
                    seed: world.seed,
                    ..Default::default()
                },
                world.water_level,
                world.tree_density,
                ids,
            )),
        })
    }

    /// Paints the region of `data` into its buffer.
    pub fn paint(&self, data: &mut BlockMakeData) {
        match self {
            Self::Flat(p) => p.paint(data),
            Self::Heightmap(p) => p.paint(data),
        }
    }
}

/// Terrain generator: painter plus the liquid and lighting post-pass.
#[derive(Clone, Debug)]
pub struct Mapgen {
    painter: TerrainPainter,
    water_level: i32,
}

impl Mapgen {
    pub fn new(world: &WorldConfig, registry: &ContentRegistry) -> Result<Self, MapgenError> {
        Ok(Self::with_painter(
            TerrainPainter::from_config(world, registry)?,
            world.water_level,
        ))
    }

    pub fn with_painter(painter: TerrainPainter, water_level: i32) -> Self {
        Self {
            painter,
            water_level,
        }
    }

    pub fn painter(&self) -> &TerrainPainter {
        &self.painter
    }

    pub fn water_level(&self) -> i32 {
        self.water_level
    }

    /// Generates the region of `data`.
    ///
    /// The buffer must already hold the padded region. Painters fill the
    /// region plus one node above and below it. Liquid that may still flow
    /// is added to `data.transforming_liquid`, then the same slab is lit.
    /// Where nothing is known above it, sunlight enters from the top unless
    /// the slab lies at or below the water level.
    pub fn make_chunk(&self, data: &mut BlockMakeData, registry: &ContentRegistry) {
        let area = data.node_area();
        let padded = data.padded_area();

        self.painter.paint(data);

        scan_buffer(
            &data.vmanip,
            padded.min,
            padded.max,
            registry,
            &mut data.transforming_liquid,
        );

        let lit = VoxelArea::new(area.min.offset(0, -1, 0), area.max.offset(0, 1, 0));
        let sunlit = lit.max.y > self.water_level;
        let mut modified = ModifiedChunks::new();
        light_region(&mut data.vmanip, registry, lit, sunlit, &mut modified);

        debug!(
            min = ?data.blockpos_min,
            max = ?data.blockpos_max,
            liquids = data.transforming_liquid.len(),
            "generated region"
        );
    }
}

#[cfg(test)]
#[path = "mapgen_tests.rs"]
mod tests;
