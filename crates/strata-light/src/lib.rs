//! Light propagation over any [`NodeGrid`](strata_voxel::NodeGrid).
//!
//! Two banks are tracked per node: sky light, which enters straight down at
//! full strength from an open sky, and artificial light emitted by content.
//! Both diminish by one level per step through light-propagating nodes.
//!
//! All algorithms are worklist driven (no recursion) and record every chunk
//! they write into a caller-provided [`ModifiedChunks`](strata_voxel::ModifiedChunks).

mod region;
mod spread;
mod update;

pub use region::{SunlightRun, light_region, propagate_sunlight};
pub use spread::{spread_light, unspread_light};
pub use update::update_lighting_nodes;

#[cfg(test)]
#[path = "light_tests.rs"]
mod tests;
