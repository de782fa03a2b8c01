//! Noise heightmap terrain with beaches, water and trees.
//!
//! Surface heights come from fractal Brownian motion over simplex noise:
//! several octaves, each at double the frequency and half the amplitude of
//! the one before.

use noise::{NoiseFn, Simplex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_voxel::{Node, NodeGrid, NodePos};

use crate::trees::make_tree;
use crate::{BlockMakeData, TerrainIds, paint_column};

/// Average ground height above the water level.
const BASE_ABOVE_WATER: f64 = 4.0;

/// Multi-octave fBm parameters.
#[derive(Clone, Debug)]
pub struct HeightmapParams {
    pub seed: u64,
    pub octaves: u32,
    /// Frequency multiplier between successive octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves.
    pub persistence: f64,
    /// Frequency of the broadest octave, in cycles per node.
    pub base_frequency: f64,
    /// Amplitude of the broadest octave, in nodes.
    pub amplitude: f64,
}

impl Default for HeightmapParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 1.0 / 128.0,
            amplitude: 12.0,
        }
    }
}

/// Samples fBm noise on the horizontal plane.
#[derive(Clone)]
pub struct HeightmapSampler {
    noise: Simplex,
    params: HeightmapParams,
}

impl HeightmapSampler {
    pub fn new(params: HeightmapParams) -> Self {
        // Simplex takes a 32-bit seed; fold the high half in.
        let noise = Simplex::new((params.seed ^ (params.seed >> 32)) as u32);
        Self { noise, params }
    }

    /// Height offset at `(x, z)`, within `±max_amplitude()`.
    pub fn sample(&self, x: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;
        for _ in 0..self.params.octaves {
            total += self.noise.get([x * frequency, z * frequency]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }
        total
    }

    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amp;
            amp *= self.params.persistence;
        }
        sum
    }
}

impl std::fmt::Debug for HeightmapSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeightmapSampler")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Rolling terrain from a noise heightmap.
#[derive(Clone, Debug)]
pub struct HeightmapPainter {
    sampler: HeightmapSampler,
    water_level: i32,
    tree_density: f64,
    ids: TerrainIds,
}

impl HeightmapPainter {
    pub fn new(
        params: HeightmapParams,
        water_level: i32,
        tree_density: f64,
        ids: TerrainIds,
    ) -> Self {
        Self {
            sampler: HeightmapSampler::new(params),
            water_level,
            tree_density: tree_density.clamp(0.0, 1.0),
            ids,
        }
    }

    /// Height of the topmost solid node of column `(x, z)`.
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let offset = self.sampler.sample(x as f64, z as f64);
        (self.water_level as f64 + BASE_ABOVE_WATER + offset).floor() as i32
    }

    pub fn paint(&self, data: &mut BlockMakeData) {
        let area = data.node_area();
        let mut rng = ChaCha8Rng::seed_from_u64(data.seed);
        let mut tree_sites = Vec::new();

        for z in area.min.z..=area.max.z {
            for x in area.min.x..=area.max.x {
                let surface = self.surface_height(x, z);
                paint_column(
                    &mut data.vmanip,
                    &self.ids,
                    x,
                    z,
                    area.min.y - 1..=area.max.y + 1,
                    surface,
                    self.water_level,
                );

                // Draw for every column so the sequence is independent of
                // the terrain shape.
                let wants_tree = rng.random_bool(self.tree_density);
                let ground = NodePos::new(x, surface, z);
                if wants_tree
                    && area.contains(ground)
                    && data.vmanip.node(ground).content == self.ids.grass
                {
                    tree_sites.push(ground.up());
                }
            }
        }

        let trunk = Node::new(self.ids.tree);
        let leaves = Node::new(self.ids.leaves);
        for base in tree_sites {
            make_tree(&mut data.vmanip, base, trunk, leaves, &mut rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_deterministic_per_seed() {
        let a = HeightmapSampler::new(HeightmapParams {
            seed: 42,
            ..Default::default()
        });
        let b = HeightmapSampler::new(HeightmapParams {
            seed: 42,
            ..Default::default()
        });
        let c = HeightmapSampler::new(HeightmapParams {
            seed: 43,
            ..Default::default()
        });
        assert_eq!(a.sample(100.5, -20.25), b.sample(100.5, -20.25));
        let differs = (0..32).any(|i| {
            let x = i as f64 * 7.3;
            (a.sample(x, x) - c.sample(x, x)).abs() > 1e-9
        });
        assert!(differs);
    }

    #[test]
    fn test_sample_within_amplitude() {
        let sampler = HeightmapSampler::new(HeightmapParams::default());
        let max = sampler.max_amplitude();
        for i in 0..50 {
            for j in 0..50 {
                let h = sampler.sample(i as f64 * 13.0, j as f64 * 11.0);
                assert!(h.abs() <= max + 1e-9, "{h} exceeds {max}");
            }
        }
    }
}
