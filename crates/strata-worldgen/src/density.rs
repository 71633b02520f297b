//! Scalar density fields sampled per voxel during generation.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use strata_voxel::VoxelPos;

/// A 3D scalar field. Negative values are solid.
pub trait DensityField: Send + Sync {
    fn density(&self, pos: VoxelPos) -> f64;
}

impl<F> DensityField for F
where
    F: Fn(VoxelPos) -> f64 + Send + Sync,
{
    fn density(&self, pos: VoxelPos) -> f64 {
        self(pos)
    }
}

/// Configuration for the fractal noise field.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseParams {
    /// World seed for deterministic generation.
    pub seed: u32,
    /// Frequency of the first octave, in cycles per voxel.
    pub frequency: f64,
    /// Number of octaves composited.
    pub octaves: usize,
    /// Frequency multiplier between successive octaves.
    pub lacunarity: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            seed: 0,
            frequency: 0.01,
            octaves: 5,
            lacunarity: 2.0,
        }
    }
}

/// Fractal Brownian motion over Perlin noise.
pub struct NoiseDensity {
    noise: Fbm<Perlin>,
}

impl NoiseDensity {
    pub fn new(params: &NoiseParams) -> Self {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves)
            .set_frequency(params.frequency)
            .set_lacunarity(params.lacunarity);
        Self { noise }
    }
}

impl DensityField for NoiseDensity {
    fn density(&self, pos: VoxelPos) -> f64 {
        self.noise
            .get([f64::from(pos.x), f64::from(pos.y), f64::from(pos.z)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_line(field: &dyn DensityField) -> Vec<f64> {
        (0..64).map(|i| field.density(VoxelPos::new(i * 3, i, -i))).collect()
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let params = NoiseParams {
            seed: 7,
            ..NoiseParams::default()
        };
        assert_eq!(
            sample_line(&NoiseDensity::new(&params)),
            sample_line(&NoiseDensity::new(&params))
        );
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = NoiseDensity::new(&NoiseParams {
            seed: 1,
            ..NoiseParams::default()
        });
        let b = NoiseDensity::new(&NoiseParams {
            seed: 2,
            ..NoiseParams::default()
        });
        assert_ne!(sample_line(&a), sample_line(&b));
    }

    #[test]
    fn test_values_are_finite_and_bounded() {
        let field = NoiseDensity::new(&NoiseParams::default());
        for value in sample_line(&field) {
            assert!(value.is_finite());
            assert!(value.abs() <= 2.0, "density {value} out of range");
        }
    }

    #[test]
    fn test_closures_are_fields() {
        let flat = |pos: VoxelPos| f64::from(pos.y) - 10.0;
        assert!(flat.density(VoxelPos::new(0, 3, 0)) < 0.0);
        assert!(flat.density(VoxelPos::new(0, 12, 0)) > 0.0);
    }
}
