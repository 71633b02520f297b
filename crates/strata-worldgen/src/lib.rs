//! Chunk allocation and density-driven terrain fill for a [`strata_voxel::VoxelManager`].

pub mod density;
pub mod generator;

pub use density::{DensityField, NoiseDensity, NoiseParams};
pub use generator::{GenerationStats, WorldBounds, WorldGenerator, allocate_chunks, classify};
