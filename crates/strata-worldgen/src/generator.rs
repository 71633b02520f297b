//! Parallel terrain fill over pre-allocated chunks.
//!
//! Generation never inserts into the chunk map. Every chunk in the target
//! region is created up front by [`allocate_chunks`], then the loaded chunk
//! list is split into disjoint per-worker slices. Each worker holds a
//! chunk's exclusive lock once and writes all 32³ slots through the guard.

use std::thread;
use std::time::{Duration, Instant};

use strata_voxel::{BlockType, CHUNK_VOLUME, Chunk, ChunkPos, LocalPos, VoxelManager, VoxelPos};

use crate::density::DensityField;

/// Axis-aligned box of chunk positions; `max` is exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldBounds {
    pub min: ChunkPos,
    pub max: ChunkPos,
}

impl WorldBounds {
    pub fn new(min: ChunkPos, max: ChunkPos) -> Self {
        Self { min, max }
    }

    /// Number of chunk positions inside the bounds.
    pub fn chunk_count(&self) -> usize {
        let span = |lo: i32, hi: i32| (hi - lo).max(0) as usize;
        span(self.min.x, self.max.x) * span(self.min.y, self.max.y) * span(self.min.z, self.max.z)
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_count() == 0
    }

    /// Every position inside the bounds, X outermost.
    pub fn positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        (self.min.x..self.max.x).flat_map(move |x| {
            (self.min.y..self.max.y)
                .flat_map(move |y| (self.min.z..self.max.z).map(move |z| ChunkPos::new(x, y, z)))
        })
    }
}

/// Creates every chunk inside `bounds` that is not loaded yet. Returns the
/// number created.
pub fn allocate_chunks(voxels: &VoxelManager, bounds: WorldBounds) -> usize {
    let start = Instant::now();
    let before = voxels.loaded_count();
    for pos in bounds.positions() {
        voxels.get_or_create_chunk(pos);
    }
    let created = voxels.loaded_count() - before;
    tracing::info!(
        created,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "chunks allocated"
    );
    created
}

/// Block type for a density sample, or `None` for empty space.
///
/// Denser (more negative) samples win: stone below -0.04, dirt below -0.03,
/// grass below -0.02.
pub fn classify(density: f64) -> Option<BlockType> {
    if density < -0.04 {
        Some(BlockType::Stone)
    } else if density < -0.03 {
        Some(BlockType::Dirt)
    } else if density < -0.02 {
        Some(BlockType::Grass)
    } else {
        None
    }
}

/// Totals from one [`WorldGenerator::generate`] run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerationStats {
    /// Chunks filled.
    pub chunks: usize,
    /// Non-air blocks written.
    pub solid_blocks: usize,
    /// Worker threads used.
    pub workers: usize,
    /// Wall-clock time.
    pub elapsed: Duration,
}

/// Fills loaded chunks from a [`DensityField`] on a fixed number of threads.
#[derive(Clone, Debug)]
pub struct WorldGenerator {
    threads: usize,
}

impl WorldGenerator {
    /// `threads == 0` uses one worker per logical CPU.
    pub fn new(threads: usize) -> Self {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        Self {
            threads: threads.max(1),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Fills every loaded chunk. Chunks are split into disjoint contiguous
    /// slices, one per worker, so no two workers touch the same chunk.
    pub fn generate(&self, voxels: &VoxelManager, density: &dyn DensityField) -> GenerationStats {
        let start = Instant::now();
        let chunks = voxels.snapshot();
        if chunks.is_empty() {
            return GenerationStats::default();
        }

        let per_worker = chunks.len().div_ceil(self.threads);
        let solid_blocks = thread::scope(|scope| {
            let handles: Vec<_> = chunks
                .chunks(per_worker)
                .map(|slice| {
                    scope.spawn(move || slice.iter().map(|chunk| fill_chunk(chunk, density)).sum::<usize>())
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .sum()
        });

        let stats = GenerationStats {
            chunks: chunks.len(),
            solid_blocks,
            workers: chunks.len().div_ceil(per_worker),
            elapsed: start.elapsed(),
        };
        tracing::info!(
            chunks = stats.chunks,
            solid_blocks = stats.solid_blocks,
            workers = stats.workers,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "world generated"
        );
        stats
    }
}

impl Default for WorldGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Writes one chunk under a single exclusive lock. Returns the number of
/// solid blocks written.
fn fill_chunk(chunk: &Chunk, density: &dyn DensityField) -> usize {
    let position = chunk.position();
    let mut storage = chunk.lock();
    let mut solid = 0;
    for index in 0..CHUNK_VOLUME {
        let world = VoxelPos::from_parts(position, LocalPos::from_index(index));
        if let Some(block_type) = classify(density.density(world)) {
            storage.set_block_type(index, block_type);
            solid += 1;
        }
    }
    tracing::trace!(x = position.x, y = position.y, z = position.z, solid, "chunk filled");
    solid
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::{NoiseDensity, NoiseParams};

    fn small_bounds() -> WorldBounds {
        WorldBounds::new(ChunkPos::new(-1, 0, 0), ChunkPos::new(2, 2, 2))
    }

    #[test]
    fn test_bounds_enumeration() {
        let bounds = small_bounds();
        assert_eq!(bounds.chunk_count(), 12);
        assert_eq!(bounds.positions().count(), 12);
        assert!(bounds.positions().all(|p| p.x >= -1 && p.x < 2 && p.y < 2 && p.z < 2));

        let inverted = WorldBounds::new(ChunkPos::new(3, 0, 0), ChunkPos::new(1, 5, 5));
        assert!(inverted.is_empty());
        assert_eq!(inverted.positions().count(), 0);
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let voxels = VoxelManager::new();
        assert_eq!(allocate_chunks(&voxels, small_bounds()), 12);
        assert_eq!(allocate_chunks(&voxels, small_bounds()), 0);
        assert_eq!(voxels.loaded_count(), 12);
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(classify(0.5), None);
        assert_eq!(classify(-0.02), None);
        assert_eq!(classify(-0.025), Some(BlockType::Grass));
        assert_eq!(classify(-0.035), Some(BlockType::Dirt));
        assert_eq!(classify(-0.05), Some(BlockType::Stone));
    }

    #[test]
    fn test_flat_field_fills_below_surface() {
        let voxels = VoxelManager::new();
        allocate_chunks(&voxels, small_bounds());
        let field = |pos: VoxelPos| -> f64 { if pos.y < 40 { -1.0 } else { 1.0 } };

        let stats = WorldGenerator::new(3).generate(&voxels, &field);
        assert_eq!(stats.chunks, 12);
        assert_eq!(stats.workers, 3);
        // 6 chunk columns of 32×32 voxels, 40 voxels deep.
        assert_eq!(stats.solid_blocks, 6 * 32 * 32 * 40);
        assert_eq!(voxels.get_block(VoxelPos::new(-5, 39, 7)), Some(BlockType::Stone));
        assert_eq!(voxels.get_block(VoxelPos::new(-5, 40, 7)), Some(BlockType::Air));
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let field = NoiseDensity::new(&NoiseParams {
            seed: 99,
            frequency: 0.05,
            ..NoiseParams::default()
        });

        let single = VoxelManager::new();
        allocate_chunks(&single, small_bounds());
        let single_stats = WorldGenerator::new(1).generate(&single, &field);

        let parallel = VoxelManager::new();
        allocate_chunks(&parallel, small_bounds());
        let parallel_stats = WorldGenerator::new(5).generate(&parallel, &field);

        assert_eq!(single_stats.solid_blocks, parallel_stats.solid_blocks);
        for pos in single.positions() {
            let a = single.get_chunk(pos).expect("allocated");
            let b = parallel.get_chunk(pos).expect("allocated");
            assert_eq!(*a, *b, "chunk {pos:?} differs");
        }
    }

    #[test]
    fn test_empty_world_is_a_noop() {
        let voxels = VoxelManager::new();
        let stats = WorldGenerator::new(4).generate(&voxels, &|_: VoxelPos| -> f64 { -1.0 });
        assert_eq!(stats, GenerationStats::default());
    }

    #[test]
    fn test_zero_threads_means_auto() {
        assert_eq!(WorldGenerator::new(0).threads(), num_cpus::get().max(1));
        assert_eq!(WorldGenerator::new(6).threads(), 6);
    }
}
