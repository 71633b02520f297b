//! Breadth-first sunlight propagation over the world's chunk graph.
//!
//! Seeding lights the top slot layer of the highest chunk row at level 15.
//! Propagation then pops one position at a time and offers light to its six
//! neighbors: straight down at full strength while the source is at 15,
//! otherwise one level dimmer. A neighbor is skipped when its chunk is not
//! loaded, when it is opaque, or when it is already within one level of what
//! would be offered (`N + 2 > S`). Every write strictly raises a sky value
//! bounded by 15, so the queue always drains.
//!
//! The seed assumes a flat world top: only chunks at the maximum loaded
//! chunk Y are lit from above.
//!
//! Unloaded chunks act as walls. When a chunk is loaded next to an already
//! lit region, call [`SunlightPropagator::enqueue_lit_slots`] on the lit
//! neighbor and [`SunlightPropagator::propagate`] again.

use std::collections::VecDeque;
use std::time::Instant;

use strata_voxel::{
    BlockRegistry, CHUNK_SIZE, CHUNK_VOLUME, ChunkPos, Direction, Light, LocalPos, VoxelManager,
    VoxelPos,
};

/// Counts from one [`SunlightPropagator::initialize_sunlight`] run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SunlightStats {
    /// Top-layer slots lit at level 15.
    pub seeded: usize,
    /// Sky values written during propagation.
    pub writes: usize,
}

/// Sunlight flood fill over a [`VoxelManager`].
pub struct SunlightPropagator<'a> {
    voxels: &'a VoxelManager,
    blocks: &'a BlockRegistry,
    queue: VecDeque<VoxelPos>,
}

impl<'a> SunlightPropagator<'a> {
    pub fn new(voxels: &'a VoxelManager, blocks: &'a BlockRegistry) -> Self {
        Self {
            voxels,
            blocks,
            queue: VecDeque::new(),
        }
    }

    /// Seeds the top layer of the highest chunks and propagates to a fixpoint.
    pub fn initialize_sunlight(&mut self) -> SunlightStats {
        let start = Instant::now();
        let seeded = self.seed();
        let writes = self.propagate();
        tracing::info!(
            seeded,
            writes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "sunlight initialized"
        );
        SunlightStats { seeded, writes }
    }

    /// Lights every non-opaque slot at local Y 31 in each chunk at the
    /// maximum loaded chunk Y and queues it. Returns the number of slots lit.
    pub fn seed(&mut self) -> usize {
        let Some(top) = self.voxels.max_chunk_y() else {
            return 0;
        };

        let mut seeded = 0;
        for chunk in self.voxels.snapshot() {
            let position = chunk.position();
            if position.y != top {
                continue;
            }
            let mut storage = chunk.lock();
            for z in 0..CHUNK_SIZE as u8 {
                for x in 0..CHUNK_SIZE as u8 {
                    let local = LocalPos::new(x, CHUNK_SIZE as u8 - 1, z);
                    let index = local.index();
                    if self.blocks.is_opaque(storage.block_type(index)) {
                        continue;
                    }
                    let light = storage.light(index).with_sky(Light::MAX_LEVEL);
                    storage.set_light(index, light);
                    self.queue.push_back(VoxelPos::from_parts(position, local));
                    seeded += 1;
                }
            }
        }
        tracing::debug!(chunk_y = top, seeded, "sunlight seeded");
        seeded
    }

    /// Queues a single position for propagation.
    pub fn enqueue(&mut self, pos: VoxelPos) {
        self.queue.push_back(pos);
    }

    /// Queues every slot of `chunk` with a non-zero sky value. Returns the
    /// number queued, or 0 if the chunk is not loaded.
    pub fn enqueue_lit_slots(&mut self, chunk: ChunkPos) -> usize {
        let Some(chunk) = self.voxels.get_chunk(chunk) else {
            return 0;
        };
        let storage = chunk.read();
        let before = self.queue.len();
        for index in 0..CHUNK_VOLUME {
            if storage.light(index).sky() > 0 {
                self.queue
                    .push_back(VoxelPos::from_parts(chunk.position(), LocalPos::from_index(index)));
            }
        }
        self.queue.len() - before
    }

    /// Positions waiting to be processed.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drains the queue. Returns the number of sky values written.
    pub fn propagate(&mut self) -> usize {
        let mut writes = 0;
        while let Some(pos) = self.queue.pop_front() {
            writes += self.propagate_once(pos);
        }
        writes
    }

    fn propagate_once(&mut self, pos: VoxelPos) -> usize {
        let Some(current) = self.voxels.get_light(pos) else {
            return 0;
        };
        let sky = current.sky();

        let mut writes = 0;
        for direction in Direction::ALL {
            let neighbor = pos.neighbor(direction);
            let Some(block) = self.voxels.try_get_block(neighbor) else {
                continue;
            };
            if self.blocks.is_opaque(block.block_type) {
                continue;
            }
            if block.light.sky() + 2 > sky {
                continue;
            }

            let level = if sky == Light::MAX_LEVEL && direction == Direction::NegY {
                Light::MAX_LEVEL
            } else {
                sky - 1
            };
            self.voxels.set_light(neighbor, block.light.with_sky(level));
            self.queue.push_back(neighbor);
            writes += 1;
        }
        writes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
