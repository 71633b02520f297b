//! Central owner for all loaded chunks, keyed by [`ChunkPos`].
//!
//! The [`VoxelManager`] resolves world positions to a chunk plus a local
//! slot and forwards reads and writes to that chunk's lock. The map itself
//! is a sharded [`DashMap`], so creating a chunk is linearizable: concurrent
//! callers racing on one position all observe the same [`Arc<Chunk>`].
//!
//! Chunk handles are cloned out of the map before any chunk lock is taken,
//! so no shard lock is ever held while waiting on a chunk.

use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use crate::block::BlockType;
use crate::chunk::{Block, Chunk};
use crate::coords::{ChunkPos, VoxelPos};
use crate::light::Light;

/// Owns every loaded chunk and provides world-coordinate voxel access.
#[derive(Debug, Default)]
pub struct VoxelManager {
    chunks: DashMap<ChunkPos, Arc<Chunk>, FxBuildHasher>,
}

impl VoxelManager {
    /// Creates an empty manager with no loaded chunks.
    pub fn new() -> Self {
        Self {
            chunks: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Returns the chunk at `pos`, or `None` if it was never created.
    pub fn get_chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
        self.chunks.get(&pos).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains_chunk(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    /// Returns the chunk at `pos`, creating an empty one if absent.
    ///
    /// Concurrent calls for the same position return the same chunk.
    pub fn get_or_create_chunk(&self, pos: ChunkPos) -> Arc<Chunk> {
        let entry = self.chunks.entry(pos).or_insert_with(|| {
            tracing::trace!(x = pos.x, y = pos.y, z = pos.z, "chunk created");
            Arc::new(Chunk::new(pos))
        });
        Arc::clone(entry.value())
    }

    /// Inserts `chunk` at its own position, replacing any chunk already
    /// there. Returns the replaced chunk.
    pub fn insert_chunk(&self, chunk: Chunk) -> Option<Arc<Chunk>> {
        self.chunks.insert(chunk.position(), Arc::new(chunk))
    }

    /// Removes and returns the chunk at `pos`.
    ///
    /// Handles cloned earlier stay valid; the chunk is freed once the last
    /// one drops.
    pub fn unload_chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
        self.chunks.remove(&pos).map(|(_, chunk)| chunk)
    }

    /// Number of loaded chunks.
    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    /// Snapshot of every loaded chunk position, sorted.
    pub fn positions(&self) -> Vec<ChunkPos> {
        let mut positions: Vec<ChunkPos> = self.chunks.iter().map(|entry| *entry.key()).collect();
        positions.sort_unstable();
        positions
    }

    /// Snapshot of every loaded chunk handle, sorted by position.
    pub fn snapshot(&self) -> Vec<Arc<Chunk>> {
        let mut chunks: Vec<Arc<Chunk>> = self
            .chunks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        chunks.sort_unstable_by_key(|chunk| chunk.position());
        chunks
    }

    /// Highest chunk Y among loaded chunks.
    pub fn max_chunk_y(&self) -> Option<i32> {
        self.chunks.iter().map(|entry| entry.key().y).max()
    }

    /// Block type at `pos`, or `None` if its chunk is not loaded.
    pub fn get_block(&self, pos: VoxelPos) -> Option<BlockType> {
        let (chunk, local) = pos.split();
        self.get_chunk(chunk)
            .map(|chunk| chunk.block_type_at(local))
    }

    /// Block type and light at `pos`, or `None` if its chunk is not loaded.
    pub fn try_get_block(&self, pos: VoxelPos) -> Option<Block> {
        let (chunk, local) = pos.split();
        self.get_chunk(chunk).map(|chunk| chunk.block_at(local))
    }

    /// Light at `pos`, or `None` if its chunk is not loaded.
    pub fn get_light(&self, pos: VoxelPos) -> Option<Light> {
        let (chunk, local) = pos.split();
        self.get_chunk(chunk).map(|chunk| chunk.light_at(local))
    }

    /// Writes a block type. Returns `false` if the chunk is not loaded.
    pub fn set_block_type(&self, pos: VoxelPos, block_type: BlockType) -> bool {
        let (chunk_pos, local) = pos.split();
        match self.get_chunk(chunk_pos) {
            Some(chunk) => {
                chunk.set_block_type_at(local, block_type);
                true
            }
            None => {
                tracing::trace!(x = pos.x, y = pos.y, z = pos.z, "block write to unloaded chunk");
                false
            }
        }
    }

    /// Writes a light value. Returns `false` if the chunk is not loaded.
    pub fn set_light(&self, pos: VoxelPos, light: Light) -> bool {
        let (chunk_pos, local) = pos.split();
        match self.get_chunk(chunk_pos) {
            Some(chunk) => {
                chunk.set_light_at(local, light);
                true
            }
            None => {
                tracing::trace!(x = pos.x, y = pos.y, z = pos.z, "light write to unloaded chunk");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
