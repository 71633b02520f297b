//! A 32×32×32 voxel volume with block and light channels behind one lock.
//!
//! [`ChunkStorage`] is the unsynchronized pair of palettes. [`Chunk`] wraps
//! it in a [`parking_lot::RwLock`] and adds the chunk's grid position.
//!
//! Per-voxel accessors on [`Chunk`] take the lock for a single access. To
//! batch many reads or writes, take the guard once with [`Chunk::read`] or
//! [`Chunk::lock`] and use the [`ChunkStorage`] methods through it. With
//! `&mut Chunk`, [`Chunk::storage_mut`] skips locking entirely.

use std::ptr;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::block::BlockType;
use crate::coords::{CHUNK_SIZE, CHUNK_VOLUME, ChunkPos, LocalPos, VoxelPos};
use crate::light::Light;
use crate::palette::Palette;

/// Block type and light of one voxel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub block_type: BlockType,
    pub light: Light,
}

// ---------------------------------------------------------------------------
// ChunkStorage
// ---------------------------------------------------------------------------

/// Block-type and light palettes for one chunk, indexed by slot.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkStorage {
    blocks: Palette<BlockType>,
    light: Palette<Light>,
}

impl ChunkStorage {
    /// All air, all dark.
    pub fn new() -> Self {
        Self {
            blocks: Palette::new(CHUNK_VOLUME),
            light: Palette::new(CHUNK_VOLUME),
        }
    }

    /// Builds storage from existing palettes. Both must have
    /// [`CHUNK_VOLUME`] slots.
    pub fn from_palettes(blocks: Palette<BlockType>, light: Palette<Light>) -> Self {
        debug_assert_eq!(blocks.len(), CHUNK_VOLUME);
        debug_assert_eq!(light.len(), CHUNK_VOLUME);
        Self { blocks, light }
    }

    pub fn block_type(&self, index: usize) -> BlockType {
        self.blocks.get(index)
    }

    pub fn light(&self, index: usize) -> Light {
        self.light.get(index)
    }

    /// Block type and light at `index`.
    pub fn block(&self, index: usize) -> Block {
        Block {
            block_type: self.blocks.get(index),
            light: self.light.get(index),
        }
    }

    pub fn set_block_type(&mut self, index: usize, block_type: BlockType) {
        self.blocks.set(index, block_type);
    }

    pub fn set_light(&mut self, index: usize, light: Light) {
        self.light.set(index, light);
    }

    /// Compacts both palettes.
    pub fn fit(&mut self) {
        self.blocks.fit();
        self.light.fit();
    }

    /// Block-type channel.
    pub fn blocks(&self) -> &Palette<BlockType> {
        &self.blocks
    }

    /// Light channel.
    pub fn lights(&self) -> &Palette<Light> {
        &self.light
    }

    /// Approximate heap usage of both channels, in bytes.
    pub fn storage_bytes(&self) -> usize {
        self.blocks.storage_bytes() + self.light.storage_bytes()
    }
}

impl Default for ChunkStorage {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A positioned chunk whose channels are guarded by one readers-writer lock.
#[derive(Debug)]
pub struct Chunk {
    position: ChunkPos,
    storage: RwLock<ChunkStorage>,
}

impl Chunk {
    /// Creates an all-air, all-dark chunk.
    pub fn new(position: ChunkPos) -> Self {
        Self::from_storage(position, ChunkStorage::new())
    }

    pub fn from_storage(position: ChunkPos, storage: ChunkStorage) -> Self {
        Self {
            position,
            storage: RwLock::new(storage),
        }
    }

    /// Grid position of this chunk.
    pub fn position(&self) -> ChunkPos {
        self.position
    }

    /// Inclusive world-space voxel bounds `(min, max)`.
    pub fn world_bounds(&self) -> (VoxelPos, VoxelPos) {
        let min = self.position.origin();
        let edge = CHUNK_SIZE as i32 - 1;
        (min, min.offset(edge, edge, edge))
    }

    /// Reads a block type under the shared lock.
    pub fn block_type_at(&self, pos: LocalPos) -> BlockType {
        self.storage.read().block_type(pos.index())
    }

    /// Reads a light value under the shared lock.
    pub fn light_at(&self, pos: LocalPos) -> Light {
        self.storage.read().light(pos.index())
    }

    /// Reads block type and light together under one shared lock.
    pub fn block_at(&self, pos: LocalPos) -> Block {
        self.storage.read().block(pos.index())
    }

    /// Writes a block type under the exclusive lock.
    pub fn set_block_type_at(&self, pos: LocalPos, block_type: BlockType) {
        self.storage.write().set_block_type(pos.index(), block_type);
    }

    /// Writes a light value under the exclusive lock.
    pub fn set_light_at(&self, pos: LocalPos, light: Light) {
        self.storage.write().set_light(pos.index(), light);
    }

    /// Holds the shared lock for a batch of reads.
    pub fn read(&self) -> RwLockReadGuard<'_, ChunkStorage> {
        self.storage.read()
    }

    /// Holds the exclusive lock for a batch of writes. Released on drop.
    pub fn lock(&self) -> RwLockWriteGuard<'_, ChunkStorage> {
        self.storage.write()
    }

    /// Direct access without locking; exclusivity comes from `&mut self`.
    pub fn storage_mut(&mut self) -> &mut ChunkStorage {
        self.storage.get_mut()
    }

    /// Unwraps the storage.
    pub fn into_storage(self) -> ChunkStorage {
        self.storage.into_inner()
    }
}

impl Clone for Chunk {
    fn clone(&self) -> Self {
        Self::from_storage(self.position, self.storage.read().clone())
    }
}

/// Same position and the same block type and light in every slot.
impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        if ptr::eq(self, other) {
            return true;
        }
        self.position == other.position && *self.storage.read() == *other.storage.read()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chunk_is_air_and_dark() {
        let chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        let storage = chunk.read();
        assert_eq!(storage.blocks().refcount(BlockType::Air), CHUNK_VOLUME as u32);
        assert_eq!(storage.lights().refcount(Light::DARK), CHUNK_VOLUME as u32);
        assert_eq!(storage.storage_bytes(), 2 * size_of::<crate::palette::PaletteEntry<u16>>());
    }

    #[test]
    fn test_locked_accessors() {
        let chunk = Chunk::new(ChunkPos::new(1, 2, 3));
        let pos = LocalPos::new(4, 5, 6);
        chunk.set_block_type_at(pos, BlockType::Stone);
        chunk.set_light_at(pos, Light::DARK.with_sky(7));
        assert_eq!(chunk.block_type_at(pos), BlockType::Stone);
        assert_eq!(chunk.light_at(pos).sky(), 7);
        assert_eq!(
            chunk.block_at(pos),
            Block {
                block_type: BlockType::Stone,
                light: Light::DARK.with_sky(7),
            }
        );
        assert_eq!(chunk.block_type_at(LocalPos::new(4, 5, 7)), BlockType::Air);
    }

    #[test]
    fn test_batch_write_through_guard() {
        let chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        {
            let mut storage = chunk.lock();
            for index in 0..CHUNK_SIZE * CHUNK_SIZE {
                storage.set_block_type(index, BlockType::Dirt);
            }
        }
        assert_eq!(chunk.read().blocks().refcount(BlockType::Dirt), 1024);
        assert_eq!(chunk.block_type_at(LocalPos::new(31, 31, 0)), BlockType::Dirt);
        assert_eq!(chunk.block_type_at(LocalPos::new(0, 0, 1)), BlockType::Air);
    }

    #[test]
    fn test_storage_mut_without_lock() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        chunk.storage_mut().set_block_type(0, BlockType::Sand);
        chunk.storage_mut().set_block_type(0, BlockType::Air);
        assert_eq!(chunk.read().blocks().entries().len(), 2);
        chunk.storage_mut().fit();
        assert_eq!(chunk.read().blocks().entries().len(), 1);
    }

    #[test]
    fn test_world_bounds() {
        let chunk = Chunk::new(ChunkPos::new(-1, 0, 2));
        let (min, max) = chunk.world_bounds();
        assert_eq!(min, VoxelPos::new(-32, 0, 64));
        assert_eq!(max, VoxelPos::new(-1, 31, 95));
    }

    #[test]
    fn test_equality_is_slot_wise() {
        let a = Chunk::new(ChunkPos::new(0, 0, 0));
        let b = Chunk::new(ChunkPos::new(0, 0, 0));
        a.set_block_type_at(LocalPos::new(0, 0, 0), BlockType::Grass);
        a.set_block_type_at(LocalPos::new(1, 0, 0), BlockType::Stone);
        b.set_block_type_at(LocalPos::new(1, 0, 0), BlockType::Stone);
        b.set_block_type_at(LocalPos::new(0, 0, 0), BlockType::Grass);
        assert_eq!(a, b);
        assert_eq!(a, a.clone());

        b.set_light_at(LocalPos::new(9, 9, 9), Light::DARK.with_sky(1));
        assert_ne!(a, b);
        assert_ne!(a, Chunk::new(ChunkPos::new(0, 1, 0)));
    }
}
