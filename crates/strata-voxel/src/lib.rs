//! Paletted voxel storage: bit-packed chunk channels, the chunk archive codec,
//! and the world-coordinate chunk registry.

pub mod bit_array;
pub mod block;
pub mod chunk;
pub mod chunk_codec;
pub mod coords;
pub mod delta;
pub mod light;
pub mod palette;
pub mod rle;
pub mod voxel_manager;

pub use bit_array::{BitArray, bits_needed};
pub use block::{BlockProperties, BlockRegistry, BlockType, RegistryError, Visibility};
pub use chunk::{Block, Chunk, ChunkStorage};
pub use chunk_codec::{ChannelValue, ChunkCodecError, SparseChannel};
pub use coords::{CHUNK_SIZE, CHUNK_VOLUME, ChunkPos, Direction, LocalPos, VoxelPos};
pub use light::Light;
pub use palette::{ConcurrentPalette, Palette, PaletteEntry, PaletteValue};
pub use rle::RleError;
pub use voxel_manager::VoxelManager;
