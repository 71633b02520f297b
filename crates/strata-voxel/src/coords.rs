//! World, chunk and chunk-local coordinates.
//!
//! A world voxel position splits into the chunk that owns it and a local
//! position inside that chunk. Splitting uses floor division, so negative
//! world coordinates map to negative chunks with non-negative local offsets.

use serde::{Deserialize, Serialize};

/// Side length of a chunk in voxels.
pub const CHUNK_SIZE: usize = 32;

/// Total number of voxels in a chunk (32³).
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

const CHUNK_SHIFT: u32 = 5;
const LOCAL_MASK: i32 = CHUNK_SIZE as i32 - 1;

/// World-space block position (unbounded).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelPos {
    /// World X.
    pub x: i32,
    /// World Y (up).
    pub y: i32,
    /// World Z.
    pub z: i32,
}

impl VoxelPos {
    /// Creates a new world position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing this voxel: `floor(pos / 32)` per axis.
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos::new(
            self.x >> CHUNK_SHIFT,
            self.y >> CHUNK_SHIFT,
            self.z >> CHUNK_SHIFT,
        )
    }

    /// Position inside the owning chunk: `pos mod 32` per axis.
    pub const fn local(self) -> LocalPos {
        LocalPos::new(
            (self.x & LOCAL_MASK) as u8,
            (self.y & LOCAL_MASK) as u8,
            (self.z & LOCAL_MASK) as u8,
        )
    }

    /// Splits into owning chunk and local position.
    pub const fn split(self) -> (ChunkPos, LocalPos) {
        (self.chunk(), self.local())
    }

    /// Inverse of [`split`](Self::split).
    pub fn from_parts(chunk: ChunkPos, local: LocalPos) -> Self {
        chunk.origin().offset(
            i32::from(local.x),
            i32::from(local.y),
            i32::from(local.z),
        )
    }

    /// Returns this position shifted by `(dx, dy, dz)`.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Returns the adjacent position in `direction`.
    pub const fn neighbor(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.offset();
        self.offset(dx, dy, dz)
    }
}

/// Chunk-grid position; one unit is one chunk edge (32 voxels).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChunkPos {
    /// Chunk X.
    pub x: i32,
    /// Chunk Y.
    pub y: i32,
    /// Chunk Z.
    pub z: i32,
}

impl ChunkPos {
    /// Creates a new chunk position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// World position of local `(0, 0, 0)`.
    pub const fn origin(self) -> VoxelPos {
        VoxelPos::new(
            self.x << CHUNK_SHIFT,
            self.y << CHUNK_SHIFT,
            self.z << CHUNK_SHIFT,
        )
    }

    /// Returns the chunk offset by `(dx, dy, dz)`.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// Position inside a chunk, each axis in `0..32`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalPos {
    /// Creates a local position. Each axis must be below 32.
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        debug_assert!((x as usize) < CHUNK_SIZE && (y as usize) < CHUNK_SIZE && (z as usize) < CHUNK_SIZE);
        Self { x, y, z }
    }

    /// Linear slot index, X fastest: `x + 32 * (y + 32 * z)`.
    pub const fn index(self) -> usize {
        self.x as usize + CHUNK_SIZE * (self.y as usize + CHUNK_SIZE * self.z as usize)
    }

    /// Inverse of [`index`](Self::index).
    pub const fn from_index(index: usize) -> Self {
        debug_assert!(index < CHUNK_VOLUME);
        Self {
            x: (index % CHUNK_SIZE) as u8,
            y: ((index / CHUNK_SIZE) % CHUNK_SIZE) as u8,
            z: (index / (CHUNK_SIZE * CHUNK_SIZE)) as u8,
        }
    }
}

/// One of the six axis-aligned neighbor directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Direction {
    /// All six directions.
    pub const ALL: [Direction; 6] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
        Direction::PosZ,
        Direction::NegZ,
    ];

    /// Unit offset `(dx, dy, dz)`.
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Direction::PosX => (1, 0, 0),
            Direction::NegX => (-1, 0, 0),
            Direction::PosY => (0, 1, 0),
            Direction::NegY => (0, -1, 0),
            Direction::PosZ => (0, 0, 1),
            Direction::NegZ => (0, 0, -1),
        }
    }
}
