//! Compressed binary archive for a [`Chunk`].
//!
//! Each channel (block type, then light) is encoded independently:
//!
//! 1. Slots are scanned in groups of 8. Every group holding at least one
//!    non-empty value records its starting slot and an 8-bit mask of which
//!    slots are non-empty.
//! 2. The palette is compacted and its empty entry removed, together with
//!    every index that pointed at it.
//! 3. Group starts are delta coded, then run-length encoded. Masks are
//!    run-length encoded.
//! 4. Each section is LZ4 compressed and length prefixed.
//!
//! ## Archive layout
//!
//! | Size | Field |
//! |------|-------|
//! | 12 | Chunk position (3 × `i32` LE) |
//! | 4 + N | Block channel payload (`u32` LE length + bytes) |
//! | 4 + M | Light channel payload (`u32` LE length + bytes) |
//!
//! ## Channel payload layout
//!
//! | Size | Field |
//! |------|-------|
//! | 4 | Group count (`u32` LE) |
//! | 4 | Non-empty slot count (`u32` LE) |
//! | 1 | Index bit width |
//! | 4 + … | LZ4(RLE(delta(group starts))) |
//! | 4 + … | LZ4(RLE(group masks)) |
//! | 4 + … | LZ4(dictionary: `u16` count, then `u16` value + `u32` refcount per entry) |
//! | 4 + … | LZ4(packed index bytes) |

use crate::bit_array::{BitArray, bits_needed};
use crate::block::BlockType;
use crate::chunk::{Chunk, ChunkStorage};
use crate::coords::{CHUNK_VOLUME, ChunkPos};
use crate::delta::{delta_decode, delta_encode};
use crate::light::Light;
use crate::palette::{Palette, PaletteEntry, PaletteValue};
use crate::rle::{RleError, rle_decode, rle_encode, rle_from_bytes, rle_to_bytes};

/// Slots per sparse group; one bit of a group mask each.
const GROUP_SIZE: usize = 8;

/// Number of groups in a chunk channel.
const GROUP_COUNT: usize = CHUNK_VOLUME / GROUP_SIZE;

/// Upper bound on any decompressed section.
const MAX_SECTION_BYTES: usize = 1 << 20;

/// Errors that can occur while decoding a chunk archive.
#[derive(Debug, thiserror::Error)]
pub enum ChunkCodecError {
    /// The data is shorter than a length field or prefix claims.
    #[error("data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Byte count required.
        expected: usize,
        /// Byte count available.
        actual: usize,
    },
    /// Bytes remain after the light channel.
    #[error("{0} trailing bytes after archive")]
    TrailingBytes(usize),
    /// LZ4 rejected a section.
    #[error("decompression failed: {0}")]
    Decompress(String),
    /// A run-length stream is malformed.
    #[error(transparent)]
    Rle(#[from] RleError),
    /// A block dictionary entry has no matching [`BlockType`].
    #[error("unknown block type id {0}")]
    UnknownBlockType(u16),
    /// Index width is too wide or does not match the dictionary size.
    #[error("invalid index bit width {bits} for {entries} dictionary entries")]
    InvalidBitWidth {
        /// Stored width.
        bits: u8,
        /// Dictionary size.
        entries: usize,
    },
    /// A group start is misaligned, out of range or out of order.
    #[error("invalid group start {0}")]
    InvalidGroupStart(u16),
    /// Group masks and the index array disagree on the number of slots.
    #[error("{channel} channel: masks cover {masked} slots, index array has {stored}")]
    SlotCountMismatch {
        /// Channel name.
        channel: &'static str,
        /// Bits set across all masks.
        masked: usize,
        /// Length of the index array.
        stored: usize,
    },
    /// A stored index points past the dictionary.
    #[error("palette index {index} out of range for {entries} entries")]
    IndexOutOfRange {
        /// Stored index.
        index: u16,
        /// Dictionary size.
        entries: usize,
    },
    /// A dictionary refcount disagrees with the rebuilt slots.
    #[error("{channel} channel: entry {entry} claims {stored} slots, found {counted}")]
    RefcountMismatch {
        /// Channel name.
        channel: &'static str,
        /// Dictionary position.
        entry: usize,
        /// Refcount from the archive.
        stored: u32,
        /// Slots actually referencing the entry.
        counted: u32,
    },
}

// ---------------------------------------------------------------------------
// Channel values
// ---------------------------------------------------------------------------

/// A palette value that can be written to a channel payload.
pub trait ChannelValue: PaletteValue {
    /// Channel name used in error messages.
    const NAME: &'static str;
    /// Value treated as "nothing here" and left out of the payload.
    const EMPTY: Self;

    fn to_raw(self) -> u16;

    fn from_raw(raw: u16) -> Result<Self, ChunkCodecError>;
}

impl ChannelValue for BlockType {
    const NAME: &'static str = "block";
    const EMPTY: Self = BlockType::Air;

    fn to_raw(self) -> u16 {
        self.id()
    }

    fn from_raw(raw: u16) -> Result<Self, ChunkCodecError> {
        BlockType::from_id(raw).ok_or(ChunkCodecError::UnknownBlockType(raw))
    }
}

impl ChannelValue for Light {
    const NAME: &'static str = "light";
    const EMPTY: Self = Light::DARK;

    fn to_raw(self) -> u16 {
        self.raw()
    }

    fn from_raw(raw: u16) -> Result<Self, ChunkCodecError> {
        Ok(Light::from_raw(raw))
    }
}

// ---------------------------------------------------------------------------
// Sparse channel
// ---------------------------------------------------------------------------

/// The non-empty part of one channel: which slots hold a value, the
/// dictionary without its empty entry, and one index per non-empty slot.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseChannel<T> {
    group_starts: Vec<u16>,
    bitmasks: Vec<u8>,
    entries: Vec<PaletteEntry<T>>,
    indices: BitArray,
}

impl<T: ChannelValue> SparseChannel<T> {
    /// Extracts the non-empty slots of `palette`.
    pub fn extract(palette: &Palette<T>) -> Self {
        let mut channel = Self::scan(palette);
        channel.remove_empty();
        channel
    }

    /// Builds group starts and masks from a compacted copy of `palette`,
    /// keeping the full dictionary and index array.
    fn scan(palette: &Palette<T>) -> Self {
        debug_assert_eq!(palette.len(), CHUNK_VOLUME);
        let mut palette = palette.clone();
        palette.fit();

        let mut group_starts = Vec::new();
        let mut bitmasks = Vec::new();
        for group in 0..GROUP_COUNT {
            let start = group * GROUP_SIZE;
            let mut mask = 0u8;
            for bit in 0..GROUP_SIZE {
                if palette.get(start + bit) != T::EMPTY {
                    mask |= 1 << bit;
                }
            }
            if mask != 0 {
                group_starts.push(start as u16);
                bitmasks.push(mask);
            }
        }

        Self {
            group_starts,
            bitmasks,
            entries: palette.entries().to_vec(),
            indices: palette.indices().clone(),
        }
    }

    /// Drops the empty dictionary entry and every index referencing it,
    /// renumbering the remaining indices. Returns the number of slots removed.
    fn remove_empty(&mut self) -> u32 {
        let Some(empty) = self.entries.iter().position(|e| e.value == T::EMPTY) else {
            return 0;
        };
        let prior_refcount = self.entries[empty].refcount;

        let kept = self.indices.find_all(1, |index| index as usize != empty);
        let removed = (self.indices.len() - kept.len()) as u32;
        debug_assert_eq!(
            removed, prior_refcount,
            "removed slot count must equal the empty entry's refcount"
        );

        self.entries.remove(empty);
        let mut indices = BitArray::new(bits_needed(self.entries.len()), kept.len());
        if indices.bits() > 0 {
            for (slot, index) in kept.iter().enumerate() {
                let renumbered = if index as usize > empty { index - 1 } else { index };
                indices.set(slot, renumbered);
            }
        }
        self.indices = indices;
        removed
    }

    /// Starting slot of every non-empty group, ascending.
    pub fn group_starts(&self) -> &[u16] {
        &self.group_starts
    }

    /// One mask per group; bit `n` marks slot `start + n` as non-empty.
    pub fn bitmasks(&self) -> &[u8] {
        &self.bitmasks
    }

    /// Dictionary of non-empty values.
    pub fn entries(&self) -> &[PaletteEntry<T>] {
        &self.entries
    }

    /// Number of non-empty slots.
    pub fn live_slots(&self) -> usize {
        self.indices.len()
    }

    /// Serializes to a channel payload.
    pub fn encode(&self) -> Vec<u8> {
        let starts = rle_to_bytes(&rle_encode(&delta_encode(&self.group_starts)));
        let masks = rle_to_bytes(&rle_encode(&self.bitmasks));

        let mut dictionary = Vec::with_capacity(2 + self.entries.len() * 6);
        dictionary.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for entry in &self.entries {
            dictionary.extend_from_slice(&entry.value.to_raw().to_le_bytes());
            dictionary.extend_from_slice(&entry.refcount.to_le_bytes());
        }

        let mut out = Vec::new();
        out.extend_from_slice(&(self.group_starts.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.indices.len() as u32).to_le_bytes());
        out.push(self.indices.bits());
        for section in [starts, masks, dictionary, self.indices.to_bytes()] {
            write_section(&mut out, &lz4_flex::compress_prepend_size(&section));
        }
        out
    }

    /// Parses a channel payload produced by [`encode`](Self::encode).
    pub fn decode(payload: &[u8]) -> Result<Self, ChunkCodecError> {
        let mut reader = ByteReader::new(payload);
        let group_count = reader.u32()? as usize;
        let live_slots = reader.u32()? as usize;
        let bits = reader.u8()?;
        if group_count > GROUP_COUNT || live_slots > CHUNK_VOLUME {
            return Err(ChunkCodecError::SlotCountMismatch {
                channel: T::NAME,
                masked: group_count * GROUP_SIZE,
                stored: live_slots,
            });
        }

        let starts = decompress(reader.section()?)?;
        let group_starts = delta_decode(&rle_decode(&rle_from_bytes::<u16>(&starts)?, group_count)?);

        let masks = decompress(reader.section()?)?;
        let bitmasks = rle_decode(&rle_from_bytes::<u8>(&masks)?, group_count)?;

        let dictionary = decompress(reader.section()?)?;
        let entries = parse_dictionary::<T>(&dictionary)?;

        let index_bytes = decompress(reader.section()?)?;
        reader.finish()?;

        if bits != bits_needed(entries.len()) {
            return Err(ChunkCodecError::InvalidBitWidth {
                bits,
                entries: entries.len(),
            });
        }
        let indices = BitArray::from_bytes(bits, live_slots, &index_bytes).ok_or(
            ChunkCodecError::Truncated {
                expected: (live_slots * bits as usize).div_ceil(8),
                actual: index_bytes.len(),
            },
        )?;

        let masked: usize = bitmasks.iter().map(|mask| mask.count_ones() as usize).sum();
        if masked != live_slots {
            return Err(ChunkCodecError::SlotCountMismatch {
                channel: T::NAME,
                masked,
                stored: live_slots,
            });
        }

        Ok(Self {
            group_starts,
            bitmasks,
            entries,
            indices,
        })
    }

    /// Rebuilds the dense palette, filling unmasked slots with the empty
    /// value and checking every refcount against the slots written.
    pub fn rebuild(&self) -> Result<Palette<T>, ChunkCodecError> {
        let mut palette = Palette::filled(CHUNK_VOLUME, T::EMPTY);
        let mut counted = vec![0u32; self.entries.len()];
        let mut cursor = 0;
        let mut next_free = 0usize;

        for (&start, &mask) in self.group_starts.iter().zip(&self.bitmasks) {
            let first = start as usize;
            if first % GROUP_SIZE != 0 || first >= CHUNK_VOLUME || first < next_free {
                return Err(ChunkCodecError::InvalidGroupStart(start));
            }
            next_free = first + GROUP_SIZE;

            for bit in 0..GROUP_SIZE {
                if mask & (1 << bit) == 0 {
                    continue;
                }
                let index = self.indices.get(cursor);
                let entry = self.entries.get(index as usize).ok_or(
                    ChunkCodecError::IndexOutOfRange {
                        index,
                        entries: self.entries.len(),
                    },
                )?;
                palette.set(first + bit, entry.value);
                counted[index as usize] += 1;
                cursor += 1;
            }
        }

        for (entry, (stored, counted)) in self
            .entries
            .iter()
            .map(|e| e.refcount)
            .zip(counted)
            .enumerate()
        {
            if stored != counted {
                return Err(ChunkCodecError::RefcountMismatch {
                    channel: T::NAME,
                    entry,
                    stored,
                    counted,
                });
            }
        }

        palette.fit();
        Ok(palette)
    }
}

fn parse_dictionary<T: ChannelValue>(bytes: &[u8]) -> Result<Vec<PaletteEntry<T>>, ChunkCodecError> {
    let mut reader = ByteReader::new(bytes);
    let count = reader.u16()? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let value = T::from_raw(reader.u16()?)?;
        let refcount = reader.u32()?;
        entries.push(PaletteEntry { value, refcount });
    }
    reader.finish()?;
    Ok(entries)
}

fn write_section(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn decompress(section: &[u8]) -> Result<Vec<u8>, ChunkCodecError> {
    let Some(prefix) = section.get(..4) else {
        return Err(ChunkCodecError::Truncated {
            expected: 4,
            actual: section.len(),
        });
    };
    let claimed = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if claimed > MAX_SECTION_BYTES {
        return Err(ChunkCodecError::Decompress(format!(
            "section claims {claimed} bytes, limit is {MAX_SECTION_BYTES}"
        )));
    }
    lz4_flex::decompress_size_prepended(section)
        .map_err(|e| ChunkCodecError::Decompress(e.to_string()))
}

// ---------------------------------------------------------------------------
// Chunk archive
// ---------------------------------------------------------------------------

impl Chunk {
    /// Encodes this chunk into a compressed archive under one shared lock.
    pub fn encode(&self) -> Vec<u8> {
        let storage = self.read();
        let blocks = SparseChannel::extract(storage.blocks()).encode();
        let light = SparseChannel::extract(storage.lights()).encode();
        drop(storage);

        let position = self.position();
        let mut out = Vec::with_capacity(12 + 8 + blocks.len() + light.len());
        for axis in [position.x, position.y, position.z] {
            out.extend_from_slice(&axis.to_le_bytes());
        }
        write_section(&mut out, &blocks);
        write_section(&mut out, &light);

        tracing::trace!(
            x = position.x,
            y = position.y,
            z = position.z,
            block_bytes = blocks.len(),
            light_bytes = light.len(),
            "chunk encoded"
        );
        out
    }

    /// Decodes an archive produced by [`encode`](Self::encode).
    pub fn decode(data: &[u8]) -> Result<Chunk, ChunkCodecError> {
        let mut reader = ByteReader::new(data);
        let position = ChunkPos::new(reader.i32()?, reader.i32()?, reader.i32()?);
        let blocks = SparseChannel::<BlockType>::decode(reader.section()?)?.rebuild()?;
        let light = SparseChannel::<Light>::decode(reader.section()?)?.rebuild()?;
        reader.finish()?;
        Ok(Chunk::from_storage(
            position,
            ChunkStorage::from_palettes(blocks, light),
        ))
    }
}

/// Little-endian cursor over a byte slice.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ChunkCodecError> {
        let end = self.pos + len;
        let bytes = self.data.get(self.pos..end).ok_or(ChunkCodecError::Truncated {
            expected: end,
            actual: self.data.len(),
        })?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ChunkCodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ChunkCodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ChunkCodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32, ChunkCodecError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a `u32` length prefix and that many bytes.
    fn section(&mut self) -> Result<&'a [u8], ChunkCodecError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn finish(&self) -> Result<(), ChunkCodecError> {
        match self.data.len() - self.pos {
            0 => Ok(()),
            extra => Err(ChunkCodecError::TrailingBytes(extra)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::coords::LocalPos;

    fn assert_slots_equal(a: &Chunk, b: &Chunk) {
        assert_eq!(a.position(), b.position());
        let (a, b) = (a.read(), b.read());
        for index in 0..CHUNK_VOLUME {
            assert_eq!(a.block_type(index), b.block_type(index), "block mismatch at {index}");
            assert_eq!(a.light(index), b.light(index), "light mismatch at {index}");
        }
    }

    #[test]
    fn test_random_chunk_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for density in [0.001f64, 0.1, 0.7, 1.0] {
            let chunk = Chunk::new(ChunkPos::new(-4, 2, 9));
            {
                let mut storage = chunk.lock();
                for index in 0..CHUNK_VOLUME {
                    if rng.random_bool(density) {
                        let id = rng.random_range(1..BlockType::COUNT as u16);
                        storage.set_block_type(index, BlockType::ALL[id as usize]);
                    }
                    if rng.random_bool(density) {
                        storage.set_light(
                            index,
                            Light::new(
                                rng.random_range(0..16),
                                rng.random_range(0..16),
                                rng.random_range(0..16),
                                rng.random_range(0..16),
                            ),
                        );
                    }
                }
            }

            let bytes = chunk.encode();
            let decoded = Chunk::decode(&bytes)
                .unwrap_or_else(|e| panic!("decode failed at density {density}: {e}"));
            assert_slots_equal(&chunk, &decoded);
            assert_eq!(chunk, decoded);
        }
    }

    #[test]
    fn test_empty_chunk_roundtrip_is_small() {
        let chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        let bytes = chunk.encode();
        assert!(bytes.len() < 256, "empty chunk encoded to {} bytes", bytes.len());
        let decoded = Chunk::decode(&bytes).expect("decode");
        assert_slots_equal(&chunk, &decoded);
    }

    #[test]
    fn test_single_block_compacts_to_one_entry() {
        let chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        chunk.set_block_type_at(LocalPos::new(3, 7, 1), BlockType::Metal);

        let storage = chunk.read();
        let mut channel = SparseChannel::scan(storage.blocks());
        assert_eq!(channel.entries().len(), 2);
        let removed = channel.remove_empty();
        assert_eq!(removed, CHUNK_VOLUME as u32 - 1);
        assert_eq!(channel.entries().len(), 1);
        assert_eq!(channel.entries()[0].value, BlockType::Metal);
        assert_eq!(channel.group_starts().len(), 1);
        assert_eq!(channel.live_slots(), 1);

        let index = LocalPos::new(3, 7, 1).index();
        assert_eq!(channel.group_starts()[0] as usize, index - index % GROUP_SIZE);
        assert_eq!(channel.bitmasks()[0], 1 << (index % GROUP_SIZE));
        drop(storage);

        let decoded = Chunk::decode(&chunk.encode()).expect("decode");
        assert_eq!(decoded.block_type_at(LocalPos::new(3, 7, 1)), BlockType::Metal);
        assert_eq!(decoded.read().blocks().refcount(BlockType::Metal), 1);
    }

    #[test]
    fn test_solid_chunk_has_no_empty_entry() {
        let chunk = Chunk::new(ChunkPos::new(1, 1, 1));
        {
            let mut storage = chunk.lock();
            for index in 0..CHUNK_VOLUME {
                storage.set_block_type(index, BlockType::Stone);
            }
        }
        let channel = SparseChannel::extract(chunk.read().blocks());
        assert_eq!(channel.entries().len(), 1);
        assert_eq!(channel.live_slots(), CHUNK_VOLUME);
        assert_eq!(channel.group_starts().len(), GROUP_COUNT);
        assert!(channel.bitmasks().iter().all(|&mask| mask == 0xFF));

        let decoded = Chunk::decode(&chunk.encode()).expect("decode");
        assert_eq!(decoded, chunk);
        assert_eq!(decoded.read().blocks().bits(), 0);
    }

    #[test]
    fn test_holes_do_not_leak_into_archive() {
        let chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        chunk.set_block_type_at(LocalPos::new(0, 0, 0), BlockType::Snow);
        chunk.set_block_type_at(LocalPos::new(1, 0, 0), BlockType::Sand);
        chunk.set_block_type_at(LocalPos::new(0, 0, 0), BlockType::Air);

        let channel = SparseChannel::extract(chunk.read().blocks());
        assert_eq!(channel.entries().len(), 1);
        assert_eq!(channel.entries()[0].value, BlockType::Sand);
        assert_eq!(Chunk::decode(&chunk.encode()).expect("decode"), chunk);
    }

    #[test]
    fn test_truncated_archive_is_rejected() {
        let chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        chunk.set_block_type_at(LocalPos::new(9, 9, 9), BlockType::Water);
        let bytes = chunk.encode();

        assert!(matches!(
            Chunk::decode(&bytes[..6]),
            Err(ChunkCodecError::Truncated { expected: 8, actual: 6 })
        ));
        for cut in [12, 20, bytes.len() / 2, bytes.len() - 1] {
            assert!(Chunk::decode(&bytes[..cut]).is_err(), "cut at {cut} accepted");
        }
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = Chunk::new(ChunkPos::new(0, 0, 0)).encode();
        bytes.push(0);
        assert!(matches!(
            Chunk::decode(&bytes),
            Err(ChunkCodecError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_unknown_block_id_is_rejected() {
        let mut palette = Palette::new(CHUNK_VOLUME);
        palette.set(0, Light::from_raw(999));
        let payload = SparseChannel::extract(&palette).encode();
        assert!(matches!(
            SparseChannel::<BlockType>::decode(&payload),
            Err(ChunkCodecError::UnknownBlockType(999))
        ));
    }

    #[test]
    fn test_refcount_mismatch_is_rejected() {
        let chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        chunk.set_block_type_at(LocalPos::new(0, 0, 0), BlockType::Dirt);
        chunk.set_block_type_at(LocalPos::new(5, 0, 0), BlockType::Dirt);
        let mut channel = SparseChannel::extract(chunk.read().blocks());
        channel.entries[0].refcount = 3;
        let decoded = SparseChannel::<BlockType>::decode(&channel.encode()).expect("well formed");
        assert!(matches!(
            decoded.rebuild(),
            Err(ChunkCodecError::RefcountMismatch { stored: 3, counted: 2, .. })
        ));
    }
}
