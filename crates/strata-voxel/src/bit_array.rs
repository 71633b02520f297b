//! Packed array of fixed-width unsigned integers.
//!
//! Each element occupies exactly `bits` bits (0 through 16). Elements are
//! packed back to back into `u64` words and may straddle a word boundary.
//! A zero-width array stores nothing and reads back zero everywhere.

use serde::{Deserialize, Serialize};

/// Widest element supported by [`BitArray`].
pub const MAX_BITS: u8 = 16;

/// Returns the minimum bit width able to address `count` distinct indices,
/// i.e. `ceil(log2(max(1, count)))`.
pub fn bits_needed(count: usize) -> u8 {
    if count <= 1 {
        0
    } else {
        (usize::BITS - (count - 1).leading_zeros()) as u8
    }
}

/// A compact array where each element is stored using a fixed number of bits.
///
/// Two arrays are equal when they have the same width, the same length and
/// the same packed content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitArray {
    /// Raw storage. Bits past `len * bits` are always zero.
    data: Vec<u64>,
    /// Bits per element.
    bits: u8,
    /// Total number of logical elements.
    len: usize,
}

impl BitArray {
    /// Creates a new array with `len` elements, all zero.
    pub fn new(bits: u8, len: usize) -> Self {
        debug_assert!(bits <= MAX_BITS, "bit width {bits} exceeds {MAX_BITS}");
        Self {
            data: vec![0u64; word_count(bits, len)],
            bits,
            len,
        }
    }

    /// Returns the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len` in debug builds.
    pub fn get(&self, index: usize) -> u16 {
        debug_assert!(index < self.len, "index {index} out of bounds (len {})", self.len);
        if self.bits == 0 {
            return 0;
        }
        let bits = u32::from(self.bits);
        let bit_index = index * self.bits as usize;
        let word = bit_index / 64;
        let offset = (bit_index % 64) as u32;

        let mut value = self.data[word] >> offset;
        if offset + bits > 64 {
            value |= self.data[word + 1] << (64 - offset);
        }
        (value & self.mask()) as u16
    }

    /// Stores `value` at `index`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `index >= len` or `value` does not fit in
    /// the current width.
    pub fn set(&mut self, index: usize, value: u16) {
        debug_assert!(index < self.len, "index {index} out of bounds (len {})", self.len);
        if self.bits == 0 {
            debug_assert!(value == 0, "value {value} exceeds 0-bit capacity");
            return;
        }
        let mask = self.mask();
        debug_assert!(
            u64::from(value) <= mask,
            "value {value} exceeds {}-bit capacity",
            self.bits
        );
        let value = u64::from(value) & mask;
        let bits = u32::from(self.bits);
        let bit_index = index * self.bits as usize;
        let word = bit_index / 64;
        let offset = (bit_index % 64) as u32;

        self.data[word] &= !(mask << offset);
        self.data[word] |= value << offset;
        if offset + bits > 64 {
            let spill = offset + bits - 64;
            let high_mask = (1u64 << spill) - 1;
            self.data[word + 1] &= !high_mask;
            self.data[word + 1] |= value >> (64 - offset);
        }
    }

    /// Returns a copy of this array re-packed at `new_bits` per element.
    ///
    /// Every element must fit in the new width; shrinking below the widest
    /// stored value is a caller bug.
    pub fn repacked(&self, new_bits: u8) -> Self {
        let mut out = Self::new(new_bits, self.len);
        if new_bits > 0 {
            for (index, value) in self.iter().enumerate() {
                out.set(index, value);
            }
        }
        out
    }

    /// Returns a new array holding only the `stride`-sized groups whose
    /// leading element satisfies `predicate`, in their original order.
    ///
    /// `len` must be a multiple of `stride`. The result keeps this array's
    /// bit width.
    pub fn find_all(&self, stride: usize, predicate: impl Fn(u16) -> bool) -> Self {
        debug_assert!(stride > 0, "stride must be non-zero");
        debug_assert!(
            self.len % stride == 0,
            "len {} is not a multiple of stride {stride}",
            self.len
        );
        let kept: Vec<usize> = (0..self.len)
            .step_by(stride)
            .filter(|&start| predicate(self.get(start)))
            .collect();

        let mut out = Self::new(self.bits, kept.len() * stride);
        if self.bits == 0 {
            return out;
        }
        let mut cursor = 0;
        for start in kept {
            for offset in 0..stride {
                out.set(cursor, self.get(start + offset));
                cursor += 1;
            }
        }
        out
    }

    /// Iterates over every element in index order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.len).map(move |index| self.get(index))
    }

    /// Returns the number of bits per element.
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Returns the number of logical elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the size of the backing storage in bytes.
    pub fn storage_bytes(&self) -> usize {
        self.data.len() * 8
    }

    /// Returns the packed content as little-endian bytes, trimmed to
    /// `ceil(len * bits / 8)`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let byte_len = byte_count(self.bits, self.len);
        let mut out = Vec::with_capacity(self.data.len() * 8);
        for word in &self.data {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.truncate(byte_len);
        out
    }

    /// Rebuilds an array from [`to_bytes`](Self::to_bytes) output.
    ///
    /// Returns `None` if `bits` is wider than [`MAX_BITS`] or `bytes` is too
    /// short for `len` elements. Bits past the last element are cleared.
    pub fn from_bytes(bits: u8, len: usize, bytes: &[u8]) -> Option<Self> {
        if bits > MAX_BITS {
            return None;
        }
        let byte_len = byte_count(bits, len);
        let bytes = bytes.get(..byte_len)?;

        let mut data = Vec::with_capacity(word_count(bits, len));
        for chunk in bytes.chunks(8) {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            data.push(u64::from_le_bytes(word));
        }

        let used_bits = len * bits as usize;
        if used_bits % 64 != 0
            && let Some(last) = data.last_mut()
        {
            *last &= (1u64 << (used_bits % 64)) - 1;
        }
        Some(Self { data, bits, len })
    }

    fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }
}

fn word_count(bits: u8, len: usize) -> usize {
    (len * bits as usize).div_ceil(64)
}

fn byte_count(bits: u8, len: usize) -> usize {
    (len * bits as usize).div_ceil(8)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_bit_array() {
        let arr = BitArray::new(0, 100);
        assert_eq!(arr.get(0), 0);
        assert_eq!(arr.get(99), 0);
        assert_eq!(arr.storage_bytes(), 0);
        assert!(arr.to_bytes().is_empty());
    }

    #[test]
    fn test_bits_needed() {
        assert_eq!(bits_needed(0), 0);
        assert_eq!(bits_needed(1), 0);
        assert_eq!(bits_needed(2), 1);
        assert_eq!(bits_needed(3), 2);
        assert_eq!(bits_needed(4), 2);
        assert_eq!(bits_needed(5), 3);
        assert_eq!(bits_needed(16), 4);
        assert_eq!(bits_needed(17), 5);
        assert_eq!(bits_needed(32_768), 15);
    }

    #[test]
    fn test_odd_widths_straddle_words() {
        for bits in [1u8, 3, 5, 7, 11, 13, 16] {
            let max = (1u32 << bits) - 1;
            let mut arr = BitArray::new(bits, 200);
            for i in 0..200 {
                arr.set(i, ((i as u32 * 7919) % (max + 1)) as u16);
            }
            for i in 0..200 {
                assert_eq!(
                    arr.get(i),
                    ((i as u32 * 7919) % (max + 1)) as u16,
                    "mismatch at {i} for {bits}-bit array"
                );
            }
        }
    }

    #[test]
    fn test_set_does_not_disturb_neighbors() {
        let mut arr = BitArray::new(5, 64);
        for i in 0..64 {
            arr.set(i, 31);
        }
        arr.set(12, 0); // bits 60..65 cross the first word boundary
        assert_eq!(arr.get(11), 31);
        assert_eq!(arr.get(12), 0);
        assert_eq!(arr.get(13), 31);
    }

    #[test]
    fn test_repack_preserves_values() {
        let mut arr = BitArray::new(3, 1000);
        for i in 0..1000 {
            arr.set(i, (i % 8) as u16);
        }
        let wide = arr.repacked(9);
        assert_eq!(wide.bits(), 9);
        let narrow = wide.repacked(3);
        for i in 0..1000 {
            assert_eq!(wide.get(i), (i % 8) as u16);
        }
        assert_eq!(narrow, arr);
    }

    #[test]
    fn test_repack_from_zero_width() {
        let arr = BitArray::new(0, 64);
        let grown = arr.repacked(1);
        assert_eq!(grown.bits(), 1);
        assert!(grown.iter().all(|v| v == 0));
    }

    #[test]
    fn test_find_all_filters_elements() {
        let mut arr = BitArray::new(2, 10);
        let values = [0u16, 1, 2, 0, 3, 0, 1, 0, 2, 3];
        for (i, &v) in values.iter().enumerate() {
            arr.set(i, v);
        }
        let kept = arr.find_all(1, |v| v != 0);
        assert_eq!(kept.len(), 6);
        assert_eq!(kept.bits(), 2);
        assert_eq!(kept.iter().collect::<Vec<_>>(), vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_find_all_with_stride_keeps_whole_groups() {
        let mut arr = BitArray::new(4, 8);
        let values = [1u16, 9, 0, 8, 1, 7, 0, 6];
        for (i, &v) in values.iter().enumerate() {
            arr.set(i, v);
        }
        let kept = arr.find_all(2, |lead| lead == 1);
        assert_eq!(kept.iter().collect::<Vec<_>>(), vec![1, 9, 1, 7]);
    }

    #[test]
    fn test_bytes_roundtrip_equality() {
        let mut arr = BitArray::new(7, 333);
        for i in 0..333 {
            arr.set(i, (i % 128) as u16);
        }
        let bytes = arr.to_bytes();
        assert_eq!(bytes.len(), (333 * 7usize).div_ceil(8));
        let restored = BitArray::from_bytes(7, 333, &bytes).expect("enough bytes");
        assert_eq!(restored, arr);
    }

    #[test]
    fn test_from_bytes_rejects_short_input() {
        assert!(BitArray::from_bytes(4, 100, &[0u8; 10]).is_none());
        assert!(BitArray::from_bytes(17, 1, &[0u8; 8]).is_none());
    }

    #[test]
    fn test_storage_sizes() {
        // 32768 voxels at 1 bit = 4096 bytes
        assert_eq!(BitArray::new(1, 32_768).storage_bytes(), 4_096);
        // 32768 voxels at 5 bits = 20480 bytes
        assert_eq!(BitArray::new(5, 32_768).storage_bytes(), 20_480);
    }
}
