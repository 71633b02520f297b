//! Dictionary-compressed value-per-slot storage.
//!
//! A [`Palette`] keeps a small list of distinct values, each with the number
//! of slots that reference it, plus a [`BitArray`] of indices into that list.
//! The index width is always the minimum able to address every dictionary
//! entry, so a uniform palette stores no index bits at all.
//!
//! Entries whose refcount drops to zero stay in the dictionary as reusable
//! holes until [`Palette::fit`] compacts them away.

use std::fmt;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::bit_array::{BitArray, bits_needed};

/// Values that can be stored in a [`Palette`].
pub trait PaletteValue: Copy + PartialEq + Default + fmt::Debug {}

impl<T: Copy + PartialEq + Default + fmt::Debug> PaletteValue for T {}

/// One dictionary slot: a value and the number of slots referencing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry<T> {
    /// The stored value.
    pub value: T,
    /// Number of slots whose index points at this entry.
    pub refcount: u32,
}

/// Fixed-length array of `T` stored as palette indices.
///
/// Invariants:
/// - refcounts sum to [`len`](Self::len);
/// - no two entries hold equal values;
/// - the index width equals `bits_needed(entries.len())`.
#[derive(Clone, Debug)]
pub struct Palette<T> {
    entries: Vec<PaletteEntry<T>>,
    indices: BitArray,
}

impl<T: PaletteValue> Palette<T> {
    /// Creates a palette of `len` slots holding `T::default()`.
    pub fn new(len: usize) -> Self {
        Self::filled(len, T::default())
    }

    /// Creates a palette of `len` slots all holding `value`.
    pub fn filled(len: usize, value: T) -> Self {
        Self {
            entries: vec![PaletteEntry {
                value,
                refcount: len as u32,
            }],
            indices: BitArray::new(0, len),
        }
    }

    /// Returns the value stored at `index`.
    pub fn get(&self, index: usize) -> T {
        self.entries[self.indices.get(index) as usize].value
    }

    /// Stores `value` at `index`.
    ///
    /// Setting a slot to the value it already holds is a no-op. A new
    /// dictionary entry reuses a zero-refcount hole when one exists and
    /// otherwise widens the index array once the dictionary outgrows it.
    pub fn set(&mut self, index: usize, value: T) {
        let current = self.indices.get(index) as usize;
        if self.entries[current].value == value {
            return;
        }

        self.entries[current].refcount -= 1;
        let target = match self.position(value) {
            Some(existing) => existing,
            None if self.entries[current].refcount == 0 => {
                // Last reference to the old value: rewrite the entry in place.
                self.entries[current].value = value;
                current
            }
            None => self.new_entry(value),
        };

        self.entries[target].refcount += 1;
        self.indices.set(index, target as u16);
    }

    /// Drops zero-refcount entries, renumbers the rest and shrinks the index
    /// width to the minimum for the remaining dictionary.
    pub fn fit(&mut self) {
        if self.entries.iter().all(|entry| entry.refcount > 0) {
            return;
        }

        let mut remap = vec![0u16; self.entries.len()];
        let mut kept = Vec::with_capacity(self.entries.len());
        for (old, entry) in self.entries.iter().enumerate() {
            if entry.refcount > 0 {
                remap[old] = kept.len() as u16;
                kept.push(*entry);
            }
        }

        let bits = bits_needed(kept.len());
        let mut indices = BitArray::new(bits, self.len());
        if bits > 0 {
            for (slot, old) in self.indices.iter().enumerate() {
                indices.set(slot, remap[old as usize]);
            }
        }

        tracing::trace!(
            from_entries = self.entries.len(),
            to_entries = kept.len(),
            from_bits = self.indices.bits(),
            to_bits = bits,
            "palette fitted"
        );
        self.entries = kept;
        self.indices = indices;
    }

    /// Number of slots referencing `value` (0 if absent).
    pub fn refcount(&self, value: T) -> u32 {
        self.position(value)
            .map_or(0, |index| self.entries[index].refcount)
    }

    /// Number of dictionary entries with a non-zero refcount.
    pub fn live_entries(&self) -> usize {
        self.entries.iter().filter(|entry| entry.refcount > 0).count()
    }

    /// Returns the dictionary, holes included.
    pub fn entries(&self) -> &[PaletteEntry<T>] {
        &self.entries
    }

    /// Returns the packed index array.
    pub fn indices(&self) -> &BitArray {
        &self.indices
    }

    /// Returns the current index width in bits.
    pub fn bits(&self) -> u8 {
        self.indices.bits()
    }

    /// Returns the number of slots.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if the palette has no slots.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterates over every slot's value in index order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.indices
            .iter()
            .map(move |index| self.entries[index as usize].value)
    }

    /// Approximate heap usage of the index array and dictionary, in bytes.
    pub fn storage_bytes(&self) -> usize {
        self.indices.storage_bytes() + self.entries.len() * size_of::<PaletteEntry<T>>()
    }

    fn position(&self, value: T) -> Option<usize> {
        self.entries.iter().position(|entry| entry.value == value)
    }

    /// Finds a slot for a value not yet in the dictionary. The returned
    /// entry has refcount 0.
    fn new_entry(&mut self, value: T) -> usize {
        if let Some(hole) = self.entries.iter().position(|entry| entry.refcount == 0) {
            self.entries[hole].value = value;
            return hole;
        }

        self.entries.push(PaletteEntry { value, refcount: 0 });
        if self.entries.len() > 1usize << self.indices.bits() {
            self.grow();
        }
        self.entries.len() - 1
    }

    fn grow(&mut self) {
        let bits = self.indices.bits() + 1;
        tracing::trace!(entries = self.entries.len(), bits, "palette grown");
        self.indices = self.indices.repacked(bits);
    }
}

/// Palettes compare slot by slot; dictionary order and holes are ignored.
impl<T: PaletteValue> PartialEq for Palette<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

/// A [`Palette`] behind a readers-writer lock: writes are exclusive, reads
/// are shared.
#[derive(Debug)]
pub struct ConcurrentPalette<T> {
    inner: RwLock<Palette<T>>,
}

impl<T: PaletteValue> ConcurrentPalette<T> {
    /// Wraps an existing palette.
    pub fn new(palette: Palette<T>) -> Self {
        Self {
            inner: RwLock::new(palette),
        }
    }

    /// Reads a slot under the shared lock.
    pub fn get(&self, index: usize) -> T {
        self.inner.read().get(index)
    }

    /// Writes a slot under the exclusive lock.
    pub fn set(&self, index: usize, value: T) {
        self.inner.write().set(index, value);
    }

    /// Holds the shared lock for a batch of reads.
    pub fn read(&self) -> RwLockReadGuard<'_, Palette<T>> {
        self.inner.read()
    }

    /// Holds the exclusive lock for a batch of writes.
    pub fn write(&self) -> RwLockWriteGuard<'_, Palette<T>> {
        self.inner.write()
    }

    /// Unwraps the palette.
    pub fn into_inner(self) -> Palette<T> {
        self.inner.into_inner()
    }
}

impl<T: PaletteValue> Clone for ConcurrentPalette<T> {
    fn clone(&self) -> Self {
        Self::new(self.inner.read().clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
