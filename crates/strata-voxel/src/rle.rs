//! Run-length encoding for the codec's index and bitmask streams.
//!
//! RLE compresses runs of identical values into `(count, value)` pairs.
//! Runs are stored as `count: u16 LE` followed by the value's little-endian
//! bytes.

/// Values that can be run-length encoded to bytes.
pub trait RleValue: Copy + PartialEq {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Appends the little-endian encoding to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Reads from exactly [`SIZE`](Self::SIZE) bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

impl RleValue for u8 {
    const SIZE: usize = 1;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl RleValue for u16 {
    const SIZE: usize = 2;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

/// A single RLE run: `count` consecutive occurrences of `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RleRun<T> {
    /// Number of consecutive identical values (1..=65535).
    pub count: u16,
    pub value: T,
}

/// Errors that can occur during RLE decoding.
#[derive(Debug, thiserror::Error)]
pub enum RleError {
    /// Decoded length does not match expected length.
    #[error("RLE length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected number of elements.
        expected: usize,
        /// Actual number of decoded elements.
        actual: usize,
    },
    /// Byte stream is not a whole number of runs.
    #[error("RLE byte stream of {len} bytes is not a multiple of {run_size}")]
    RaggedBytes {
        /// Byte stream length.
        len: usize,
        /// Bytes per run.
        run_size: usize,
    },
}

/// Encodes a slice into RLE runs.
///
/// Runs are capped at `u16::MAX` length. An empty input produces an empty output.
pub fn rle_encode<T: RleValue>(values: &[T]) -> Vec<RleRun<T>> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < values.len() {
        let value = values[i];
        let mut count: u16 = 1;
        loop {
            let idx = i + (count as usize);
            if idx >= values.len() || values[idx] != value || count == u16::MAX {
                break;
            }
            count += 1;
        }
        runs.push(RleRun { count, value });
        i += count as usize;
    }
    runs
}

/// Decodes RLE runs back into a flat array.
///
/// Returns an error if the total decoded length does not match `expected_len`.
pub fn rle_decode<T: RleValue>(runs: &[RleRun<T>], expected_len: usize) -> Result<Vec<T>, RleError> {
    let actual: usize = runs.iter().map(|run| run.count as usize).sum();
    if actual != expected_len {
        return Err(RleError::LengthMismatch {
            expected: expected_len,
            actual,
        });
    }
    let mut result = Vec::with_capacity(expected_len);
    for run in runs {
        result.extend(std::iter::repeat_n(run.value, run.count as usize));
    }
    Ok(result)
}

/// Encodes RLE runs to bytes.
pub fn rle_to_bytes<T: RleValue>(runs: &[RleRun<T>]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(runs.len() * (2 + T::SIZE));
    for run in runs {
        buf.extend_from_slice(&run.count.to_le_bytes());
        run.value.write_le(&mut buf);
    }
    buf
}

/// Decodes RLE runs from [`rle_to_bytes`] output.
pub fn rle_from_bytes<T: RleValue>(data: &[u8]) -> Result<Vec<RleRun<T>>, RleError> {
    let run_size = 2 + T::SIZE;
    if data.len() % run_size != 0 {
        return Err(RleError::RaggedBytes {
            len: data.len(),
            run_size,
        });
    }
    Ok(data
        .chunks_exact(run_size)
        .map(|run| RleRun {
            count: u16::from_le_bytes([run[0], run[1]]),
            value: T::read_le(&run[2..]),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
