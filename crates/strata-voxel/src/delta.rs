//! Delta coding for monotonic index lists.
//!
//! The first element is stored relative to zero. Arithmetic wraps so any
//! input decodes back exactly, monotonic or not.

/// Replaces each element with its difference from the previous one.
pub fn delta_encode(values: &[u16]) -> Vec<u16> {
    let mut previous = 0u16;
    values
        .iter()
        .map(|&value| {
            let delta = value.wrapping_sub(previous);
            previous = value;
            delta
        })
        .collect()
}

/// Cumulative sum; inverse of [`delta_encode`].
pub fn delta_decode(deltas: &[u16]) -> Vec<u16> {
    let mut running = 0u16;
    deltas
        .iter()
        .map(|&delta| {
            running = running.wrapping_add(delta);
            running
        })
        .collect()
}
