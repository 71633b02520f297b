//! Sky-light flood fill across loaded chunks.

pub mod sunlight;

pub use sunlight::{SunlightPropagator, SunlightStats};
