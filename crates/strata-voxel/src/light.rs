//! Per-voxel light value with four independent 4-bit channels.

use serde::{Deserialize, Serialize};

/// Packed light value: red, green, blue and sky intensity, 4 bits each.
///
/// Bit layout (LSB first): red `0..4`, green `4..8`, blue `8..12`,
/// sky `12..16`. All-zero is the "dark" sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Light(u16);

const RED_SHIFT: u32 = 0;
const GREEN_SHIFT: u32 = 4;
const BLUE_SHIFT: u32 = 8;
const SKY_SHIFT: u32 = 12;

impl Light {
    /// Maximum level for any channel.
    pub const MAX_LEVEL: u8 = 15;

    /// No light on any channel.
    pub const DARK: Light = Light(0);

    /// Builds a light value from its four channels. Levels above 15 saturate.
    pub fn new(red: u8, green: u8, blue: u8, sky: u8) -> Self {
        let mut light = Self::DARK;
        light.set_red(red);
        light.set_green(green);
        light.set_blue(blue);
        light.set_sky(sky);
        light
    }

    /// Reinterprets a packed `u16`.
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the packed `u16`.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns `true` if every channel is zero.
    pub const fn is_dark(self) -> bool {
        self.0 == 0
    }

    /// Sky (sunlight) level, 0–15.
    pub fn sky(self) -> u8 {
        self.channel(SKY_SHIFT)
    }

    /// Red level, 0–15.
    pub fn red(self) -> u8 {
        self.channel(RED_SHIFT)
    }

    /// Green level, 0–15.
    pub fn green(self) -> u8 {
        self.channel(GREEN_SHIFT)
    }

    /// Blue level, 0–15.
    pub fn blue(self) -> u8 {
        self.channel(BLUE_SHIFT)
    }

    /// Sets the sky level.
    pub fn set_sky(&mut self, level: u8) {
        self.set_channel(SKY_SHIFT, level);
    }

    /// Sets the red level.
    pub fn set_red(&mut self, level: u8) {
        self.set_channel(RED_SHIFT, level);
    }

    /// Sets the green level.
    pub fn set_green(&mut self, level: u8) {
        self.set_channel(GREEN_SHIFT, level);
    }

    /// Sets the blue level.
    pub fn set_blue(&mut self, level: u8) {
        self.set_channel(BLUE_SHIFT, level);
    }

    /// Returns a copy with the sky level replaced.
    pub fn with_sky(mut self, level: u8) -> Self {
        self.set_sky(level);
        self
    }

    fn channel(self, shift: u32) -> u8 {
        ((self.0 >> shift) & 0xF) as u8
    }

    fn set_channel(&mut self, shift: u32, level: u8) {
        debug_assert!(level <= Self::MAX_LEVEL, "light level {level} exceeds 15");
        let level = u16::from(level.min(Self::MAX_LEVEL));
        self.0 = (self.0 & !(0xF << shift)) | (level << shift);
    }
}
