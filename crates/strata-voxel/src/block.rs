//! Block types and the read-only block property table.
//!
//! The [`BlockRegistry`] is built once at startup and passed by reference to
//! the systems that need block metadata (light propagation, world
//! generation). Air is always id 0 so a zeroed palette index means empty.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Kind of block occupying a voxel. Stored as a `u16`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum BlockType {
    /// Empty space.
    #[default]
    Air = 0,
    Stone,
    Dirt,
    Metal,
    Grass,
    Sand,
    Snow,
    Water,
    OakWood,
    OakLeaves,
    Error,
    DryGrass,
    OLight,
    RLight,
    GLight,
    BLight,
    SmLight,
    YLight,
    RGlass,
    GGlass,
    BGlass,
}

impl BlockType {
    /// Every block type, in id order.
    pub const ALL: [BlockType; 21] = [
        BlockType::Air,
        BlockType::Stone,
        BlockType::Dirt,
        BlockType::Metal,
        BlockType::Grass,
        BlockType::Sand,
        BlockType::Snow,
        BlockType::Water,
        BlockType::OakWood,
        BlockType::OakLeaves,
        BlockType::Error,
        BlockType::DryGrass,
        BlockType::OLight,
        BlockType::RLight,
        BlockType::GLight,
        BlockType::BLight,
        BlockType::SmLight,
        BlockType::YLight,
        BlockType::RGlass,
        BlockType::GGlass,
        BlockType::BGlass,
    ];

    /// Number of block types.
    pub const COUNT: usize = Self::ALL.len();

    /// Returns the numeric id.
    pub const fn id(self) -> u16 {
        self as u16
    }

    /// Looks up a block type by numeric id.
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Returns `true` for [`BlockType::Air`].
    pub const fn is_air(self) -> bool {
        matches!(self, BlockType::Air)
    }
}

/// How a block interacts with light and rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    /// Fully blocks light and is always drawn.
    Opaque,
    /// Lets light through but is still drawn (water, glass, leaves).
    Partial,
    /// Not drawn at all.
    Invisible,
}

/// Metadata for one [`BlockType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockProperties {
    /// Human-readable name, unique within a registry.
    pub name: String,
    /// Whether players can break it.
    pub destructible: bool,
    /// Light/visibility classification.
    pub visibility: Visibility,
    /// Emitted light (red, green, blue, strength), each 0–15.
    pub emittance: [u8; 4],
    /// Texture name.
    pub texture: String,
}

impl BlockProperties {
    fn new(name: &str, emittance: [u8; 4], destructible: bool, visibility: Visibility) -> Self {
        Self {
            name: name.to_string(),
            destructible,
            visibility,
            emittance,
            texture: name.to_string(),
        }
    }
}

/// Errors that can occur when building a [`BlockRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The table does not have exactly one entry per block type.
    #[error("expected {expected} block entries, got {actual}")]
    WrongEntryCount {
        /// Number of block types.
        expected: usize,
        /// Number of entries supplied.
        actual: usize,
    },
    /// Two entries share a name.
    #[error("duplicate block name: {0}")]
    DuplicateName(String),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Block property table indexed by [`BlockType`], with reverse lookup by name.
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    /// Dense array where `index == BlockType::id()`.
    properties: Vec<BlockProperties>,
    name_to_type: FxHashMap<String, BlockType>,
}

impl BlockRegistry {
    /// Creates the default table.
    pub fn new() -> Self {
        use Visibility::{Invisible, Opaque, Partial};

        let properties = vec![
            BlockProperties::new("air", [0, 0, 0, 0], false, Invisible),
            BlockProperties::new("stone", [0, 0, 0, 0], true, Opaque),
            BlockProperties::new("dirt", [0, 0, 0, 0], true, Opaque),
            BlockProperties::new("metal", [0, 0, 0, 0], true, Opaque),
            BlockProperties::new("grass", [0, 0, 0, 0], true, Opaque),
            BlockProperties::new("sand", [0, 0, 0, 0], true, Opaque),
            BlockProperties::new("snow", [0, 0, 0, 0], true, Opaque),
            BlockProperties::new("water", [0, 0, 0, 0], false, Partial),
            BlockProperties::new("oak_wood", [0, 0, 0, 0], true, Opaque),
            BlockProperties::new("oak_leaves", [0, 0, 0, 0], true, Partial),
            BlockProperties::new("error", [0, 0, 0, 0], false, Opaque),
            BlockProperties::new("dry_grass", [0, 0, 0, 0], true, Opaque),
            BlockProperties::new("o_light", [15, 8, 1, 0], true, Opaque),
            BlockProperties::new("r_light", [15, 0, 0, 0], true, Opaque),
            BlockProperties::new("g_light", [0, 15, 0, 0], true, Opaque),
            BlockProperties::new("b_light", [0, 0, 15, 0], true, Opaque),
            BlockProperties::new("sm_light", [6, 6, 6, 0], true, Opaque),
            BlockProperties::new("y_light", [15, 15, 0, 0], true, Opaque),
            BlockProperties::new("r_glass", [0, 0, 0, 0], true, Partial),
            BlockProperties::new("g_glass", [0, 0, 0, 0], true, Partial),
            BlockProperties::new("b_glass", [0, 0, 0, 0], true, Partial),
        ];

        match Self::from_properties(properties) {
            Ok(registry) => registry,
            Err(e) => unreachable!("default block table is invalid: {e}"),
        }
    }

    /// Builds a registry from a custom table, one entry per [`BlockType`] in
    /// id order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::WrongEntryCount`] if the table length differs
    /// from [`BlockType::COUNT`], or [`RegistryError::DuplicateName`] if two
    /// entries share a name.
    pub fn from_properties(properties: Vec<BlockProperties>) -> Result<Self, RegistryError> {
        if properties.len() != BlockType::COUNT {
            return Err(RegistryError::WrongEntryCount {
                expected: BlockType::COUNT,
                actual: properties.len(),
            });
        }

        let mut name_to_type = FxHashMap::default();
        for (props, block_type) in properties.iter().zip(BlockType::ALL) {
            if name_to_type.insert(props.name.clone(), block_type).is_some() {
                return Err(RegistryError::DuplicateName(props.name.clone()));
            }
        }

        Ok(Self {
            properties,
            name_to_type,
        })
    }

    /// Returns the properties of `block_type`.
    pub fn get(&self, block_type: BlockType) -> &BlockProperties {
        &self.properties[block_type.id() as usize]
    }

    /// Returns the block type with the given name, or `None` if not found.
    pub fn lookup_by_name(&self, name: &str) -> Option<BlockType> {
        self.name_to_type.get(name).copied()
    }

    /// Returns `true` if `block_type` is the empty sentinel.
    pub fn is_empty(&self, block_type: BlockType) -> bool {
        block_type.is_air()
    }

    /// Returns `true` if `block_type` fully blocks light.
    pub fn is_opaque(&self, block_type: BlockType) -> bool {
        self.get(block_type).visibility == Visibility::Opaque
    }

    /// Number of entries (always [`BlockType::COUNT`]).
    pub fn len(&self) -> usize {
        self.properties.len()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_air_is_id_zero() {
        assert_eq!(BlockType::Air.id(), 0);
        assert_eq!(BlockType::default(), BlockType::Air);
        let registry = BlockRegistry::new();
        assert_eq!(registry.get(BlockType::Air).name, "air");
        assert!(registry.is_empty(BlockType::Air));
        assert!(!registry.is_opaque(BlockType::Air));
    }

    #[test]
    fn test_ids_roundtrip() {
        for block_type in BlockType::ALL {
            assert_eq!(BlockType::from_id(block_type.id()), Some(block_type));
        }
        assert_eq!(BlockType::from_id(BlockType::COUNT as u16), None);
    }

    #[test]
    fn test_visibility_classification() {
        let registry = BlockRegistry::new();
        assert!(registry.is_opaque(BlockType::Stone));
        assert!(!registry.is_opaque(BlockType::Water));
        assert!(!registry.is_opaque(BlockType::RGlass));
        assert_eq!(registry.len(), BlockType::COUNT);
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = BlockRegistry::new();
        assert_eq!(registry.lookup_by_name("oak_leaves"), Some(BlockType::OakLeaves));
        assert_eq!(registry.lookup_by_name("obsidian"), None);
    }

    #[test]
    fn test_custom_table_rejects_wrong_length() {
        let mut props: Vec<_> = BlockType::ALL
            .iter()
            .map(|t| BlockRegistry::new().get(*t).clone())
            .collect();
        props.pop();
        assert!(matches!(
            BlockRegistry::from_properties(props),
            Err(RegistryError::WrongEntryCount { expected: 21, actual: 20 })
        ));
    }

    #[test]
    fn test_custom_table_rejects_duplicate_names() {
        let defaults = BlockRegistry::new();
        let mut props: Vec<_> = BlockType::ALL.iter().map(|t| defaults.get(*t).clone()).collect();
        props[2].name = "stone".to_string();
        assert!(matches!(
            BlockRegistry::from_properties(props),
            Err(RegistryError::DuplicateName(name)) if name == "stone"
        ));
    }

    #[test]
    fn test_custom_table_can_make_glass_opaque() {
        let defaults = BlockRegistry::new();
        let mut props: Vec<_> = BlockType::ALL.iter().map(|t| defaults.get(*t).clone()).collect();
        props[BlockType::RGlass.id() as usize].visibility = Visibility::Opaque;
        let registry = BlockRegistry::from_properties(props).expect("valid table");
        assert!(registry.is_opaque(BlockType::RGlass));
    }
}
