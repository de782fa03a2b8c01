//! The node: a content id plus two parameter bytes.
//!
//! `param1` stores light, one nibble per [`LightBank`]. `param2` is content
//! specific; for flowing liquids it holds the level in the low three bits and
//! the flow-down flag in bit 3.

use serde::{Deserialize, Serialize};

use crate::content::ContentFeatures;

/// Compact identifier of a node's content definition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(pub u16);

impl ContentId {
    /// Empty space. Zero so that fresh node arrays are air.
    pub const AIR: ContentId = ContentId(0);
    /// Placeholder for data that is not loaded.
    pub const IGNORE: ContentId = ContentId(1);
    /// Content whose definition is missing from the registry.
    pub const UNKNOWN: ContentId = ContentId(2);
}

/// Highest light level; assigned to nodes in direct sunlight.
pub const LIGHT_MAX: u8 = 15;

/// Liquid level bits of `param2`.
pub const LIQUID_LEVEL_MASK: u8 = 0x07;
/// Flow-down bit of `param2`.
pub const LIQUID_FLOW_DOWN_MASK: u8 = 0x08;
/// Highest level a flowing liquid can have.
pub const LIQUID_LEVEL_MAX: u8 = LIQUID_LEVEL_MASK;
/// Level assigned to source nodes by the liquid transform.
pub const LIQUID_LEVEL_SOURCE: u8 = LIQUID_LEVEL_MAX + 1;

/// One of the two independent light channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightBank {
    /// Light that comes from the sky.
    Sky,
    /// Light emitted by nodes.
    Artificial,
}

impl LightBank {
    /// Both banks, sky first.
    pub const ALL: [LightBank; 2] = [LightBank::Sky, LightBank::Artificial];

    fn shift(self) -> u8 {
        match self {
            LightBank::Sky => 0,
            LightBank::Artificial => 4,
        }
    }
}

/// A single voxel cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Node {
    /// Content definition index.
    pub content: ContentId,
    /// Light nibbles.
    pub param1: u8,
    /// Content-specific parameter.
    pub param2: u8,
}

impl Node {
    /// Air with no light.
    pub const AIR: Node = Node::new(ContentId::AIR);
    /// Sentinel returned for positions without loaded data.
    pub const IGNORE: Node = Node::new(ContentId::IGNORE);

    /// A node of the given content with zeroed parameters.
    pub const fn new(content: ContentId) -> Self {
        Self {
            content,
            param1: 0,
            param2: 0,
        }
    }

    /// A node with explicit parameter bytes.
    pub const fn with_params(content: ContentId, param1: u8, param2: u8) -> Self {
        Self {
            content,
            param1,
            param2,
        }
    }

    /// Returns `true` for the "not loaded" sentinel.
    pub fn is_ignore(&self) -> bool {
        self.content == ContentId::IGNORE
    }

    /// Light level stored in `param1` for `bank`, ignoring emission.
    pub fn raw_light(&self, bank: LightBank) -> u8 {
        (self.param1 >> bank.shift()) & 0x0F
    }

    /// Effective light level: emitters never read darker than their emission
    /// on the artificial bank.
    pub fn light(&self, bank: LightBank, features: &ContentFeatures) -> u8 {
        let stored = self.raw_light(bank);
        match bank {
            LightBank::Artificial => stored.max(features.light_source.min(LIGHT_MAX)),
            LightBank::Sky => stored,
        }
    }

    /// Stores `level` (clamped to [`LIGHT_MAX`]) for `bank`.
    pub fn set_light(&mut self, bank: LightBank, level: u8) {
        debug_assert!(level <= LIGHT_MAX, "light level {level} above LIGHT_MAX");
        let shift = bank.shift();
        self.param1 = (self.param1 & !(0x0F << shift)) | ((level.min(LIGHT_MAX) & 0x0F) << shift);
    }

    /// Clears both light banks.
    pub fn clear_light(&mut self) {
        self.param1 = 0;
    }

    /// Flowing-liquid level from `param2`.
    pub fn liquid_level(&self) -> u8 {
        self.param2 & LIQUID_LEVEL_MASK
    }

    /// Whether the flow-down bit is set.
    pub fn is_flowing_down(&self) -> bool {
        self.param2 & LIQUID_FLOW_DOWN_MASK == LIQUID_FLOW_DOWN_MASK
    }
}

/// Light one step further from a source.
pub fn diminish_light(light: u8) -> u8 {
    light.saturating_sub(1)
}

/// Light one step closer to a source.
pub fn undiminish_light(light: u8) -> u8 {
    (light + 1).min(LIGHT_MAX)
}
