//! Content registry: maps compact [`ContentId`] values to [`ContentFeatures`].
//!
//! The registry is built once during server startup and shared read-only
//! (behind an `Arc`) by the map, the lighting and liquid engines, and the
//! generation workers. Air, ignore and unknown are always pre-registered at
//! ids 0, 1 and 2.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::{ContentId, LIGHT_MAX, LIQUID_LEVEL_MAX};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Liquid behaviour of a content type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidType {
    /// Not a liquid.
    #[default]
    None,
    /// Flowing liquid whose level lives in `param2`.
    Flowing,
    /// Liquid source.
    Source,
}

/// Physical properties of a content type that the core consults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFeatures {
    /// Unique name, e.g. "stone" or "water_source".
    pub name: String,
    /// Whether entities collide with this node.
    pub walkable: bool,
    /// Whether light spreads through this node.
    pub light_propagates: bool,
    /// Whether full sunlight passes straight down through this node.
    pub sunlight_propagates: bool,
    /// Emitted light level (0 = none).
    pub light_source: u8,
    /// Liquid behaviour.
    pub liquid_type: LiquidType,
    /// How slowly the liquid level may change per settling pass.
    pub liquid_viscosity: u8,
    /// Whether two adjacent sources create a new source.
    pub liquid_renewable: bool,
    /// How far the liquid flows, in nodes.
    pub liquid_range: u8,
    /// Whether liquid may flow into (and replace) this node.
    pub floodable: bool,
    /// Name of the flowing variant of this liquid.
    pub liquid_alternative_flowing: String,
    /// Name of the source variant of this liquid.
    pub liquid_alternative_source: String,
}

impl Default for ContentFeatures {
    fn default() -> Self {
        Self {
            name: String::new(),
            walkable: true,
            light_propagates: false,
            sunlight_propagates: false,
            light_source: 0,
            liquid_type: LiquidType::None,
            liquid_viscosity: 0,
            liquid_renewable: true,
            liquid_range: LIQUID_LEVEL_MAX + 1,
            floodable: false,
            liquid_alternative_flowing: String::new(),
            liquid_alternative_source: String::new(),
        }
    }
}

impl ContentFeatures {
    /// Opaque, walkable content.
    pub fn solid(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Walkable content that lets all light through (glass, leaves).
    pub fn transparent(name: &str) -> Self {
        Self {
            name: name.to_string(),
            light_propagates: true,
            sunlight_propagates: true,
            ..Self::default()
        }
    }

    /// Non-walkable, floodable content that lets all light through.
    pub fn air_like(name: &str) -> Self {
        Self {
            name: name.to_string(),
            walkable: false,
            light_propagates: true,
            sunlight_propagates: true,
            floodable: true,
            ..Self::default()
        }
    }

    /// Source and flowing definitions of one liquid, named `{base}_source`
    /// and `{base}_flowing`.
    pub fn liquid_pair(base: &str, viscosity: u8, renewable: bool, range: u8) -> [Self; 2] {
        let source_name = format!("{base}_source");
        let flowing_name = format!("{base}_flowing");
        let template = Self {
            walkable: false,
            light_propagates: true,
            liquid_viscosity: viscosity,
            liquid_renewable: renewable,
            liquid_range: range,
            liquid_alternative_flowing: flowing_name.clone(),
            liquid_alternative_source: source_name.clone(),
            ..Self::default()
        };
        [
            Self {
                name: source_name,
                liquid_type: LiquidType::Source,
                ..template.clone()
            },
            Self {
                name: flowing_name,
                liquid_type: LiquidType::Flowing,
                ..template
            },
        ]
    }

    /// Returns `true` for sources and flowing liquids.
    pub fn is_liquid(&self) -> bool {
        self.liquid_type != LiquidType::None
    }
}

/// Errors that can occur during content registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A definition with the same name has already been registered.
    #[error("duplicate content name: {0}")]
    DuplicateName(String),
    /// All 65 536 ids have been consumed.
    #[error("content registry is full (max 65536 types)")]
    RegistryFull,
    /// A definition list could not be parsed.
    #[error("failed to parse content definitions: {0}")]
    Parse(#[source] ron::error::SpannedError),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps [`ContentId`] → [`ContentFeatures`] with O(1) lookup both ways.
#[derive(Debug)]
pub struct ContentRegistry {
    /// Dense array where `index == ContentId.0`.
    defs: Vec<ContentFeatures>,
    /// Reverse lookup: name → id.
    name_to_id: HashMap<String, ContentId>,
    /// Resolved `(flowing, source)` alternatives per id.
    alternatives: Vec<(ContentId, ContentId)>,
}

impl ContentRegistry {
    /// Creates a registry holding only air, ignore and unknown.
    pub fn new() -> Self {
        let ignore = ContentFeatures {
            walkable: false,
            ..ContentFeatures::solid("ignore")
        };
        let mut registry = Self {
            defs: Vec::new(),
            name_to_id: HashMap::new(),
            alternatives: Vec::new(),
        };
        for def in [
            ContentFeatures::air_like("air"),
            ignore,
            ContentFeatures::solid("unknown"),
        ] {
            registry.push(def);
        }
        registry
    }

    /// Registry with the content the bundled terrain painters use.
    pub fn with_basic_content() -> Self {
        let mut registry = Self::new();
        let [water_source, water_flowing] = ContentFeatures::liquid_pair("water", 1, true, 8);
        let [mut lava_source, mut lava_flowing] = ContentFeatures::liquid_pair("lava", 7, false, 4);
        lava_source.light_source = LIGHT_MAX - 2;
        lava_flowing.light_source = LIGHT_MAX - 2;
        let torch = ContentFeatures {
            light_source: LIGHT_MAX - 1,
            ..ContentFeatures::air_like("torch")
        };
        let defs = [
            ContentFeatures::solid("stone"),
            ContentFeatures::solid("dirt"),
            ContentFeatures::solid("grass"),
            ContentFeatures::solid("sand"),
            ContentFeatures::solid("tree"),
            ContentFeatures {
                sunlight_propagates: false,
                ..ContentFeatures::transparent("leaves")
            },
            ContentFeatures::transparent("glass"),
            torch,
            water_source,
            water_flowing,
            lava_source,
            lava_flowing,
        ];
        for def in defs {
            // Names above are distinct and far below the id limit.
            let _ = registry.register(def);
        }
        registry
    }

    /// Parses a RON list of definitions and registers them in order.
    pub fn from_ron_str(ron_str: &str) -> Result<Self, RegistryError> {
        let defs: Vec<ContentFeatures> = ron::from_str(ron_str).map_err(RegistryError::Parse)?;
        let mut registry = Self::new();
        for def in defs {
            registry.register(def)?;
        }
        Ok(registry)
    }

    /// Registers a definition and returns its id.
    ///
    /// Liquid alternatives are resolved by name; definitions may refer to
    /// names registered later.
    pub fn register(&mut self, def: ContentFeatures) -> Result<ContentId, RegistryError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if self.defs.len() > u16::MAX as usize {
            return Err(RegistryError::RegistryFull);
        }
        let id = self.push(def);
        self.resolve_alternatives();
        Ok(id)
    }

    fn push(&mut self, def: ContentFeatures) -> ContentId {
        let id = ContentId(self.defs.len() as u16);
        self.name_to_id.insert(def.name.clone(), id);
        self.defs.push(def);
        self.alternatives.push((ContentId::IGNORE, ContentId::IGNORE));
        id
    }

    fn resolve_alternatives(&mut self) {
        for (def, alt) in self.defs.iter().zip(self.alternatives.iter_mut()) {
            let lookup = |name: &str| {
                self.name_to_id
                    .get(name)
                    .copied()
                    .unwrap_or(ContentId::IGNORE)
            };
            *alt = (
                lookup(&def.liquid_alternative_flowing),
                lookup(&def.liquid_alternative_source),
            );
        }
    }

    /// Definition for `id`; ids outside the table read as "unknown".
    pub fn get(&self, id: ContentId) -> &ContentFeatures {
        self.defs
            .get(id.0 as usize)
            .unwrap_or(&self.defs[ContentId::UNKNOWN.0 as usize])
    }

    /// Id registered under `name`.
    pub fn id_of(&self, name: &str) -> Option<ContentId> {
        self.name_to_id.get(name).copied()
    }

    /// Name of the content registered at `id`.
    pub fn name_of(&self, id: ContentId) -> &str {
        &self.get(id).name
    }

    /// Flowing variant of a liquid, or IGNORE when it has none.
    pub fn alternative_flowing(&self, id: ContentId) -> ContentId {
        self.alternatives
            .get(id.0 as usize)
            .map_or(ContentId::IGNORE, |alt| alt.0)
    }

    /// Source variant of a liquid, or IGNORE when it has none.
    pub fn alternative_source(&self, id: ContentId) -> ContentId {
        self.alternatives
            .get(id.0 as usize)
            .map_or(ContentId::IGNORE, |alt| alt.1)
    }

    /// Total number of registered definitions (including the reserved ones).
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns `true` if only the reserved definitions are registered.
    pub fn is_empty(&self) -> bool {
        self.defs.len() <= 3
    }
}

impl Default for ContentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
