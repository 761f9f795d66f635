use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Bridge-issued light identifier. Hue uses decimal strings ("1", "12"), but
/// the value is treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LightId(pub String);

impl LightId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LightId {
    fn from(s: &str) -> Self {
        LightId(s.to_string())
    }
}

/// One entry of the bridge's `lights` object. Only the name matters here;
/// state, type and model fields are ignored on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLight {
    pub name: String,
}

/// One entry of the bridge's `groups` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGroup {
    pub name: String,
    #[serde(default)]
    pub lights: Vec<LightId>,
}

/// Snapshot of everything the bridge knows about, keyed by identifier.
/// Maps keep the order the bridge reported them in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeInventory {
    #[serde(default)]
    pub lights: IndexMap<LightId, RawLight>,
    #[serde(default)]
    pub groups: IndexMap<String, RawGroup>,
}

impl BridgeInventory {
    /// Builder used by tests and demos: add a light.
    pub fn with_light(mut self, id: &str, name: &str) -> Self {
        self.lights.insert(
            LightId::from(id),
            RawLight {
                name: name.to_string(),
            },
        );
        self
    }

    /// Builder used by tests and demos: add a group.
    pub fn with_group(mut self, id: &str, name: &str, members: &[&str]) -> Self {
        self.groups.insert(
            id.to_string(),
            RawGroup {
                name: name.to_string(),
                lights: members.iter().map(|m| LightId::from(*m)).collect(),
            },
        );
        self
    }
}

/// Maximum Hue brightness value.
pub const MAX_BRIGHTNESS: u8 = 254;

/// Body of a light state PUT. `bri` is omitted for plain power changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    pub on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
}

impl LightState {
    pub fn power(on: bool) -> Self {
        Self { on, bri: None }
    }

    /// Setting brightness always turns the light on.
    pub fn brightness(level: u8) -> Self {
        Self {
            on: true,
            bri: Some(level),
        }
    }
}

/// Brightness level expressed as a rounded percentage of [`MAX_BRIGHTNESS`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn brightness_percent(level: u8) -> u8 {
    let pct = (f64::from(level) * 100.0 / f64::from(MAX_BRIGHTNESS)).round();
    pct.clamp(0.0, 255.0) as u8
}
