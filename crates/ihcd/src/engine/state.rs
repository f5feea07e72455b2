use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// State of a light entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    /// Whether the light is on or off. `None` until the first command or notification.
    pub on: Option<bool>,

    /// Brightness level (0-255).
    pub brightness: u8,

    /// Whether the underlying resource accepts a dimming level.
    pub dimmable: bool,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            on: None,
            brightness: 0,
            dimmable: true,
        }
    }
}

/// State of a binary sensor entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BinarySensorState {
    /// Whether the sensor is active (meaning depends on device class:
    /// motion detected, door open, smoke detected, etc.). `None` is unknown.
    pub on: Option<bool>,
}

/// Registration data the engine keeps for every entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityInfo {
    pub name: String,
    pub integration: String,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub entities: HashMap<String, EntityInfo>,
    pub lights: HashMap<String, LightState>,
    pub binary_sensors: HashMap<String, BinarySensorState>,
}
