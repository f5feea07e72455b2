//! Type-safe message system for ihcd
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use super::state::BinarySensorState;
use super::state::LightState;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone, PartialEq)]
pub enum FromIntegrationMessage {
    /// An entity was registered, or an already registered entity was renamed
    EntityDiscovered {
        entity_id: String,
        name: String,
        integration_name: String,
    },

    /// A light's state changed
    LightStateChanged {
        entity_id: String,
        state: LightState,
    },

    /// A binary sensor's state changed (e.g., motion sensor)
    BinarySensorStateChanged {
        entity_id: String,
        state: BinarySensorState,
    },
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToIntegrationMessage {
    /// Command to change a light's state
    LightCommand {
        entity_id: String,
        on: bool,
        brightness: Option<u8>,
    },

    /// Re-run the integration's setup against its existing devices
    Reload,
}
