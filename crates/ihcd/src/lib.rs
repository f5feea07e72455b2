pub mod api;
pub mod config;
mod engine;
pub mod integrations;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use engine::BinarySensorState;
pub use engine::Engine;
pub use engine::LightState;
pub use engine::State;
