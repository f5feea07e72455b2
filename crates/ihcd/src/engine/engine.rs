use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::EntityInfo;
use super::state::State;
use crate::engine::IntegrationContext;

/// ihcd engine
///
/// This structure handles the flow of events from integrations, routes commands to the
/// correct integration, and maintains a view of the world with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of entity_id -> integration name for routing messages
    entity_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (for commands)
    integration_channels: HashMap<String, ToIntegrationSender>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: Vec<JoinHandle<()>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            entity_integration_map: std::sync::Mutex::new(HashMap::new()),
            integration_channels: HashMap::new(),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: Vec::new(),
        }
    }

    /// Register integrations from configuration
    ///
    /// Runs every factory in the integration registry and registers the
    /// integrations that are enabled by the config.
    pub fn register_integrations_from_config(&mut self, cfg: &crate::config::Config) {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&mut self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        self.integration_channels
            .insert(name.clone(), to_integration_tx);

        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process commands from engine
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        self.integration_handles.push(handle);
    }

    /// Names of all registered integrations
    pub fn integration_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.integration_channels.keys().cloned().collect();
        names.sort();
        names
    }

    /// Send a command to an integration
    ///
    /// Routes the command to the appropriate integration based on entity_id.
    pub fn send_command(&self, msg: ToIntegrationMessage) -> Result<(), Box<dyn Error + Send>> {
        let entity_id = match &msg {
            ToIntegrationMessage::LightCommand { entity_id, .. } => entity_id.clone(),
            ToIntegrationMessage::Reload => {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "Reload is not routed by entity, use reload_integration()",
                )));
            }
        };

        let integration_name = {
            let map = self
                .entity_integration_map
                .lock()
                .map_err(|e| -> Box<dyn Error + Send> {
                    Box::new(std::io::Error::other(e.to_string()))
                })?;

            map.get(&entity_id)
                .cloned()
                .ok_or_else(|| -> Box<dyn Error + Send> {
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("No integration found for entity: {}", entity_id),
                    ))
                })?
        };

        self.send_to_integration(&integration_name, msg)
    }

    /// Ask an integration to re-run its setup
    pub fn reload_integration(&self, name: &str) -> Result<(), Box<dyn Error + Send>> {
        info!("Reloading integration '{}'", name);
        self.send_to_integration(name, ToIntegrationMessage::Reload)
    }

    fn send_to_integration(
        &self,
        name: &str,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        let tx = self
            .integration_channels
            .get(name)
            .ok_or_else(|| -> Box<dyn Error + Send> {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Integration channel not found: {}", name),
                ))
            })?;

        tx.send(msg)
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Send a light command to control a light entity
    pub fn send_light_command(
        &self,
        entity_id: String,
        on: bool,
        brightness: Option<u8>,
    ) -> Result<(), Box<dyn Error + Send>> {
        let cmd = ToIntegrationMessage::LightCommand {
            entity_id,
            on,
            brightness,
        };
        self.send_command(cmd)
    }

    /// Handle an event from an integration
    fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                name,
                integration_name,
            } => {
                info!(
                    "Entity discovered: {} '{}' (from {})",
                    entity_id, name, integration_name
                );

                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.insert(entity_id.clone(), integration_name.clone());
                }

                // State is not populated until the first state-change message arrives.
                self.update_state(|state| {
                    state.entities.insert(
                        entity_id,
                        EntityInfo {
                            name,
                            integration: integration_name,
                        },
                    );
                });
            }
            FromIntegrationMessage::LightStateChanged { entity_id, state } => {
                info!(
                    "Light state changed: {} -> on={:?}, brightness={}, dimmable={}",
                    entity_id, state.on, state.brightness, state.dimmable
                );
                self.update_state(|s| {
                    s.lights.insert(entity_id, state);
                });
            }
            FromIntegrationMessage::BinarySensorStateChanged { entity_id, state } => {
                info!("Binary sensor state changed: {} -> on={:?}", entity_id, state.on);
                self.update_state(|s| {
                    s.binary_sensors.insert(entity_id, state);
                });
            }
        }
    }

    fn update_state(&self, f: impl FnOnce(&mut State)) {
        let mut state = State::clone(&self.state.load());
        f(&mut state);
        self.state.store(Arc::new(state));
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedSender;

    use super::*;
    use crate::engine::BinarySensorState;
    use crate::engine::LightState;

    /// Integration that forwards every command it receives to a test channel
    struct EchoIntegration {
        seen: UnboundedSender<ToIntegrationMessage>,
    }

    #[async_trait]
    impl Integration for EchoIntegration {
        fn name(&self) -> &str {
            "echo"
        }

        async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
            tx.send(FromIntegrationMessage::EntityDiscovered {
                entity_id: "light.echo".to_string(),
                name: "Echo".to_string(),
                integration_name: "echo".to_string(),
            })
            .await
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })
        }

        async fn handle_message(
            &mut self,
            msg: ToIntegrationMessage,
        ) -> Result<(), Box<dyn Error + Send>> {
            let _ = self.seen.send(msg);
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }
    }

    #[test]
    fn test_state_changes_update_snapshot() {
        let engine = Engine::new();

        engine.handle_event(FromIntegrationMessage::EntityDiscovered {
            entity_id: "light.ihc_42".to_string(),
            name: "Kitchen_42".to_string(),
            integration_name: "ihc".to_string(),
        });
        engine.handle_event(FromIntegrationMessage::LightStateChanged {
            entity_id: "light.ihc_42".to_string(),
            state: LightState {
                on: Some(true),
                brightness: 128,
                dimmable: true,
            },
        });
        engine.handle_event(FromIntegrationMessage::BinarySensorStateChanged {
            entity_id: "binary_sensor.ihc_7".to_string(),
            state: BinarySensorState { on: Some(false) },
        });

        let state = engine.state_snapshot();
        assert_eq!(state.entities["light.ihc_42"].name, "Kitchen_42");
        assert_eq!(state.lights["light.ihc_42"].brightness, 128);
        assert_eq!(state.binary_sensors["binary_sensor.ihc_7"].on, Some(false));
    }

    #[test]
    fn test_command_for_unknown_entity_fails() {
        let engine = Engine::new();
        assert!(
            engine
                .send_light_command("light.nowhere".to_string(), true, None)
                .is_err()
        );
        assert!(engine.reload_integration("nowhere").is_err());
    }

    #[tokio::test]
    async fn test_commands_are_routed_to_owning_integration() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let mut engine = Engine::new();
        engine.register_integration("echo".to_string(), Box::new(EchoIntegration { seen: seen_tx }));
        assert_eq!(engine.integration_names(), vec!["echo".to_string()]);

        // Process the discovery message sent during setup
        let msg = engine.message_rx.lock().await.recv().await.unwrap();
        engine.handle_event(msg);

        engine
            .send_light_command("light.echo".to_string(), true, Some(10))
            .unwrap();
        engine.reload_integration("echo").unwrap();

        assert_eq!(
            seen_rx.recv().await,
            Some(ToIntegrationMessage::LightCommand {
                entity_id: "light.echo".to_string(),
                on: true,
                brightness: Some(10),
            })
        );
        assert_eq!(seen_rx.recv().await, Some(ToIntegrationMessage::Reload));
    }
}
