use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::INTEGRATION_NAME;
use super::IhcConfig;
use super::binary_sensor::IhcBinarySensor;
use super::controller::ControllerError;
use super::controller::IhcController;
use super::controller::IhcId;
use super::device::DeviceContext;
use super::device::StateReporter;
use super::light::IhcLight;
use super::platform::setup_platform;
use super::registry::DeviceRegistry;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Integration has not been set up")]
    NotSetUp,

    #[error("Unknown IHC light: {0}")]
    UnknownLight(String),

    #[error(transparent)]
    Controller(#[from] ControllerError),
}

fn boxed<E: Error + Send + 'static>(e: E) -> Box<dyn Error + Send> {
    Box::new(e)
}

/// IHC controller integration
///
/// Owns one device registry per platform. The registries outlive setup
/// passes, so a reload updates the devices created by earlier passes
/// instead of duplicating them.
///
/// The configuration is captured when the integration is built. A reload
/// fetches the project document again but keeps the captured
/// configuration, so edited `ids` or `autosetup` settings need a restart.
pub struct IhcIntegration<C: IhcController> {
    controller: Arc<C>,
    config: IhcConfig,
    binary_sensors: DeviceRegistry<IhcBinarySensor>,
    lights: DeviceRegistry<IhcLight>,
    ctx: Option<DeviceContext>,
}

impl<C: IhcController + 'static> IhcIntegration<C> {
    pub fn new(controller: C, config: &IhcConfig) -> Self {
        Self {
            controller: Arc::new(controller),
            config: config.clone(),
            binary_sensors: DeviceRegistry::new(),
            lights: DeviceRegistry::new(),
            ctx: None,
        }
    }

    pub fn binary_sensors(&self) -> &DeviceRegistry<IhcBinarySensor> {
        &self.binary_sensors
    }

    pub fn lights(&self) -> &DeviceRegistry<IhcLight> {
        &self.lights
    }

    /// Run a setup pass of every platform
    async fn setup_platforms(&self) -> Result<(), Box<dyn Error + Send>> {
        let ctx = self.ctx.as_ref().ok_or_else(|| boxed(CommandError::NotSetUp))?;

        setup_platform(ctx, &self.binary_sensors, &self.config.binary_sensor)
            .await
            .map_err(boxed)?;
        setup_platform(ctx, &self.lights, &self.config.light)
            .await
            .map_err(boxed)?;
        Ok(())
    }

    fn light(&self, entity_id: &str) -> Result<Arc<IhcLight>, CommandError> {
        entity_id
            .strip_prefix("light.ihc_")
            .and_then(|id| id.parse::<IhcId>().ok())
            .and_then(|ihcid| self.lights.get(ihcid))
            .ok_or_else(|| CommandError::UnknownLight(entity_id.to_string()))
    }
}

#[async_trait]
impl<C: IhcController + 'static> Integration for IhcIntegration<C> {
    fn name(&self) -> &str {
        INTEGRATION_NAME
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        info!("Setting up IHC integration");
        let controller: Arc<dyn IhcController> = self.controller.clone();
        self.ctx = Some(DeviceContext {
            controller,
            reporter: StateReporter::new(tx),
        });
        self.setup_platforms().await
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::LightCommand {
                entity_id,
                on,
                brightness,
            } => {
                let light = self.light(&entity_id).map_err(boxed)?;
                let result = if on {
                    light.turn_on(brightness).await
                } else {
                    light.turn_off().await
                };
                result.map_err(|e| boxed(CommandError::from(e)))
            }
            // Fresh project document, same configuration
            ToIntegrationMessage::Reload => {
                info!("Reloading IHC integration");
                self.setup_platforms().await
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!(
            "Shutting down IHC integration ({} binary sensor(s), {} light(s))",
            self.binary_sensors.len(),
            self.lights.len()
        );
        Ok(())
    }
}
