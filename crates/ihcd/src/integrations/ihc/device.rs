use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use super::catalog::ProductRule;
use super::config::ManualEntry;
use super::controller::IhcController;
use super::controller::IhcId;
use super::controller::RuntimeValue;
use super::scanner::DiscoveredDevice;
use super::scanner::ProductInfo;
use super::INTEGRATION_NAME;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;

/// Host entity id of an IHC device, e.g. `light.ihc_42`
pub fn entity_id(platform: &str, ihcid: IhcId) -> String {
    format!("{}.ihc_{}", platform, ihcid)
}

/// Identity and notification handling shared by every IHC device
pub trait IhcDevice: Send + Sync + 'static {
    /// Host platform the device belongs to (`binary_sensor`, `light`)
    const PLATFORM: &'static str;

    fn ihcid(&self) -> IhcId;

    fn name(&self) -> String;

    fn set_name(&self, name: &str);

    fn product(&self) -> &ProductInfo;

    fn entity_id(&self) -> String {
        entity_id(Self::PLATFORM, self.ihcid())
    }

    /// Translate a controller notification into a state transition and report it
    fn on_change(&self, value: RuntimeValue) -> Result<(), NotifyError>;
}

/// A device kind that can be created by platform setup
pub trait Platform: IhcDevice + Sized {
    /// Data the catalog attaches to discovered devices
    type Rule: Clone + Send + Sync + 'static;

    /// Manual configuration entry
    type Entry: ManualEntry;

    fn catalog() -> &'static [ProductRule<Self::Rule>];

    fn from_discovery(discovered: DiscoveredDevice<Self::Rule>, ctx: &DeviceContext) -> Self;

    fn from_entry(ihcid: IhcId, entry: &Self::Entry, ctx: &DeviceContext) -> Self;
}

/// Collaborators handed to every device at construction
#[derive(Clone)]
pub struct DeviceContext {
    pub controller: Arc<dyn IhcController>,
    pub reporter: StateReporter,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Dimmer level {0} is outside 0-100")]
    OutOfRange(i64),

    #[error("Failed to report state of {entity_id}: {reason}")]
    Report { entity_id: String, reason: String },
}

/// Pushes device state to the engine.
///
/// Sending never blocks, so it is safe from synchronous notification handlers.
#[derive(Debug, Clone)]
pub struct StateReporter {
    tx: FromIntegrationSender,
}

impl StateReporter {
    pub fn new(tx: FromIntegrationSender) -> Self {
        Self { tx }
    }

    pub fn report(&self, msg: FromIntegrationMessage) -> Result<(), NotifyError> {
        let entity_id = match &msg {
            FromIntegrationMessage::EntityDiscovered { entity_id, .. }
            | FromIntegrationMessage::LightStateChanged { entity_id, .. }
            | FromIntegrationMessage::BinarySensorStateChanged { entity_id, .. } => {
                entity_id.clone()
            }
        };
        self.tx.try_send(msg).map_err(|e| NotifyError::Report {
            entity_id,
            reason: e.to_string(),
        })
    }

    /// Register an entity with the engine, waiting for channel capacity
    pub async fn announce(&self, entity_id: String, name: String) -> Result<(), NotifyError> {
        let msg = FromIntegrationMessage::EntityDiscovered {
            entity_id: entity_id.clone(),
            name,
            integration_name: INTEGRATION_NAME.to_string(),
        };
        self.tx.send(msg).await.map_err(|e| NotifyError::Report {
            entity_id,
            reason: e.to_string(),
        })
    }
}

/// Lock a device field, recovering the data if a previous holder panicked
pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::BinarySensorState;
    use crate::engine::LightState;

    #[test]
    fn test_entity_id() {
        assert_eq!(entity_id("light", 42), "light.ihc_42");
        assert_eq!(entity_id("binary_sensor", 7), "binary_sensor.ihc_7");
    }

    #[test]
    fn test_report_fails_when_channel_full() {
        let (tx, _rx) = mpsc::channel(1);
        let reporter = StateReporter::new(tx);
        let msg = FromIntegrationMessage::BinarySensorStateChanged {
            entity_id: "binary_sensor.ihc_1".to_string(),
            state: BinarySensorState { on: Some(true) },
        };

        reporter.report(msg.clone()).unwrap();
        let err = reporter.report(msg).unwrap_err();
        assert!(matches!(err, NotifyError::Report { entity_id, .. } if entity_id == "binary_sensor.ihc_1"));
    }

    #[test]
    fn test_report_fails_when_engine_gone() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let reporter = StateReporter::new(tx);
        let result = reporter.report(FromIntegrationMessage::LightStateChanged {
            entity_id: "light.ihc_1".to_string(),
            state: LightState::default(),
        });
        assert!(result.is_err());
    }
}
