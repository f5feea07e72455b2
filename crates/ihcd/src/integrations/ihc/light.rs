use std::sync::Arc;
use std::sync::Mutex;

use tracing::debug;
use tracing::info;
use tracing::warn;

use super::catalog::LIGHT_PRODUCTS;
use super::catalog::ProductRule;
use super::config::LightEntry;
use super::config::ManualEntry;
use super::controller::ControllerError;
use super::controller::IhcController;
use super::controller::IhcId;
use super::controller::RuntimeValue;
use super::device::DeviceContext;
use super::device::IhcDevice;
use super::device::NotifyError;
use super::device::Platform;
use super::device::StateReporter;
use super::device::lock;
use super::scanner::DiscoveredDevice;
use super::scanner::ProductInfo;
use crate::engine::FromIntegrationMessage;
use crate::engine::LightState;

/// Highest dimmer level the controller accepts
const MAX_LEVEL: i64 = 100;

/// Convert a 0-255 brightness into the controller's 0-100 dimmer level
fn brightness_to_level(brightness: u8) -> i64 {
    (i64::from(brightness) * MAX_LEVEL + 127) / 255
}

/// Convert a 0-100 dimmer level into a 0-255 brightness
fn level_to_brightness(level: i64) -> Result<u8, NotifyError> {
    if !(0..=MAX_LEVEL).contains(&level) {
        return Err(NotifyError::OutOfRange(level));
    }
    u8::try_from((level * 255 + MAX_LEVEL / 2) / MAX_LEVEL).map_err(|_| NotifyError::OutOfRange(level))
}

/// IHC light backed by a dimmer or relay output.
///
/// Whether the output dims is not known up front: every notification
/// reclassifies the light from the type of its payload.
pub struct IhcLight {
    ihcid: IhcId,
    name: Mutex<String>,
    product: ProductInfo,
    state: Mutex<LightState>,
    controller: Arc<dyn IhcController>,
    reporter: StateReporter,
}

impl IhcLight {
    pub fn new(
        ihcid: IhcId,
        name: String,
        product: ProductInfo,
        controller: Arc<dyn IhcController>,
        reporter: StateReporter,
    ) -> Self {
        Self {
            ihcid,
            name: Mutex::new(name),
            product,
            state: Mutex::new(LightState::default()),
            controller,
            reporter,
        }
    }

    /// Current on/off state; `None` until the first command or notification
    pub fn is_on(&self) -> Option<bool> {
        lock(&self.state).on
    }

    /// Brightness between 0 and 255
    pub fn brightness(&self) -> u8 {
        lock(&self.state).brightness
    }

    pub fn is_dimmable(&self) -> bool {
        lock(&self.state).dimmable
    }

    pub fn state(&self) -> LightState {
        lock(&self.state).clone()
    }

    /// Turn the light on, optionally at a given brightness.
    ///
    /// Turning a dimmer on without any brightness set uses full brightness.
    pub async fn turn_on(&self, brightness: Option<u8>) -> Result<(), ControllerError> {
        let (previous, command) = {
            let mut state = lock(&self.state);
            let previous = state.clone();
            state.on = Some(true);
            if let Some(brightness) = brightness {
                state.brightness = brightness;
            }

            let command = if state.dimmable {
                if state.brightness == 0 {
                    state.brightness = u8::MAX;
                }
                RuntimeValue::Int(brightness_to_level(state.brightness))
            } else {
                RuntimeValue::Bool(true)
            };
            (previous, command)
        };

        self.send(command, previous).await?;
        info!("IHC light {} turned on: {}", self.ihcid, command);
        self.report();
        Ok(())
    }

    /// Turn the light off
    pub async fn turn_off(&self) -> Result<(), ControllerError> {
        let (previous, command) = {
            let mut state = lock(&self.state);
            let previous = state.clone();
            state.on = Some(false);
            let command = if state.dimmable {
                RuntimeValue::Int(0)
            } else {
                RuntimeValue::Bool(false)
            };
            (previous, command)
        };

        self.send(command, previous).await?;
        info!("IHC light {} turned off", self.ihcid);
        self.report();
        Ok(())
    }

    /// Send `command`, rolling the state back to `previous` if the controller rejects it
    async fn send(&self, command: RuntimeValue, previous: LightState) -> Result<(), ControllerError> {
        let result = match command {
            RuntimeValue::Int(level) => {
                self.controller
                    .set_runtime_value_int(self.ihcid, level)
                    .await
            }
            RuntimeValue::Bool(on) => self.controller.set_runtime_value_bool(self.ihcid, on).await,
        };
        if result.is_err() {
            *lock(&self.state) = previous;
        }
        result
    }

    /// Report the state after a command.
    ///
    /// Read under the lock at report time: the controller may already have
    /// echoed the change, and its value wins over the requested one.
    fn report(&self) {
        let msg = FromIntegrationMessage::LightStateChanged {
            entity_id: self.entity_id(),
            state: self.state(),
        };
        if let Err(e) = self.reporter.report(msg) {
            warn!("{}", e);
        }
    }
}

impl IhcDevice for IhcLight {
    const PLATFORM: &'static str = "light";

    fn ihcid(&self) -> IhcId {
        self.ihcid
    }

    fn name(&self) -> String {
        lock(&self.name).clone()
    }

    fn set_name(&self, name: &str) {
        *lock(&self.name) = name.to_string();
    }

    fn product(&self) -> &ProductInfo {
        &self.product
    }

    fn on_change(&self, value: RuntimeValue) -> Result<(), NotifyError> {
        let state = {
            let mut state = lock(&self.state);
            match value {
                RuntimeValue::Int(level) => {
                    let brightness = level_to_brightness(level)?;
                    state.dimmable = true;
                    state.brightness = brightness;
                    state.on = Some(brightness > 0);
                }
                RuntimeValue::Bool(on) => {
                    state.dimmable = false;
                    state.on = Some(on);
                }
            }
            state.clone()
        };
        debug!(
            "IHC light {} changed: raw={} on={:?} brightness={}",
            self.ihcid, value, state.on, state.brightness
        );

        self.reporter.report(FromIntegrationMessage::LightStateChanged {
            entity_id: self.entity_id(),
            state,
        })
    }
}

impl Platform for IhcLight {
    type Rule = ();
    type Entry = LightEntry;

    fn catalog() -> &'static [ProductRule<()>] {
        LIGHT_PRODUCTS
    }

    fn from_discovery(discovered: DiscoveredDevice<()>, ctx: &DeviceContext) -> Self {
        Self::new(
            discovered.ihcid,
            discovered.name,
            discovered.product,
            ctx.controller.clone(),
            ctx.reporter.clone(),
        )
    }

    fn from_entry(ihcid: IhcId, entry: &LightEntry, ctx: &DeviceContext) -> Self {
        Self::new(
            ihcid,
            entry.name().to_string(),
            ProductInfo::default(),
            ctx.controller.clone(),
            ctx.reporter.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::FromIntegrationReceiver;
    use crate::integrations::ihc::SimulatedController;
    use crate::integrations::ihc::binder::bind_notifications;
    use crate::integrations::ihc::controller::MockController;
    use crate::integrations::ihc::registry::DeviceRegistry;

    fn light() -> (IhcLight, Arc<MockController>, FromIntegrationReceiver) {
        let (tx, rx) = mpsc::channel(16);
        let controller = Arc::new(MockController::new());
        let light = IhcLight::new(
            7,
            "Hall_7".to_string(),
            ProductInfo::default(),
            controller.clone(),
            StateReporter::new(tx),
        );
        (light, controller, rx)
    }

    #[test]
    fn test_scaling() {
        assert_eq!(brightness_to_level(0), 0);
        assert_eq!(brightness_to_level(255), 100);
        assert_eq!(brightness_to_level(128), 50);
        assert_eq!(level_to_brightness(0).unwrap(), 0);
        assert_eq!(level_to_brightness(50).unwrap(), 128);
        assert_eq!(level_to_brightness(100).unwrap(), 255);
        assert!(level_to_brightness(101).is_err());
        assert!(level_to_brightness(-1).is_err());
    }

    #[test]
    fn test_initial_state() {
        let (light, _controller, _rx) = light();
        assert_eq!(light.is_on(), None);
        assert_eq!(light.brightness(), 0);
        assert!(light.is_dimmable());
        assert_eq!(light.entity_id(), "light.ihc_7");
    }

    #[test]
    fn test_integer_notification_marks_dimmer() {
        let (light, _controller, mut rx) = light();

        light.on_change(RuntimeValue::Int(50)).unwrap();
        assert!(light.is_dimmable());
        assert_eq!(light.brightness(), 128);
        assert_eq!(light.is_on(), Some(true));

        light.on_change(RuntimeValue::Int(0)).unwrap();
        assert_eq!(light.brightness(), 0);
        assert_eq!(light.is_on(), Some(false));

        assert_eq!(
            rx.try_recv().unwrap(),
            FromIntegrationMessage::LightStateChanged {
                entity_id: "light.ihc_7".to_string(),
                state: LightState {
                    on: Some(true),
                    brightness: 128,
                    dimmable: true,
                },
            }
        );
    }

    #[test]
    fn test_boolean_notification_marks_relay() {
        let (light, _controller, _rx) = light();
        light.on_change(RuntimeValue::Int(40)).unwrap();
        let brightness = light.brightness();

        light.on_change(RuntimeValue::Bool(true)).unwrap();
        assert!(!light.is_dimmable());
        assert_eq!(light.is_on(), Some(true));
        assert_eq!(light.brightness(), brightness);

        light.on_change(RuntimeValue::Bool(false)).unwrap();
        assert_eq!(light.is_on(), Some(false));
    }

    #[test]
    fn test_out_of_range_level_keeps_state() {
        let (light, _controller, mut rx) = light();
        light.on_change(RuntimeValue::Int(20)).unwrap();
        let before = light.state();
        let _ = rx.try_recv();

        assert!(matches!(
            light.on_change(RuntimeValue::Int(250)),
            Err(NotifyError::OutOfRange(250))
        ));
        assert_eq!(light.state(), before);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_turn_on_without_brightness_uses_full_scale() {
        let (light, controller, mut rx) = light();

        light.turn_on(None).await.unwrap();
        assert_eq!(light.is_on(), Some(true));
        assert_eq!(light.brightness(), 255);
        assert_eq!(controller.commands(), vec![(7, RuntimeValue::Int(100))]);
        assert!(matches!(
            rx.try_recv().unwrap(),
            FromIntegrationMessage::LightStateChanged { .. }
        ));
    }

    #[tokio::test]
    async fn test_turn_on_with_brightness() {
        let (light, controller, _rx) = light();

        light.turn_on(Some(64)).await.unwrap();
        assert_eq!(light.brightness(), 64);
        assert_eq!(controller.commands(), vec![(7, RuntimeValue::Int(25))]);
    }

    #[tokio::test]
    async fn test_relay_commands_are_boolean() {
        let (light, controller, _rx) = light();
        light.on_change(RuntimeValue::Bool(false)).unwrap();

        light.turn_on(Some(200)).await.unwrap();
        light.turn_off().await.unwrap();

        assert_eq!(
            controller.commands(),
            vec![(7, RuntimeValue::Bool(true)), (7, RuntimeValue::Bool(false))]
        );
        assert_eq!(light.is_on(), Some(false));
    }

    #[tokio::test]
    async fn test_dimmer_turn_off_sends_zero() {
        let (light, controller, _rx) = light();
        light.turn_off().await.unwrap();
        assert_eq!(controller.commands(), vec![(7, RuntimeValue::Int(0))]);
        assert_eq!(light.is_on(), Some(false));
    }

    #[tokio::test]
    async fn test_command_failure_restores_state() {
        let (light, controller, mut rx) = light();
        light.on_change(RuntimeValue::Int(20)).unwrap();
        let _ = rx.try_recv();
        let before = light.state();
        controller.fail_commands.store(true, Ordering::SeqCst);

        assert!(light.turn_on(None).await.is_err());
        assert_eq!(light.state(), before);
        assert!(light.turn_off().await.is_err());
        assert_eq!(light.state(), before);
        assert!(rx.try_recv().is_err());

        controller.fail_commands.store(false, Ordering::SeqCst);
        light.turn_on(None).await.unwrap();
        assert_eq!(controller.commands(), vec![(7, RuntimeValue::Int(20))]);
    }

    #[tokio::test]
    async fn test_controller_echo_wins_over_requested_brightness() {
        let (tx, mut rx) = mpsc::channel(16);
        let controller = Arc::new(SimulatedController::new(None));
        let light = Arc::new(IhcLight::new(
            7,
            "Hall_7".to_string(),
            ProductInfo::default(),
            controller.clone(),
            StateReporter::new(tx),
        ));
        bind_notifications(controller.as_ref(), &DeviceRegistry::new(), &[light.clone()]);

        // 200 goes out as level 78, which reads back as 199
        light.turn_on(Some(200)).await.unwrap();
        assert_eq!(light.brightness(), 199);

        let mut last = None;
        while let Ok(msg) = rx.try_recv() {
            last = Some(msg);
        }
        assert_eq!(
            last,
            Some(FromIntegrationMessage::LightStateChanged {
                entity_id: "light.ihc_7".to_string(),
                state: LightState {
                    on: Some(true),
                    brightness: 199,
                    dimmable: true,
                },
            })
        );
    }
}
