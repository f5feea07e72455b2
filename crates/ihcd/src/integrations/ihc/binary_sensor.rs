use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::catalog::BINARY_SENSOR_PRODUCTS;
use super::catalog::ProductRule;
use super::catalog::SensorRule;
use super::config::BinarySensorEntry;
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
use crate::engine::BinarySensorState;
use crate::engine::FromIntegrationMessage;

/// Device class for binary sensors, matching Home Assistant's binary_sensor device classes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BinarySensorDeviceClass {
    Battery,
    BatteryCharging,
    CarbonMonoxide,
    Cold,
    Connectivity,
    Door,
    GarageDoor,
    Gas,
    Heat,
    Light,
    Lock,
    Moisture,
    Motion,
    Moving,
    Occupancy,
    Opening,
    Plug,
    Power,
    Presence,
    Problem,
    Running,
    Safety,
    Smoke,
    Sound,
    Tamper,
    Update,
    Vibration,
    Window,
}

/// IHC binary sensor backed by a controller input
#[derive(Debug)]
pub struct IhcBinarySensor {
    ihcid: IhcId,
    name: Mutex<String>,
    device_class: Option<BinarySensorDeviceClass>,
    inverted: bool,
    product: ProductInfo,
    state: Mutex<BinarySensorState>,
    reporter: StateReporter,
}

impl IhcBinarySensor {
    pub fn new(
        ihcid: IhcId,
        name: String,
        device_class: Option<BinarySensorDeviceClass>,
        inverted: bool,
        product: ProductInfo,
        reporter: StateReporter,
    ) -> Self {
        Self {
            ihcid,
            name: Mutex::new(name),
            device_class,
            inverted,
            product,
            state: Mutex::new(BinarySensorState::default()),
            reporter,
        }
    }

    pub fn device_class(&self) -> Option<BinarySensorDeviceClass> {
        self.device_class
    }

    pub fn inverted(&self) -> bool {
        self.inverted
    }

    /// Current state; `None` until the first notification
    pub fn is_on(&self) -> Option<bool> {
        lock(&self.state).on
    }

    pub fn state(&self) -> BinarySensorState {
        lock(&self.state).clone()
    }
}

impl IhcDevice for IhcBinarySensor {
    const PLATFORM: &'static str = "binary_sensor";

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
        let raw = match value {
            RuntimeValue::Bool(b) => b,
            RuntimeValue::Int(i) => i != 0,
        };

        let state = {
            let mut state = lock(&self.state);
            state.on = Some(raw != self.inverted);
            state.clone()
        };
        debug!(
            "IHC sensor {} changed: raw={} on={:?}",
            self.ihcid, value, state.on
        );

        // Reported on every notification, even when the state did not change
        self.reporter
            .report(FromIntegrationMessage::BinarySensorStateChanged {
                entity_id: self.entity_id(),
                state,
            })
    }
}

impl Platform for IhcBinarySensor {
    type Rule = SensorRule;
    type Entry = BinarySensorEntry;

    fn catalog() -> &'static [ProductRule<SensorRule>] {
        BINARY_SENSOR_PRODUCTS
    }

    fn from_discovery(discovered: DiscoveredDevice<SensorRule>, ctx: &DeviceContext) -> Self {
        Self::new(
            discovered.ihcid,
            discovered.name,
            Some(discovered.kind.device_class),
            discovered.kind.inverted,
            discovered.product,
            ctx.reporter.clone(),
        )
    }

    fn from_entry(ihcid: IhcId, entry: &BinarySensorEntry, ctx: &DeviceContext) -> Self {
        Self::new(
            ihcid,
            entry.name.clone(),
            entry.device_class,
            entry.inverting,
            ProductInfo::default(),
            ctx.reporter.clone(),
        )
    }
}
