use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use tracing::debug;
use tracing::info;

use super::controller::IhcId;
use super::device::IhcDevice;
use super::device::lock;

/// What `register_or_update` did with an id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A new device was built and inserted
    Created,
    /// An existing device took the authoritative name
    Renamed,
    Unchanged,
}

/// Result of registering an id
pub struct Registration<D> {
    pub device: Arc<D>,
    pub outcome: RegistrationOutcome,
}

impl<D> Registration<D> {
    pub fn created(&self) -> bool {
        self.outcome == RegistrationOutcome::Created
    }
}

/// Live devices of one kind, keyed by controller id.
///
/// Holds exactly one device object per id. The registry is owned by an
/// integration instance and shared by all of its setup passes, so a reload
/// reuses the devices (and their state) created by earlier passes.
pub struct DeviceRegistry<D> {
    devices: Mutex<HashMap<IhcId, Arc<D>>>,

    /// Ids that already carry a controller subscription
    subscribed: Mutex<HashSet<IhcId>>,
}

impl<D: IhcDevice> DeviceRegistry<D> {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            subscribed: Mutex::new(HashSet::new()),
        }
    }

    /// Look up `ihcid`, creating the device with `factory` when absent.
    ///
    /// An authoritative registration (manual configuration) renames an
    /// existing device; a non-authoritative one (auto-setup) never touches it.
    /// The check and the insert happen under one lock.
    pub fn register_or_update(
        &self,
        ihcid: IhcId,
        name: &str,
        authoritative: bool,
        factory: impl FnOnce() -> D,
    ) -> Registration<D> {
        let mut devices = lock(&self.devices);

        if let Some(device) = devices.get(&ihcid) {
            let outcome = if authoritative && device.name() != name {
                info!(
                    "Renaming IHC {} {} from '{}' to '{}'",
                    D::PLATFORM,
                    ihcid,
                    device.name(),
                    name
                );
                device.set_name(name);
                RegistrationOutcome::Renamed
            } else {
                debug!("IHC {} {} already registered", D::PLATFORM, ihcid);
                RegistrationOutcome::Unchanged
            };
            return Registration {
                device: device.clone(),
                outcome,
            };
        }

        let device = Arc::new(factory());
        info!("Registered IHC {} {} '{}'", D::PLATFORM, ihcid, device.name());
        devices.insert(ihcid, device.clone());
        Registration {
            device,
            outcome: RegistrationOutcome::Created,
        }
    }

    pub fn get(&self, ihcid: IhcId) -> Option<Arc<D>> {
        lock(&self.devices).get(&ihcid).cloned()
    }

    /// All devices, ordered by id
    pub fn devices(&self) -> Vec<Arc<D>> {
        let mut devices: Vec<Arc<D>> = lock(&self.devices).values().cloned().collect();
        devices.sort_by_key(|device| device.ihcid());
        devices
    }

    pub fn len(&self) -> usize {
        lock(&self.devices).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.devices).is_empty()
    }

    /// Claim the subscription slot of `ihcid`; false if it was already taken
    pub fn mark_subscribed(&self, ihcid: IhcId) -> bool {
        lock(&self.subscribed).insert(ihcid)
    }

    /// Release the slot after a failed subscription so a later pass retries
    pub fn unmark_subscribed(&self, ihcid: IhcId) {
        lock(&self.subscribed).remove(&ihcid);
    }
}

impl<D: IhcDevice> Default for DeviceRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}
