use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::controller::IhcController;
use super::controller::IhcId;
use super::controller::NotifyHandler;
use super::controller::RuntimeValue;
use super::device::IhcDevice;
use super::registry::DeviceRegistry;

/// Subscribe `devices` to controller change notifications.
///
/// Must run after the devices were announced to the engine, so that the first
/// state report refers to a known entity. Ids that already carry a
/// subscription from an earlier pass are skipped. Handlers only hold a weak
/// reference to their device. Returns the number of new subscriptions.
pub fn bind_notifications<D: IhcDevice>(
    controller: &dyn IhcController,
    registry: &DeviceRegistry<D>,
    devices: &[Arc<D>],
) -> usize {
    let mut bound = 0;
    for device in devices {
        let ihcid = device.ihcid();
        if !registry.mark_subscribed(ihcid) {
            debug!("IHC {} {} already subscribed", D::PLATFORM, ihcid);
            continue;
        }

        match controller.add_notify_event(ihcid, handler(device)) {
            Ok(()) => bound += 1,
            Err(e) => {
                warn!("{}", e);
                registry.unmark_subscribed(ihcid);
            }
        }
    }
    bound
}

fn handler<D: IhcDevice>(device: &Arc<D>) -> NotifyHandler {
    let device = Arc::downgrade(device);
    Arc::new(move |ihcid: IhcId, value: RuntimeValue| {
        let Some(device) = device.upgrade() else {
            debug!("Dropping notification for released IHC device {}", ihcid);
            return;
        };
        if let Err(e) = device.on_change(value) {
            warn!("IHC {} {}: {}", D::PLATFORM, ihcid, e);
        }
    })
}
