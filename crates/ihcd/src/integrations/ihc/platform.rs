use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::error;
use tracing::info;
use tracing::warn;

use super::binder::bind_notifications;
use super::config::ManualEntry;
use super::config::PlatformConfig;
use super::controller::ControllerError;
use super::controller::IhcId;
use super::device::DeviceContext;
use super::device::IhcDevice;
use super::device::Platform;
use super::registry::DeviceRegistry;
use super::registry::RegistrationOutcome;
use super::scanner::DiscoveredDevice;
use super::scanner::ScanError;
use super::scanner::scan;
use crate::config::ConfigError;

/// Why auto-setup registered nothing
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Summary of one setup pass of a platform
pub struct SetupOutcome<D> {
    /// Every device touched by the pass, ordered by id
    pub devices: Vec<Arc<D>>,

    pub created: usize,
    pub renamed: usize,

    /// New controller subscriptions
    pub subscribed: usize,

    /// Set when auto-setup was enabled but failed
    pub discovery_error: Option<DiscoveryError>,
}

/// Run one setup pass for the platform `D`.
///
/// Auto-discovered devices are registered first, then manual entries, which
/// take precedence over discovered names. A failed discovery is logged and
/// recorded in the outcome; manual entries are still registered. New and
/// renamed devices are announced to the engine before any subscription is
/// made.
pub async fn setup_platform<D: Platform>(
    ctx: &DeviceContext,
    registry: &DeviceRegistry<D>,
    config: &PlatformConfig<D::Entry>,
) -> Result<SetupOutcome<D>, ConfigError> {
    let entries = config.entries(D::PLATFORM)?;

    // Devices of this pass and whether the engine has to hear about them
    let mut pass: BTreeMap<IhcId, (Arc<D>, bool)> = BTreeMap::new();
    let mut record = |device: Arc<D>, outcome: RegistrationOutcome| {
        let announce = outcome != RegistrationOutcome::Unchanged;
        pass.entry(device.ihcid())
            .and_modify(|(_, a)| *a |= announce)
            .or_insert((device, announce));
        outcome
    };

    let mut discovery_error = None;
    let mut outcomes = Vec::new();
    if config.autosetup {
        match discover::<D>(ctx).await {
            Ok(discovered) => {
                info!(
                    "IHC auto-setup found {} {} device(s)",
                    discovered.len(),
                    D::PLATFORM
                );
                for device in discovered {
                    let name = device.name.clone();
                    let reg = registry.register_or_update(device.ihcid, &name, false, || {
                        D::from_discovery(device, ctx)
                    });
                    outcomes.push(record(reg.device, reg.outcome));
                }
            }
            Err(e) => {
                error!("IHC {} auto-setup failed: {}", D::PLATFORM, e);
                discovery_error = Some(e);
            }
        }
    }

    for (ihcid, entry) in entries {
        let reg = registry.register_or_update(ihcid, entry.name(), true, || {
            D::from_entry(ihcid, entry, ctx)
        });
        outcomes.push(record(reg.device, reg.outcome));
    }

    for (device, announce) in pass.values() {
        if !announce {
            continue;
        }
        if let Err(e) = ctx
            .reporter
            .announce(device.entity_id(), device.name())
            .await
        {
            warn!("{}", e);
        }
    }

    let devices: Vec<Arc<D>> = pass.into_values().map(|(device, _)| device).collect();
    let subscribed = bind_notifications(ctx.controller.as_ref(), registry, &devices);

    let count = |wanted: RegistrationOutcome| outcomes.iter().filter(|o| **o == wanted).count();
    let outcome = SetupOutcome {
        created: count(RegistrationOutcome::Created),
        renamed: count(RegistrationOutcome::Renamed),
        subscribed,
        devices,
        discovery_error,
    };
    info!(
        "IHC {} setup: {} device(s), {} new, {} renamed, {} subscribed",
        D::PLATFORM,
        outcome.devices.len(),
        outcome.created,
        outcome.renamed,
        outcome.subscribed
    );
    Ok(outcome)
}

async fn discover<D: Platform>(
    ctx: &DeviceContext,
) -> Result<Vec<DiscoveredDevice<D::Rule>>, DiscoveryError> {
    let project = ctx.controller.get_project().await?;
    Ok(scan(&project, D::catalog())?)
}
