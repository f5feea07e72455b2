//! IHC controller integration.
//!
//! Devices come from two sources: auto-setup scans the controller's project
//! document against the product catalog, and manual entries in the
//! configuration name devices by id. Both feed a per-platform registry that
//! keeps one device per controller id. Devices are announced to the engine
//! before they are subscribed to controller notifications.

mod binder;
pub mod binary_sensor;
pub mod catalog;
mod config;
pub mod controller;
pub mod device;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod ihc;
pub mod light;
mod platform;
pub mod registry;
pub mod report;
pub mod scanner;
mod simulated;

use anyhow::Context;
pub use config::BinarySensorEntry;
pub use config::Config as IhcConfig;
pub use config::LightEntry;
pub use config::PlatformConfig;
pub use ihc::IhcIntegration;
use linkme::distributed_slice;
pub use simulated::SimulatedController;

use crate::engine;

/// Name the integration registers its entities under
pub const INTEGRATION_NAME: &str = "ihc";

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_ihc(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let ihc_config = if let Some(c) = &ctx.config.integrations.ihc {
        c
    } else {
        return Ok(None);
    };

    ihc_config
        .validate()
        .context("Invalid IHC configuration")?;

    let controller = SimulatedController::new(ihc_config.project_file.clone());
    Ok(Some(Box::new(IhcIntegration::new(controller, ihc_config))))
}
