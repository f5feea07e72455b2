//! Human readable listing of what auto-setup finds in a project document.

use std::fmt;

use super::catalog::BINARY_SENSOR_PRODUCTS;
use super::catalog::LIGHT_PRODUCTS;
use super::catalog::SensorRule;
use super::device::entity_id;
use super::scanner::DiscoveredDevice;
use super::scanner::ProductInfo;
use super::scanner::ProjectDocument;
use super::scanner::ScanError;

/// Devices both platforms would discover in one project document
pub struct ScanReport {
    pub binary_sensors: Vec<DiscoveredDevice<SensorRule>>,
    pub lights: Vec<DiscoveredDevice<()>>,
}

impl ScanReport {
    pub fn from_project(xml: &str) -> Result<Self, ScanError> {
        let project = ProjectDocument::parse(xml)?;
        Ok(Self {
            binary_sensors: project
                .discover(BINARY_SENSOR_PRODUCTS)
                .collect::<Result<Vec<_>, _>>()?,
            lights: project.discover(LIGHT_PRODUCTS).collect::<Result<Vec<_>, _>>()?,
        })
    }
}

fn write_product(product: &ProductInfo, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if product.name.is_empty() && product.note.is_empty() && product.position.is_empty() {
        return Ok(());
    }
    write!(f, "  product: {}", product.name)?;
    if !product.note.is_empty() {
        write!(f, " ({})", product.note)?;
    }
    if !product.position.is_empty() {
        write!(f, " at {}", product.position)?;
    }
    writeln!(f)
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for device in &self.binary_sensors {
            writeln!(
                f,
                "{}: {}",
                entity_id("binary_sensor", device.ihcid),
                device.name
            )?;
            write!(f, "  class: {}", device.kind.device_class)?;
            if device.kind.inverted {
                write!(f, " (inverted)")?;
            }
            writeln!(f)?;
            write_product(&device.product, f)?;
        }
        for device in &self.lights {
            writeln!(f, "{}: {}", entity_id("light", device.ihcid), device.name)?;
            write_product(&device.product, f)?;
        }
        writeln!(
            f,
            "{} binary sensor(s), {} light(s)",
            self.binary_sensors.len(),
            self.lights.len()
        )
    }
}
