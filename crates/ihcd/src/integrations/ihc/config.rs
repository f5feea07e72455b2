use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use super::binary_sensor::BinarySensorDeviceClass;
use super::controller::IhcId;
use super::scanner::parse_ihc_id;
use crate::config::ConfigError;

/// Configuration for the IHC integration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Project document loaded by the simulated controller
    #[serde(default)]
    pub project_file: Option<PathBuf>,

    #[serde(default)]
    pub binary_sensor: PlatformConfig<BinarySensorEntry>,

    #[serde(default)]
    pub light: PlatformConfig<LightEntry>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.binary_sensor.entries("binary_sensor")?;
        self.light.entries("light")?;
        Ok(())
    }
}

/// Per-platform options
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "E: Deserialize<'de>"))]
pub struct PlatformConfig<E> {
    /// Discover devices from the controller's project document
    #[serde(default)]
    pub autosetup: bool,

    /// Manually configured devices keyed by controller id (`"12345"` or `"0x3039"`)
    #[serde(default)]
    pub ids: BTreeMap<String, E>,
}

impl<E> Default for PlatformConfig<E> {
    fn default() -> Self {
        Self {
            autosetup: false,
            ids: BTreeMap::new(),
        }
    }
}

impl<E: ManualEntry> PlatformConfig<E> {
    /// Parse and check all manual entries
    pub fn entries(&self, platform: &'static str) -> Result<Vec<(IhcId, &E)>, ConfigError> {
        self.ids
            .iter()
            .map(|(id, entry)| {
                let ihcid = parse_ihc_id(id).map_err(|source| ConfigError::InvalidId {
                    platform,
                    id: id.clone(),
                    source,
                })?;
                if entry.name().trim().is_empty() {
                    return Err(ConfigError::EmptyName {
                        platform,
                        id: id.clone(),
                    });
                }
                Ok((ihcid, entry))
            })
            .collect()
    }
}

/// A manually configured device
pub trait ManualEntry: Send + Sync {
    fn name(&self) -> &str;
}

/// Manual binary sensor entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BinarySensorEntry {
    pub name: String,

    #[serde(default, rename = "type", alias = "device_class")]
    pub device_class: Option<BinarySensorDeviceClass>,

    /// Report the opposite of the input value
    #[serde(default)]
    pub inverting: bool,
}

impl ManualEntry for BinarySensorEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Manual light entry, either just a name or a table with a name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LightEntry {
    Name(String),
    Table { name: String },
}

impl ManualEntry for LightEntry {
    fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Table { name } => name,
        }
    }
}
