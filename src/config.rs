//! Topology configuration for a firmware image's messaging endpoints.
//!
//! Identifiers are assigned at compile time by the integrating
//! application; this module lets an image keep that assignment in one
//! reviewed YAML/JSON file and look endpoints up by name instead of
//! scattering magic numbers.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! channels:
//!   - name: imu_accel
//!     id: 1
//!   - name: sim_tick
//!     id: 100
//!
//! services:
//!   - name: baro_read
//!     id: 5
//!   - name: baro_config_read
//!     id: 6
//!   - name: baro_config_write
//!     id: 7
//!
//! ports:
//!   - name: accel_latest
//!     id: 11
//!     mode: push
//!     channel: imu_accel
//!   - name: baro_pressure
//!     id: 12
//!     mode: pull
//!     read_service: baro_read
//!   - name: baro_config
//!     id: 13
//!     mode: read_write
//!     read_service: baro_config_read
//!     write_service: baro_config_write
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ChannelId, PortId, ServiceId, NO_CHANNEL, NO_PORT, NO_SERVICE};

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A named channel identifier assignment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelDef {
    /// Endpoint name used for lookups
    pub name: String,
    /// Channel identifier
    pub id: ChannelId,
}

/// A named service identifier assignment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceDef {
    /// Endpoint name used for lookups
    pub name: String,
    /// Service identifier
    pub id: ServiceId,
}

/// The access mode of a configured data port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortMode {
    /// Push-readable: wired to a channel
    Push,
    /// Pull-readable: wired to a read service
    Pull,
    /// Read-write: wired to a read service and a write service
    ReadWrite,
}

/// A named data-port definition with its wiring.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortDef {
    /// Endpoint name used for lookups
    pub name: String,
    /// Port identifier
    pub id: PortId,
    /// Access mode; determines which wiring fields are required
    pub mode: PortMode,
    /// Channel name (push mode)
    #[serde(default)]
    pub channel: Option<String>,
    /// Read-service name (pull and read_write modes)
    #[serde(default)]
    pub read_service: Option<String>,
    /// Write-service name (read_write mode)
    #[serde(default)]
    pub write_service: Option<String>,
}

impl PortDef {
    /// Validates that the wiring fields match the mode.
    pub fn validate(&self) -> ConfigResult<()> {
        match self.mode {
            PortMode::Push => {
                if self.channel.is_none() {
                    return Err(ConfigError::Validation(format!(
                        "Port '{}' is push mode but names no channel",
                        self.name
                    )));
                }
                if self.read_service.is_some() || self.write_service.is_some() {
                    tracing::warn!(
                        "Port '{}' is push mode but names a service (ignored)",
                        self.name
                    );
                }
            }
            PortMode::Pull => {
                if self.read_service.is_none() {
                    return Err(ConfigError::Validation(format!(
                        "Port '{}' is pull mode but names no read_service",
                        self.name
                    )));
                }
            }
            PortMode::ReadWrite => {
                if self.read_service.is_none() || self.write_service.is_none() {
                    return Err(ConfigError::Validation(format!(
                        "Port '{}' is read_write mode but does not name both services",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Complete endpoint topology for one firmware image.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Topology {
    /// Channel definitions
    #[serde(default)]
    pub channels: Vec<ChannelDef>,

    /// Service definitions
    #[serde(default)]
    pub services: Vec<ServiceDef>,

    /// Port definitions
    #[serde(default)]
    pub ports: Vec<PortDef>,
}

impl Topology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a topology from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads a topology from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let topology: Topology = serde_yaml::from_str(yaml)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Loads a topology from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads a topology from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let topology: Topology = serde_json::from_str(json)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Loads a topology from a file, auto-detecting the format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the whole topology: unique names and identifiers per
    /// namespace, no sentinel identifiers, and port wiring that resolves
    /// to declared endpoints.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut channel_names = HashSet::new();
        let mut channel_ids = HashSet::new();
        for channel in &self.channels {
            if channel.id == NO_CHANNEL {
                return Err(ConfigError::Validation(format!(
                    "Channel '{}' uses the reserved none id",
                    channel.name
                )));
            }
            if !channel_names.insert(channel.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate channel name: '{}'",
                    channel.name
                )));
            }
            if !channel_ids.insert(channel.id) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate channel id: {}",
                    channel.id
                )));
            }
        }

        let mut service_names = HashSet::new();
        let mut service_ids = HashSet::new();
        for service in &self.services {
            if service.id == NO_SERVICE {
                return Err(ConfigError::Validation(format!(
                    "Service '{}' uses the reserved none id",
                    service.name
                )));
            }
            if !service_names.insert(service.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate service name: '{}'",
                    service.name
                )));
            }
            if !service_ids.insert(service.id) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate service id: {}",
                    service.id
                )));
            }
        }

        let mut port_names = HashSet::new();
        let mut port_ids = HashSet::new();
        for port in &self.ports {
            port.validate()?;
            if port.id == NO_PORT {
                return Err(ConfigError::Validation(format!(
                    "Port '{}' uses the reserved none id",
                    port.name
                )));
            }
            if !port_names.insert(port.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate port name: '{}'",
                    port.name
                )));
            }
            if !port_ids.insert(port.id) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate port id: {}",
                    port.id
                )));
            }

            if let Some(ref channel) = port.channel {
                if port.mode == PortMode::Push && !channel_names.contains(channel.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "Port '{}' references undeclared channel '{}'",
                        port.name, channel
                    )));
                }
            }
            for service in [&port.read_service, &port.write_service].into_iter().flatten() {
                if port.mode != PortMode::Push && !service_names.contains(service.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "Port '{}' references undeclared service '{}'",
                        port.name, service
                    )));
                }
            }
        }

        Ok(())
    }

    /// Looks up a channel identifier by name.
    pub fn channel_id(&self, name: &str) -> Option<ChannelId> {
        self.channels.iter().find(|c| c.name == name).map(|c| c.id)
    }

    /// Looks up a service identifier by name.
    pub fn service_id(&self, name: &str) -> Option<ServiceId> {
        self.services.iter().find(|s| s.name == name).map(|s| s.id)
    }

    /// Looks up a port identifier by name.
    pub fn port_id(&self, name: &str) -> Option<PortId> {
        self.port(name).map(|p| p.id)
    }

    /// Looks up a port definition by name.
    pub fn port(&self, name: &str) -> Option<&PortDef> {
        self.ports.iter().find(|p| p.name == name)
    }
}
