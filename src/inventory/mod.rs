//! Inventory loading and group queries.
//!
//! The orchestrator consumes a resolved inventory: a TOML file of devices
//! with their addresses, credentials, and group tags. Credential values
//! may point at environment variables (`$VAR`), which is resolved at load
//! time, so the backup core never sees anything but usable credentials.

use crate::models::{Category, Credentials, Device};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    defaults: DefaultsSection,
    #[serde(default)]
    devices: Vec<DeviceEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct DefaultsSection {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    name: String,
    address: String,
    username: Option<String>,
    password: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
}

/// The resolved device inventory for one run.
#[derive(Debug)]
pub struct Inventory {
    devices: Vec<Device>,
}

impl Inventory {
    /// Load and resolve an inventory file. Fails on unreadable or
    /// unparsable files, missing credentials, unresolvable environment
    /// indirections, and devices without exactly one backup category.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read inventory file: {}", path.display()))?;
        let file: InventoryFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse inventory file: {}", path.display()))?;

        Self::resolve(file)
    }

    fn resolve(file: InventoryFile) -> Result<Self> {
        let mut devices = Vec::with_capacity(file.devices.len());

        for entry in file.devices {
            let username = entry
                .username
                .or_else(|| file.defaults.username.clone())
                .with_context(|| format!("device {} has no username", entry.name))?;
            let password = entry
                .password
                .or_else(|| file.defaults.password.clone())
                .with_context(|| format!("device {} has no password", entry.name))?;

            let device = Device {
                credentials: Credentials {
                    username: resolve_secret(&username)
                        .with_context(|| format!("username for device {}", entry.name))?,
                    password: resolve_secret(&password)
                        .with_context(|| format!("password for device {}", entry.name))?,
                },
                name: entry.name,
                address: entry.address,
                groups: entry.groups,
            };

            if device.category().is_none() {
                bail!(
                    "device {} does not map to exactly one backup category (groups: {:?})",
                    device.name,
                    device.groups
                );
            }

            devices.push(device);
        }

        debug!(devices = devices.len(), "inventory resolved");
        Ok(Self { devices })
    }

    /// All devices, in file order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Devices carrying the given group tag.
    pub fn devices_in_group(&self, tag: &str) -> Vec<&Device> {
        self.devices.iter().filter(|d| d.in_group(tag)).collect()
    }

    /// Set difference: devices in `tag` that do not also carry `exclude`.
    pub fn devices_in_group_except(&self, tag: &str, exclude: &str) -> Vec<&Device> {
        self.devices
            .iter()
            .filter(|d| d.in_group(tag) && !d.in_group(exclude))
            .collect()
    }

    /// Devices belonging to the given backup category.
    pub fn devices_in_category(&self, category: Category) -> Vec<&Device> {
        self.devices
            .iter()
            .filter(|d| d.category() == Some(category))
            .collect()
    }
}

/// Resolve `$VAR` credential indirection against the environment; a
/// literal value passes through unchanged.
fn resolve_secret(raw: &str) -> Result<String> {
    match raw.strip_prefix('$') {
        Some(var) => std::env::var(var)
            .with_context(|| format!("environment variable {} is not set", var)),
        None => Ok(raw.to_string()),
    }
}
