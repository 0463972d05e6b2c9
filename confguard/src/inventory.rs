//! Device inventory: identity and connection parameters for each device.
//!
//! Inventories are YAML documents:
//!
//! ```yaml
//! settings:
//!   workers: 8
//!   command_timeout_secs: 120
//! devices:
//!   - host: 192.168.1.1
//!     device_type: cisco_ios
//!     username: admin
//!     password: secret
//!   - host: 192.168.1.2
//!     device_type: juniper_junos
//!     username: netops
//!     key_file: /home/netops/.ssh/id_ed25519
//!     port: 2222
//! ```
//!
//! Hosts are unique within an inventory; device order is preserved.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use log::info;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::InventoryError;
use crate::settings::RunSettings;

/// Authentication material for one device.
#[derive(Default, Deserialize)]
pub struct Credentials {
    /// Login user.
    #[serde(default)]
    pub username: String,

    /// Password, used for password authentication.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    /// Private key file, used when no password is set.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Passphrase for an encrypted key file.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub key_passphrase: Option<SecretString>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_file", &self.key_file)
            .finish_non_exhaustive()
    }
}

/// Identity and connection parameters for one device.
///
/// Immutable once loaded. Within one run a device is identified by its host.
#[derive(Debug, Deserialize)]
pub struct DeviceDescriptor {
    /// Hostname or IP address.
    pub host: String,

    /// Device family (e.g., "cisco_ios", "juniper_junos"). Empty selects
    /// the generic profile.
    #[serde(default, rename = "device_type", alias = "family")]
    pub family: String,

    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login credentials.
    #[serde(flatten)]
    pub credentials: Credentials,
}

impl DeviceDescriptor {
    /// Create a descriptor with default port and no credentials.
    pub fn new(host: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            family: family.into(),
            port: default_port(),
            credentials: Credentials::default(),
        }
    }

    /// Set the SSH port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set password authentication.
    pub fn with_password(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials.username = username.into();
        self.credentials.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn with_key_file(mut self, username: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.credentials.username = username.into();
        self.credentials.key_file = Some(path.into());
        self
    }
}

fn default_port() -> u16 {
    22
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

#[derive(Deserialize)]
struct InventoryFile {
    #[serde(default)]
    settings: RunSettings,
    #[serde(default)]
    devices: Vec<DeviceDescriptor>,
}

/// Ordered set of devices plus the run settings declared alongside them.
#[derive(Debug, Default)]
pub struct Inventory {
    devices: Vec<DeviceDescriptor>,
    settings: RunSettings,
}

impl Inventory {
    /// Build an inventory from descriptors, rejecting blank and duplicate hosts.
    pub fn from_devices(
        devices: impl IntoIterator<Item = DeviceDescriptor>,
    ) -> Result<Self, InventoryError> {
        let mut hosts = IndexSet::new();
        let mut ordered = Vec::new();
        for (index, device) in devices.into_iter().enumerate() {
            if device.host.trim().is_empty() {
                return Err(InventoryError::EmptyHost { index });
            }
            if !hosts.insert(device.host.clone()) {
                return Err(InventoryError::DuplicateHost { host: device.host });
            }
            ordered.push(device);
        }
        Ok(Self {
            devices: ordered,
            settings: RunSettings::default(),
        })
    }

    /// Parse an inventory from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, InventoryError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: InventoryFile = serde_yaml::from_str(yaml)?;
        let mut inventory = Self::from_devices(file.devices)?;
        inventory.settings = file.settings;
        Ok(inventory)
    }

    /// Load an inventory from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InventoryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let inventory = Self::from_yaml_str(&text)?;
        info!("Loaded {} devices from {}", inventory.len(), path.display());
        Ok(inventory)
    }

    /// Restrict the inventory to a single host. Yields an empty inventory
    /// if the host is not present.
    pub fn only(mut self, host: &str) -> Self {
        self.devices.retain(|device| device.host == host);
        self
    }

    /// Devices in inventory order.
    pub fn devices(&self) -> impl ExactSizeIterator<Item = &DeviceDescriptor> {
        self.devices.iter()
    }

    /// Devices as a slice in inventory order.
    pub fn as_slice(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Look up a device by host.
    pub fn get(&self, host: &str) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|device| device.host == host)
    }

    /// Run settings declared in the inventory file.
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the inventory has no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::ExposeSecret;

    use super::*;

    const YAML: &str = r#"
settings:
  workers: 2
  command_timeout_secs: 90
devices:
  - host: 192.168.1.1
    device_type: cisco_ios
    username: admin
    password: admin123
  - host: 192.168.1.2
    device_type: juniper_junos
    username: netops
    key_file: /tmp/id_ed25519
    port: 2222
"#;

    #[test]
    fn test_parse_inventory() {
        let inventory = Inventory::from_yaml_str(YAML).unwrap();
        assert_eq!(inventory.len(), 2);

        let hosts: Vec<_> = inventory.devices().map(|d| d.host.as_str()).collect();
        assert_eq!(hosts, ["192.168.1.1", "192.168.1.2"]);

        let r1 = inventory.get("192.168.1.1").unwrap();
        assert_eq!(r1.family, "cisco_ios");
        assert_eq!(r1.port, 22);
        assert_eq!(r1.credentials.username, "admin");
        assert_eq!(
            r1.credentials.password.as_ref().unwrap().expose_secret(),
            "admin123"
        );

        let r2 = inventory.get("192.168.1.2").unwrap();
        assert_eq!(r2.port, 2222);
        assert!(r2.credentials.password.is_none());
        assert_eq!(
            r2.credentials.key_file.as_deref(),
            Some(Path::new("/tmp/id_ed25519"))
        );

        assert_eq!(inventory.settings().workers, 2);
        assert_eq!(inventory.settings().command_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_duplicate_host_rejected() {
        let yaml = "devices:\n  - host: r1\n  - host: r1\n";
        let err = Inventory::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateHost { ref host } if host == "r1"));
    }

    #[test]
    fn test_empty_host_rejected() {
        let yaml = "devices:\n  - host: r1\n  - host: \"  \"\n";
        let err = Inventory::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, InventoryError::EmptyHost { index: 1 }));
    }

    #[test]
    fn test_empty_document() {
        let inventory = Inventory::from_yaml_str("").unwrap();
        assert!(inventory.is_empty());
    }

    #[test]
    fn test_only_filters_host() {
        let inventory = Inventory::from_yaml_str(YAML).unwrap().only("192.168.1.2");
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.as_slice()[0].host, "192.168.1.2");

        let none = Inventory::from_yaml_str(YAML).unwrap().only("10.9.9.9");
        assert!(none.is_empty());
    }

    #[test]
    fn test_debug_redacts_password() {
        let device = DeviceDescriptor::new("r1", "cisco_ios").with_password("admin", "hunter2");
        let debug = format!("{:?}", device);
        assert!(!debug.contains("hunter2"));
    }
}
