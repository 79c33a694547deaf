//! Desired state of a QEMU VM, as supplied by the caller.

use crate::core::domain::{
    catalog::{OsFamily, Size},
    error::{ProxmoxResult, ValidationError},
    model::vm_config::is_net_slot,
    value_object::{DiskSize, VmId, serde_helpers::NumberOrString},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hugepage backing for guest memory.
///
/// On the wire "disabled" is the absence of the `hugepages` key, never a
/// false value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Hugepages {
    #[default]
    Disabled,
    Any,
    /// 2 MB pages.
    Size2M,
    /// 1 GB pages.
    Size1G,
}

impl Hugepages {
    /// The value to send, or `None` when the key must be omitted.
    #[must_use]
    pub fn wire_value(self) -> Option<&'static str> {
        match self {
            Hugepages::Disabled => None,
            Hugepages::Any => Some("any"),
            Hugepages::Size2M => Some("2"),
            Hugepages::Size1G => Some("1024"),
        }
    }

    /// Maps the raw config value back; a missing key means disabled.
    pub fn from_config(raw: Option<&str>) -> Result<Self, ValidationError> {
        match raw.map(str::trim) {
            None | Some("") | Some("0") => Ok(Hugepages::Disabled),
            Some("any") => Ok(Hugepages::Any),
            Some("2") => Ok(Hugepages::Size2M),
            Some("1024") => Ok(Hugepages::Size1G),
            Some(other) => Err(ValidationError::field(
                "hugepages",
                format!("expected any, 2 or 1024, got '{}'", other),
            )),
        }
    }
}

impl TryFrom<NumberOrString> for Hugepages {
    type Error = ValidationError;

    fn try_from(raw: NumberOrString) -> Result<Self, Self::Error> {
        match raw {
            NumberOrString::Bool(false) => Ok(Hugepages::Disabled),
            NumberOrString::Bool(true) => Err(ValidationError::field(
                "hugepages",
                "use any, 2 or 1024 instead of true",
            )),
            other => Hugepages::from_config(Some(&other.into_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Hugepages {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = NumberOrString::deserialize(deserializer)?;
        Hugepages::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Hugepages {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.wire_value() {
            Some(value) => serializer.serialize_str(value),
            None => serializer.serialize_bool(false),
        }
    }
}

impl fmt::Display for Hugepages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_value().unwrap_or("disabled"))
    }
}

/// Desired state of a VM. Immutable for the duration of one convergence call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmSpec {
    /// Unique name; the natural key when `vmid` is absent.
    pub name: String,
    /// Explicit id. Allocated from the cluster when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmid: Option<VmId>,
    /// Target node.
    pub host: String,
    #[serde(default)]
    pub size: Size,
    /// Interface slot (`net0`...) to descriptor (`virtio,bridge=vmbr0`).
    #[serde(default = "default_net")]
    pub net: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub numa: bool,
    #[serde(default)]
    pub hugepages: Hugepages,
    /// OS family alias, resolved through the OS type catalog.
    #[serde(default = "default_ostype")]
    pub ostype: String,
    /// Primary virtio disk size.
    #[serde(default = "default_disk")]
    pub disk: DiskSize,
    #[serde(default = "default_storage")]
    pub storage: String,
    /// Boot media volume, or `none`.
    #[serde(default = "default_cdrom")]
    pub cdrom: String,
    /// Source VM to clone from instead of creating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone: Option<VmId>,
    /// Full copy of the source disks rather than a linked clone.
    #[serde(default = "default_true")]
    pub full_copy: bool,
    /// Mark the result as a template.
    #[serde(default)]
    pub template: bool,
}

fn default_true() -> bool {
    true
}

fn default_net() -> BTreeMap<String, String> {
    BTreeMap::from([("net0".to_string(), "virtio,bridge=vmbr0".to_string())])
}

fn default_ostype() -> String {
    "linux".to_string()
}

fn default_disk() -> DiskSize {
    DiskSize::default()
}

fn default_storage() -> String {
    "local".to_string()
}

fn default_cdrom() -> String {
    "none".to_string()
}

impl VmSpec {
    /// A spec with every optional field at its default.
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vmid: None,
            host: host.into(),
            size: Size::default(),
            net: default_net(),
            numa: true,
            hugepages: Hugepages::Disabled,
            ostype: default_ostype(),
            disk: default_disk(),
            storage: default_storage(),
            cdrom: default_cdrom(),
            clone: None,
            full_copy: true,
            template: false,
        }
    }

    /// Resolved OS family for `ostype`.
    pub fn os_family(&self) -> ProxmoxResult<OsFamily> {
        OsFamily::from_alias(&self.ostype)
    }

    /// Checks the fields serde cannot: names, node names and slot keys.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::field("name", "VM name cannot be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::field("host", "Target host cannot be empty"));
        }
        if self.storage.trim().is_empty() {
            return Err(ValidationError::field("storage", "Storage cannot be empty"));
        }
        if let Some(key) = self.net.keys().find(|key| !is_net_slot(key)) {
            return Err(ValidationError::field(
                "net",
                format!("'{}' is not an interface slot (expected net0, net1, ...)", key),
            ));
        }
        if let Size::Custom { cpu: 0, .. } | Size::Custom { memory: 0, .. } = self.size {
            return Err(ValidationError::ConstraintViolation(
                "Custom size needs at least one core and some memory".to_string(),
            ));
        }
        Ok(())
    }
}
