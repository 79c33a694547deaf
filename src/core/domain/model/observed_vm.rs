//! Current state of a VM as read back from the cluster.

use crate::core::domain::{
    catalog::{OsFamily, Size, size_of},
    error::ProxmoxResult,
    model::{cluster_resource::GuestResource, vm_config::VmConfig, vm_spec::Hugepages},
    value_object::VmId,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Run state reported by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VmStatus {
    Running,
    Stopped,
    /// Anything else (`paused`, `prelaunch`, `unknown`...), verbatim.
    Other(String),
}

impl VmStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "running" => VmStatus::Running,
            "stopped" => VmStatus::Stopped,
            other => VmStatus::Other(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, VmStatus::Running)
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmStatus::Running => f.write_str("running"),
            VmStatus::Stopped => f.write_str("stopped"),
            VmStatus::Other(s) => f.write_str(s),
        }
    }
}

impl Serialize for VmStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A VM that exists in the cluster, reverse-mapped into `VmSpec` terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedVm {
    pub vmid: VmId,
    pub name: String,
    /// Node currently hosting the VM.
    pub host: String,
    pub status: VmStatus,
    pub template: bool,
    /// Boot disk size in bytes, when the listing reports it.
    pub maxdisk: Option<u64>,
    pub size: Size,
    pub net: BTreeMap<String, String>,
    pub numa: bool,
    pub hugepages: Hugepages,
    /// `None` when the config carries no `ostype`.
    #[serde(serialize_with = "serialize_os_family")]
    pub ostype: Option<OsFamily>,
    pub onboot: bool,
}

fn serialize_os_family<S>(family: &Option<OsFamily>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match family {
        Some(family) => serializer.serialize_str(family.name()),
        None => serializer.serialize_none(),
    }
}

impl ObservedVm {
    /// Combines a resource-list entry with its config.
    ///
    /// # Errors
    /// `UnknownOsType` when the config carries an `ostype` code no catalog
    /// family knows, `Validation` for an unrecognised hugepages value.
    pub fn from_parts(resource: &GuestResource, config: &VmConfig) -> ProxmoxResult<Self> {
        let cpu = config.cores.unwrap_or(1);
        let memory = config.memory.unwrap_or(512);
        let ostype = config
            .ostype
            .as_deref()
            .map(OsFamily::from_code)
            .transpose()?;

        Ok(Self {
            vmid: resource.vmid,
            name: resource
                .name
                .clone()
                .or_else(|| config.name.clone())
                .unwrap_or_default(),
            host: resource.node.clone(),
            status: VmStatus::parse(&resource.status),
            template: resource.is_template(),
            maxdisk: resource.maxdisk,
            size: size_of(saturating_u32(cpu), saturating_u32(memory)),
            net: config.net(),
            numa: config.numa.unwrap_or(false),
            hugepages: Hugepages::from_config(config.hugepages.as_deref())?,
            ostype,
            onboot: config.onboot.unwrap_or(false),
        })
    }
}

fn saturating_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
