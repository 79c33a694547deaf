//! Domain models for cluster-wide resources.
//!
//! This module defines the structures returned by the `/cluster/resources` endpoint.
//! Queried with `type=vm` the list holds QEMU guests and LXC containers, each
//! identified by a `type` field. We model this as an enum to provide type safety.

use crate::core::domain::value_object::{VmId, serde_helpers};
use serde::{Deserialize, Serialize};

/// A resource discovered in the Proxmox cluster.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClusterResource {
    /// A QEMU virtual machine.
    Qemu(GuestResource),
    /// An LXC container.
    Lxc(GuestResource),
    /// Storage, nodes, pools and anything newer releases add.
    #[serde(other)]
    Other,
}

impl ClusterResource {
    /// Returns the guest if this entry is a QEMU VM.
    pub fn as_qemu(&self) -> Option<&GuestResource> {
        match self {
            ClusterResource::Qemu(vm) => Some(vm),
            _ => None,
        }
    }
}

/// Fields shared by QEMU and LXC entries of the resource list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GuestResource {
    /// Unique resource identifier (e.g., `qemu/100`).
    #[serde(default)]
    pub id: String,
    /// The guest identifier (unique per cluster).
    pub vmid: VmId,
    /// Human-readable name (may be absent).
    #[serde(default)]
    pub name: Option<String>,
    /// The Proxmox node where this guest resides.
    pub node: String,
    /// Guest status (e.g., `running`, `stopped`).
    #[serde(default)]
    pub status: String,
    /// Size of the boot disk in bytes.
    #[serde(
        default,
        deserialize_with = "serde_helpers::lenient_u64::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub maxdisk: Option<u64>,
    /// Set when the guest is a template.
    #[serde(
        default,
        deserialize_with = "serde_helpers::lenient_bool::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub template: Option<bool>,
}

impl GuestResource {
    pub fn is_template(&self) -> bool {
        self.template.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_listing() {
        let raw = serde_json::json!([
            {
                "id": "qemu/100", "type": "qemu", "vmid": 100, "name": "web1",
                "node": "node-a", "status": "running", "maxdisk": 34359738368_u64,
                "template": 0
            },
            {
                "id": "lxc/200", "type": "lxc", "vmid": "200", "name": "chef",
                "node": "node-b", "status": "stopped"
            },
            { "id": "storage/node-a/local", "type": "storage", "node": "node-a" },
            { "id": "sdn/node-a/localnetwork", "type": "sdn", "node": "node-a" }
        ]);
        let resources: Vec<ClusterResource> = serde_json::from_value(raw).unwrap();
        assert_eq!(resources.len(), 4);

        let vm = resources[0].as_qemu().unwrap();
        assert_eq!(vm.vmid.get(), 100);
        assert_eq!(vm.name.as_deref(), Some("web1"));
        assert_eq!(vm.maxdisk, Some(32 << 30));
        assert!(!vm.is_template());

        match &resources[1] {
            ClusterResource::Lxc(ct) => assert_eq!(ct.vmid.get(), 200),
            other => panic!("expected lxc, got {:?}", other),
        }
        assert!(resources[1].as_qemu().is_none());
        assert_eq!(resources[2], ClusterResource::Other);
        assert_eq!(resources[3], ClusterResource::Other);
    }
}
