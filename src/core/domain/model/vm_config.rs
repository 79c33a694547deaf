//! VM configuration from `/nodes/{node}/qemu/{vmid}/config`.

use crate::core::domain::value_object::serde_helpers;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The subset of the per-VM config the convergence engine reads.
///
/// Everything else (disks, `net*` slots, cloud-init keys...) is kept in
/// `extra` so slot-keyed entries can be filtered by prefix.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VmConfig {
    /// VM name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Number of cores per socket.
    #[serde(
        default,
        deserialize_with = "serde_helpers::lenient_u64::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub cores: Option<u64>,
    /// Number of CPU sockets.
    #[serde(
        default,
        deserialize_with = "serde_helpers::lenient_u64::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub sockets: Option<u64>,
    /// Memory in MB.
    #[serde(
        default,
        deserialize_with = "serde_helpers::lenient_u64::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub memory: Option<u64>,
    /// NUMA enabled.
    #[serde(
        default,
        deserialize_with = "serde_helpers::lenient_bool::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub numa: Option<bool>,
    /// Hugepage size (`any`, `2`, `1024`); absent when disabled.
    #[serde(
        default,
        deserialize_with = "serde_helpers::lenient_string::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub hugepages: Option<String>,
    /// OS type code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ostype: Option<String>,
    /// Start at boot.
    #[serde(
        default,
        deserialize_with = "serde_helpers::lenient_bool::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub onboot: Option<bool>,
    /// Remaining keys, verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl VmConfig {
    /// Network interface slots (`net0`, `net1`, ...) and their descriptors.
    pub fn net(&self) -> BTreeMap<String, String> {
        self.extra
            .iter()
            .filter(|(key, _)| is_net_slot(key))
            .filter_map(|(key, value)| {
                value
                    .as_str()
                    .map(|descriptor| (key.clone(), descriptor.to_string()))
            })
            .collect()
    }
}

/// `net` followed by a slot number.
pub(crate) fn is_net_slot(key: &str) -> bool {
    key.strip_prefix("net")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}
