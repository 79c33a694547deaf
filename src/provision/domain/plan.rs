//! Pure planning: desired state + observation -> ordered mutating calls.
//!
//! Nothing here talks to the cluster, so every decision the engine makes can
//! be tested from plain data.

use crate::{
    core::{
        domain::{
            catalog::OsFamily,
            error::{ProxmoxError, ProxmoxResult},
            model::{observed_vm::ObservedVm, vm_spec::VmSpec},
            value_object::VmId,
        },
        infrastructure::transport::{Params, Verb},
    },
    provision::domain::{
        action::{ReissuePolicy, RequestedAction},
        observation::Observation,
    },
};
use std::fmt;

/// One mutating call against the cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    /// Fresh VM on `node`.
    Create { node: String, params: Params },
    /// Copy of `source`, issued on the node that holds the source.
    Clone {
        source_node: String,
        source: VmId,
        params: Params,
    },
    /// Config keys that drifted from the desired state.
    UpdateConfig { node: String, params: Params },
    /// Grow the primary disk.
    Resize { node: String, params: Params },
    Migrate { from: String, to: String, online: bool },
    Start { node: String },
    EnableOnBoot { node: String },
}

impl PlannedAction {
    /// Short name for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PlannedAction::Create { .. } => "create",
            PlannedAction::Clone { .. } => "clone",
            PlannedAction::UpdateConfig { .. } => "update-config",
            PlannedAction::Resize { .. } => "resize",
            PlannedAction::Migrate { .. } => "migrate",
            PlannedAction::Start { .. } => "start",
            PlannedAction::EnableOnBoot { .. } => "enable",
        }
    }

    /// The `(verb, path, params)` triple that performs this action on `vmid`.
    pub fn request(&self, vmid: VmId) -> (Verb, String, Params) {
        match self {
            PlannedAction::Create { node, params } => {
                (Verb::Create, format!("/nodes/{}/qemu", node), params.clone())
            }
            PlannedAction::Clone {
                source_node,
                source,
                params,
            } => (
                Verb::Create,
                format!("/nodes/{}/qemu/{}/clone", source_node, source),
                params.clone(),
            ),
            PlannedAction::UpdateConfig { node, params } => (
                Verb::Set,
                format!("/nodes/{}/qemu/{}/config", node, vmid),
                params.clone(),
            ),
            PlannedAction::Resize { node, params } => (
                Verb::Set,
                format!("/nodes/{}/qemu/{}/resize", node, vmid),
                params.clone(),
            ),
            PlannedAction::Migrate { from, to, online } => (
                Verb::Create,
                format!("/nodes/{}/qemu/{}/migrate", from, vmid),
                Params::new().with("target", to).with("online", *online),
            ),
            PlannedAction::Start { node } => (
                Verb::Create,
                format!("/nodes/{}/qemu/{}/status/start", node, vmid),
                Params::new(),
            ),
            PlannedAction::EnableOnBoot { node } => (
                Verb::Set,
                format!("/nodes/{}/qemu/{}/config", node, vmid),
                Params::new().with("onboot", true),
            ),
        }
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedAction::Create { node, .. } => write!(f, "create on {}", node),
            PlannedAction::Clone {
                source_node,
                source,
                ..
            } => write!(f, "clone {} from {}", source, source_node),
            PlannedAction::UpdateConfig { params, .. } => {
                let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
                write!(f, "update {}", keys.join(", "))
            }
            PlannedAction::Resize { params, .. } => match params.get("size") {
                Some(size) => write!(f, "resize disk to {}", size),
                None => f.write_str("resize disk"),
            },
            PlannedAction::Migrate { from, to, online } => write!(
                f,
                "{} migrate {} -> {}",
                if *online { "online" } else { "offline" },
                from,
                to
            ),
            PlannedAction::Start { node } => write!(f, "start on {}", node),
            PlannedAction::EnableOnBoot { .. } => f.write_str("enable start on boot"),
        }
    }
}

/// The ordered calls needed to converge one VM.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub vmid: VmId,
    pub actions: Vec<PlannedAction>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Decides which calls bring the cluster to `desired`.
///
/// Order is fixed: create (or clone, or drift repair), then migrate and start,
/// then enable.
///
/// # Errors
/// `NotFound` when a clone source is missing from the listing, `UnknownOsType`
/// when the desired state names an OS family the catalog does not know.
pub fn plan(
    desired: &VmSpec,
    observation: &Observation,
    vmid: VmId,
    actions: &[RequestedAction],
    policy: ReissuePolicy,
) -> ProxmoxResult<Plan> {
    let os_family = desired.os_family()?;
    let current = observation.current.as_ref();
    let mut steps = Vec::new();

    match (policy, current) {
        (ReissuePolicy::OnDrift, Some(current)) => {
            steps.extend(repair_drift(desired, current, &current.host, os_family));
        }
        _ => {
            let created = creation(desired, observation, vmid, os_family)?;
            let cloned = matches!(created, PlannedAction::Clone { .. });
            steps.push(created);
            // A clone inherits the source's config; bring it to the desired one.
            if cloned {
                steps.extend(match &observation.source {
                    Some(source) => repair_drift(desired, source, &desired.host, os_family),
                    None => vec![PlannedAction::UpdateConfig {
                        node: desired.host.clone(),
                        params: full_config(desired, os_family),
                    }],
                });
            }
        }
    }

    let template = desired.template || current.is_some_and(|c| c.template);
    if actions.contains(&RequestedAction::Start) && !template {
        if let Some(current) = current.filter(|c| c.host != desired.host) {
            steps.push(PlannedAction::Migrate {
                from: current.host.clone(),
                to: desired.host.clone(),
                online: current.status.is_running(),
            });
        }
        if !current.is_some_and(|c| c.status.is_running()) {
            steps.push(PlannedAction::Start {
                node: desired.host.clone(),
            });
        }
    }

    if actions.contains(&RequestedAction::Enable) {
        let already = policy == ReissuePolicy::OnDrift && current.is_some_and(|c| c.onboot);
        if !already {
            let moved = actions.contains(&RequestedAction::Start) && !template;
            let node = match current {
                Some(c) if !moved => c.host.clone(),
                _ => desired.host.clone(),
            };
            steps.push(PlannedAction::EnableOnBoot { node });
        }
    }

    Ok(Plan {
        vmid,
        actions: steps,
    })
}

fn creation(
    desired: &VmSpec,
    observation: &Observation,
    vmid: VmId,
    os_family: OsFamily,
) -> ProxmoxResult<PlannedAction> {
    if let Some(source) = desired.clone {
        let source_vm = observation
            .find(source)
            .ok_or_else(|| ProxmoxError::not_found("clone source", source))?;
        return Ok(PlannedAction::Clone {
            source_node: source_vm.node.clone(),
            source,
            params: clone_params(desired, vmid),
        });
    }

    Ok(PlannedAction::Create {
        node: desired.host.clone(),
        params: create_params(desired, vmid, os_family),
    })
}

/// Parameters for `POST /nodes/{node}/qemu`.
pub fn create_params(desired: &VmSpec, vmid: VmId, os_family: OsFamily) -> Params {
    let mut params = Params::new()
        .with("vmid", vmid)
        .with("name", &desired.name)
        .with("bootdisk", "virtio0")
        .with("cores", desired.size.cpu())
        .with("memory", desired.size.memory())
        .with("sockets", 1_u32)
        .with("ide2", format!("{},media=cdrom", desired.cdrom))
        .with("numa", desired.numa)
        .with("ostype", os_family.code())
        .with("virtio0", disk_descriptor(desired, vmid));
    params.extend(desired.net.iter().map(|(slot, descriptor)| (slot.clone(), descriptor)));
    if let Some(pages) = desired.hugepages.wire_value() {
        params.insert("hugepages", pages);
    }
    if desired.template {
        params.insert("template", true);
    }
    params
}

/// `<storage>:<vmid>/vm-<vmid>-disk-1.qcow2,size=<disk>`
pub fn disk_descriptor(desired: &VmSpec, vmid: VmId) -> String {
    format!(
        "{}:{}/vm-{}-disk-1.qcow2,size={}",
        desired.storage, vmid, vmid, desired.disk
    )
}

/// Parameters for `POST /nodes/{source-node}/qemu/{source}/clone`.
pub fn clone_params(desired: &VmSpec, vmid: VmId) -> Params {
    Params::new()
        .with("newid", vmid)
        .with("name", &desired.name)
        .with("target", &desired.host)
        .with("storage", &desired.storage)
        .with("full", desired.full_copy)
        .with("format", "qcow2")
}

/// Config and resize calls that take `current` to `desired`, sent to `node`.
fn repair_drift(
    desired: &VmSpec,
    current: &ObservedVm,
    node: &str,
    os_family: OsFamily,
) -> Vec<PlannedAction> {
    let mut steps = Vec::new();
    let drift = config_drift(desired, current, os_family);
    if !drift.is_empty() {
        steps.push(PlannedAction::UpdateConfig {
            node: node.to_string(),
            params: drift,
        });
    }

    // Unknown or zero maxdisk means the listing did not report a disk.
    if current
        .maxdisk
        .is_some_and(|size| size > 0 && desired.disk.bytes() > size)
    {
        steps.push(PlannedAction::Resize {
            node: node.to_string(),
            params: Params::new()
                .with("disk", "virtio0")
                .with("size", desired.disk.to_string()),
        });
    }
    steps
}

/// Every create-time field a clone may have inherited, for when the source
/// config is unknown.
pub fn full_config(desired: &VmSpec, os_family: OsFamily) -> Params {
    let mut params = Params::new()
        .with("cores", desired.size.cpu())
        .with("memory", desired.size.memory())
        .with("numa", desired.numa)
        .with("ostype", os_family.code());
    params.extend(desired.net.iter().map(|(slot, descriptor)| (slot.clone(), descriptor)));
    match desired.hugepages.wire_value() {
        Some(pages) => params.insert("hugepages", pages),
        None => params.insert("delete", "hugepages"),
    }
    params
}

/// Create-time fields whose observed value differs from the desired state.
pub fn config_drift(desired: &VmSpec, current: &ObservedVm, os_family: OsFamily) -> Params {
    let mut drift = Params::new();

    if current.size.cpu() != desired.size.cpu() {
        drift.insert("cores", desired.size.cpu());
    }
    if current.size.memory() != desired.size.memory() {
        drift.insert("memory", desired.size.memory());
    }
    for (slot, descriptor) in &desired.net {
        let matches = current
            .net
            .get(slot)
            .is_some_and(|observed| net_descriptor_matches(descriptor, observed));
        if !matches {
            drift.insert(slot.clone(), descriptor);
        }
    }
    if current.numa != desired.numa {
        drift.insert("numa", desired.numa);
    }
    if current.hugepages != desired.hugepages {
        match desired.hugepages.wire_value() {
            Some(pages) => drift.insert("hugepages", pages),
            None => drift.insert("delete", "hugepages"),
        }
    }
    if current.ostype != Some(os_family) {
        drift.insert("ostype", os_family.code());
    }
    drift
}

/// Compares NIC descriptors the way the hypervisor stores them.
///
/// The hypervisor adds a generated MAC to the model (`virtio=BC:24:11:...`);
/// that only counts as drift when the desired descriptor pins a MAC itself. Remaining
/// options compare as an unordered set.
pub(crate) fn net_descriptor_matches(desired: &str, observed: &str) -> bool {
    let mut want = desired.split(',').map(str::trim);
    let mut have = observed.split(',').map(str::trim);
    let (Some(want_model), Some(have_model)) = (want.next(), have.next()) else {
        return false;
    };

    let model_matches = if want_model.contains('=') {
        want_model.eq_ignore_ascii_case(have_model)
    } else {
        have_model
            .split('=')
            .next()
            .is_some_and(|m| m.eq_ignore_ascii_case(want_model))
    };

    let mut want: Vec<&str> = want.filter(|o| !o.is_empty()).collect();
    let mut have: Vec<&str> = have.filter(|o| !o.is_empty()).collect();
    want.sort_unstable();
    have.sort_unstable();
    model_matches && want == have
}
