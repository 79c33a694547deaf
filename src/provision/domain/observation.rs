use crate::core::domain::{
    model::{cluster_resource::GuestResource, observed_vm::ObservedVm},
    value_object::VmId,
};

/// A snapshot of the cluster taken before planning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    /// Every QEMU guest in the cluster, templates included.
    pub vms: Vec<GuestResource>,
    /// The VM matching the desired name, if any.
    pub current: Option<ObservedVm>,
    /// Config of the clone source, loaded when a clone is about to be made.
    pub source: Option<ObservedVm>,
}

impl Observation {
    pub fn new(vms: Vec<GuestResource>, current: Option<ObservedVm>) -> Self {
        Self {
            vms,
            current,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: Option<ObservedVm>) -> Self {
        self.source = source;
        self
    }

    /// Looks a guest up by id.
    pub fn find(&self, vmid: VmId) -> Option<&GuestResource> {
        self.vms.iter().find(|vm| vm.vmid == vmid)
    }

    /// Guests carrying `name`, in listing order.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a GuestResource> + 'a {
        self.vms
            .iter()
            .filter(move |vm| vm.name.as_deref() == Some(name))
    }
}
