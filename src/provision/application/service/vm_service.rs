use crate::{
    core::{
        domain::{
            error::ProxmoxResult,
            model::{observed_vm::ObservedVm, vm_spec::VmSpec},
            value_object::VmId,
        },
        infrastructure::proxmox_api::ProxmoxApi,
    },
    provision::domain::{
        action::{ReissuePolicy, RequestedAction},
        observation::Observation,
        plan::{Plan, plan},
        report::{ConvergenceReport, Outcome},
    },
};
use tracing::{debug, info, warn};

/// Converges QEMU VMs toward a [`VmSpec`].
///
/// One call to [`VmService::converge`] observes the cluster, plans, and
/// applies the plan one awaited request at a time.
#[derive(Debug, Clone)]
pub struct VmService {
    api: ProxmoxApi,
    policy: ReissuePolicy,
}

impl VmService {
    pub fn new(api: ProxmoxApi) -> Self {
        Self {
            api,
            policy: ReissuePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReissuePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ReissuePolicy {
        self.policy
    }

    pub fn api(&self) -> &ProxmoxApi {
        &self.api
    }

    /// Lists QEMU guests and loads the one named `name`, if any.
    ///
    /// Names are not unique in Proxmox; when several guests share `name`
    /// the first one listed wins.
    pub async fn observe(&self, name: &str) -> ProxmoxResult<Observation> {
        let vms: Vec<_> = self
            .api
            .cluster_vms()
            .await?
            .iter()
            .filter_map(|resource| resource.as_qemu().cloned())
            .collect();

        let mut observation = Observation::new(vms, None);
        let mut named = observation.named(name);
        let found = named.next().cloned();
        let duplicates = named.count();
        if duplicates > 0 {
            warn!(name, duplicates, "several VMs share this name, using the first one");
        }

        if let Some(resource) = found {
            let config = self.api.vm_config(&resource.node, resource.vmid).await?;
            observation.current = Some(ObservedVm::from_parts(&resource, &config)?);
        }
        Ok(observation)
    }

    /// Reads back one VM by id. `None` when it is not in the listing.
    async fn observe_by_id(&self, vmid: VmId) -> ProxmoxResult<Option<ObservedVm>> {
        let resources = self.api.cluster_vms().await?;
        let Some(resource) = resources
            .iter()
            .filter_map(|r| r.as_qemu())
            .find(|r| r.vmid == vmid)
        else {
            return Ok(None);
        };
        let config = self.api.vm_config(&resource.node, vmid).await?;
        ObservedVm::from_parts(resource, &config).map(Some)
    }

    /// Loads the clone source's config. `None` when it is not listed; the
    /// planner reports that as `NotFound`.
    async fn observe_source(
        &self,
        source: VmId,
        observation: &Observation,
    ) -> ProxmoxResult<Option<ObservedVm>> {
        let Some(resource) = observation.find(source) else {
            return Ok(None);
        };
        let config = self.api.vm_config(&resource.node, source).await?;
        ObservedVm::from_parts(resource, &config).map(Some)
    }

    /// Explicit id, else the observed VM's id, else a fresh id from the cluster.
    pub async fn resolve_vmid(
        &self,
        explicit: Option<VmId>,
        observation: &Observation,
    ) -> ProxmoxResult<VmId> {
        if let Some(vmid) = explicit {
            return Ok(vmid);
        }
        if let Some(current) = &observation.current {
            return Ok(current.vmid);
        }
        self.api.next_id().await
    }

    /// Brings the VM described by `desired` to the state `actions` ask for.
    ///
    /// # Errors
    /// Fails without touching the cluster on validation errors, unknown OS
    /// types, a missing clone source, or when the very first mutating call
    /// fails. Later failures yield an [`Outcome::Incomplete`] report instead.
    pub async fn converge(
        &self,
        desired: &VmSpec,
        actions: &[RequestedAction],
    ) -> ProxmoxResult<ConvergenceReport> {
        desired.validate()?;
        desired.os_family()?;
        let mut observation = self.observe(&desired.name).await?;
        if let Some(source) = desired.clone.filter(|_| observation.current.is_none()) {
            let loaded = self.observe_source(source, &observation).await?;
            observation = observation.with_source(loaded);
        }
        let vmid = self.resolve_vmid(desired.vmid, &observation).await?;
        let plan = plan(desired, &observation, vmid, actions, self.policy)?;
        debug!(name = %desired.name, %vmid, steps = plan.actions.len(), "planned");
        self.apply(plan, observation.current).await
    }

    /// Sends each planned call in order, stopping at the first failure.
    pub async fn apply(
        &self,
        plan: Plan,
        before: Option<ObservedVm>,
    ) -> ProxmoxResult<ConvergenceReport> {
        let vmid = plan.vmid;
        if plan.is_empty() {
            debug!(%vmid, "already converged");
            return Ok(ConvergenceReport {
                vmid,
                applied: Vec::new(),
                outcome: Outcome::Unchanged,
                observed: before,
            });
        }

        let mut applied = Vec::with_capacity(plan.actions.len());
        let mut outcome = Outcome::Converged;
        for action in plan.actions {
            let (verb, path, params) = action.request(vmid);
            match self.api.request(verb, &path, &params).await {
                Ok(_) => {
                    info!(%vmid, action = %action, "applied");
                    applied.push(action);
                }
                Err(error) if applied.is_empty() => return Err(error),
                Err(error) => {
                    warn!(%vmid, action = %action, %error, "convergence incomplete");
                    outcome = Outcome::Incomplete {
                        failed: action,
                        error,
                    };
                    break;
                }
            }
        }

        let observed = match self.observe_by_id(vmid).await {
            Ok(observed) => observed,
            Err(error) => {
                warn!(%vmid, %error, "could not read back VM state");
                None
            }
        };

        Ok(ConvergenceReport {
            vmid,
            applied,
            outcome,
            observed,
        })
    }
}
