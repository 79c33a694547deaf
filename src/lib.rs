//! Declarative convergence for Proxmox VE QEMU guests.
//!
//! Describe a VM (or a cloud template built from a base image) and the crate
//! works out which API calls bring the cluster to that state: create or
//! clone, repair drifted config, migrate, start, enable at boot.

mod auth;
mod core;
mod provision;

pub use crate::core::{
    domain::{
        catalog::{InstanceSize, OsFamily, Size, os_type_code, size_of},
        error::{ProxmoxError, ProxmoxResult, ValidationError},
        model::{
            client_config::{ClientConfig, RateLimitConfig},
            cluster_resource::{ClusterResource, GuestResource},
            observed_vm::{ObservedVm, VmStatus},
            proxmox_auth::ProxmoxAuth,
            proxmox_connection::ProxmoxConnection,
            task::{TaskId, TaskState, TaskStatus},
            template_spec::TemplateSpec,
            vm_config::VmConfig,
            vm_spec::{Hugepages, VmSpec},
        },
        value_object::{
            DiskSize, ProxmoxHost, ProxmoxPassword, ProxmoxPort, ProxmoxRealm, ProxmoxUsername,
            Sha256Checksum, VmId,
        },
    },
    infrastructure::{
        api_client::ApiClient,
        image_fetcher::{FetchOutcome, HttpImageFetcher, ImageFetcher},
        proxmox_api::ProxmoxApi,
        pvesh::PveshTransport,
        transport::{ApiResponse, ParamValue, Params, Transport, Verb},
    },
};
pub use crate::provision::{
    application::{
        manifest::{Manifest, VmEntry},
        service::{template_service::TemplateService, vm_service::VmService},
    },
    domain::{
        action::{ReissuePolicy, RequestedAction},
        observation::Observation,
        plan::{Plan, PlannedAction, plan},
        report::{ConvergenceReport, Outcome},
    },
};

use std::sync::Arc;
use tracing::info;
use url::Url;

/// Entry point: a configured transport plus the VM and template engines on top.
///
/// # Examples
///
/// ```no_run
/// use pve_converge::{ProxmoxClient, ProxmoxResult, RequestedAction, VmSpec};
///
/// #[tokio::main]
/// async fn main() -> ProxmoxResult<()> {
///     let client = ProxmoxClient::builder()
///         .host("pve1.example.com")?
///         .port(8006)?
///         .credentials("automation", "password", "pve")?
///         .secure(true)
///         .build()?;
///
///     client.login().await?;
///     let report = client
///         .converge(&VmSpec::new("web1", "pve1"), &[RequestedAction::Start])
///         .await?;
///     println!("{} {}", report.vmid, report.outcome);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ProxmoxClient {
    http: Option<Arc<ApiClient>>,
    vms: VmService,
    templates: TemplateService,
}

/// Builder for ProxmoxClient configuration
#[derive(Default)]
pub struct ProxmoxClientBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    realm: Option<String>,
    secure: bool,
    accept_invalid_certs: bool,
    base_url: Option<Url>,
    local: bool,
    transport: Option<Arc<dyn Transport>>,
    fetcher: Option<Arc<dyn ImageFetcher>>,
    config: ClientConfig,
    policy: ReissuePolicy,
}

impl ProxmoxClientBuilder {
    pub fn host(mut self, host: impl Into<String>) -> ProxmoxResult<Self> {
        let host = host.into();
        ProxmoxHost::new(host.as_str())?;
        self.host = Some(host);
        Ok(self)
    }

    pub fn port(mut self, port: u16) -> ProxmoxResult<Self> {
        ProxmoxPort::new(port)?;
        self.port = Some(port);
        Ok(self)
    }

    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        realm: impl Into<String>,
    ) -> ProxmoxResult<Self> {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self.realm = Some(realm.into());
        Ok(self)
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Accepts self-signed certificates (the Proxmox default install).
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Overrides the URL derived from host, port and scheme.
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Talks to the local node through `pvesh` instead of HTTPS.
    /// Host and credentials are then not needed.
    pub fn local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    /// Uses a caller-supplied transport. Takes precedence over `local` and HTTPS.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn image_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn policy(mut self, policy: ReissuePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> ProxmoxResult<ProxmoxClient> {
        let (transport, http): (Arc<dyn Transport>, Option<Arc<ApiClient>>) =
            match (self.transport, self.local) {
                (Some(transport), _) => (transport, None),
                (None, true) => {
                    let pvesh = PveshTransport::new(self.config.pvesh_binary.clone())
                        .with_timeout(self.config.command_timeout);
                    (Arc::new(pvesh) as Arc<dyn Transport>, None)
                }
                (None, false) => {
                    let host = ProxmoxHost::new(required(self.host, "host")?)?;
                    let port = ProxmoxPort::new(self.port.unwrap_or(ProxmoxPort::DEFAULT))?;
                    let username = ProxmoxUsername::new(required(self.username, "username")?)?;
                    let password = ProxmoxPassword::new(required(self.password, "password")?)?;
                    let realm = ProxmoxRealm::new(required(self.realm, "realm")?)?;

                    let mut connection = ProxmoxConnection::new(
                        host,
                        port,
                        username,
                        password,
                        realm,
                        self.secure,
                        self.accept_invalid_certs,
                    )?;
                    if let Some(url) = self.base_url {
                        connection = connection.with_base_url(url);
                    }
                    let client = Arc::new(ApiClient::new(connection, self.config.clone())?);
                    (client.clone() as Arc<dyn Transport>, Some(client))
                }
            };

        let api = ProxmoxApi::new(transport)
            .with_task_polling(self.config.task_poll_interval, self.config.task_timeout);
        let vms = VmService::new(api).with_policy(self.policy);
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpImageFetcher::default()));
        let templates = TemplateService::new(vms.clone(), fetcher);

        Ok(ProxmoxClient {
            http,
            vms,
            templates,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ValidationError> {
    value.ok_or_else(|| ValidationError::field(field, format!("{} is required", field)))
}

impl ProxmoxClient {
    /// Creates a new builder for ProxmoxClient configuration
    pub fn builder() -> ProxmoxClientBuilder {
        ProxmoxClientBuilder::default()
    }

    /// Fetches a ticket now rather than on the first request.
    /// A no-op for `pvesh` and custom transports.
    ///
    /// # Errors
    /// `Authentication` for rejected credentials, `Transport` when the node
    /// cannot be reached.
    pub async fn login(&self) -> ProxmoxResult<()> {
        match &self.http {
            Some(http) => http.login().await,
            None => Ok(()),
        }
    }

    /// `true` for local transports, or once a valid ticket is held.
    pub async fn is_authenticated(&self) -> bool {
        match &self.http {
            Some(http) => http.is_authenticated().await,
            None => true,
        }
    }

    /// Raw verb-level access.
    pub fn api(&self) -> &ProxmoxApi {
        self.vms.api()
    }

    pub fn vms(&self) -> &VmService {
        &self.vms
    }

    pub fn templates(&self) -> &TemplateService {
        &self.templates
    }

    /// See [`VmService::converge`].
    pub async fn converge(
        &self,
        spec: &VmSpec,
        actions: &[RequestedAction],
    ) -> ProxmoxResult<ConvergenceReport> {
        self.vms.converge(spec, actions).await
    }

    /// See [`TemplateService::provision`].
    pub async fn provision_template(&self, spec: &TemplateSpec) -> ProxmoxResult<ConvergenceReport> {
        self.templates.provision(spec).await
    }

    /// Converges every entry of `manifest`: templates first, then VMs.
    ///
    /// Stops at the first hard error. Incomplete entries are reported and
    /// the run carries on.
    pub async fn apply_manifest(&self, manifest: &Manifest) -> ProxmoxResult<Vec<ConvergenceReport>> {
        let mut reports = Vec::with_capacity(manifest.templates.len() + manifest.vms.len());
        for template in &manifest.templates {
            let report = self.provision_template(template).await?;
            info!(name = %template.name, vmid = %report.vmid, outcome = %report.outcome, "template");
            reports.push(report);
        }
        for entry in &manifest.vms {
            let report = self.converge(&entry.spec, &entry.action).await?;
            info!(name = %entry.spec.name, vmid = %report.vmid, outcome = %report.outcome, "vm");
            reports.push(report);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests;
