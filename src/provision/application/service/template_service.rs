use crate::{
    core::{
        domain::{
            error::{ProxmoxError, ProxmoxResult},
            model::template_spec::TemplateSpec,
        },
        infrastructure::image_fetcher::ImageFetcher,
    },
    provision::{
        application::service::vm_service::VmService,
        domain::{action::RequestedAction, report::ConvergenceReport},
    },
};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

/// Builds cloud templates from a downloaded base image.
///
/// The image lands at `<storage path>/images/<vmid>/vm-<vmid>-disk-1.qcow2`,
/// which is the volume the template's `virtio0` disk points at.
#[derive(Clone)]
pub struct TemplateService {
    vms: VmService,
    fetcher: Arc<dyn ImageFetcher>,
}

impl TemplateService {
    pub fn new(vms: VmService, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { vms, fetcher }
    }

    /// Downloads the image and creates the template VM.
    ///
    /// # Errors
    /// `UnknownOsType` before anything is fetched. `ChecksumMismatch` when
    /// the image does not verify; no VM is created in that case. `Io` when
    /// the image directory cannot be created.
    pub async fn provision(&self, spec: &TemplateSpec) -> ProxmoxResult<ConvergenceReport> {
        spec.validate()?;
        spec.os_family()?;
        let observation = self.vms.observe(&spec.name).await?;
        let vmid = self.vms.resolve_vmid(spec.vmid, &observation).await?;

        let storage_root = self.vms.api().storage_path(&spec.storage).await?;
        let image_dir = storage_root.join("images").join(vmid.to_string());
        fs::create_dir_all(&image_dir)
            .await
            .map_err(|e| ProxmoxError::io(format!("creating {}", image_dir.display()), e))?;

        let image = image_dir.join(format!("vm-{}-disk-1.qcow2", vmid));
        let outcome = self
            .fetcher
            .fetch(&spec.image_src, &image, spec.checksum.as_ref())
            .await?;
        info!(name = %spec.name, %vmid, image = %image.display(), ?outcome, "base image ready");

        self.vms
            .converge(&spec.to_vm_spec(vmid), &[RequestedAction::Create])
            .await
    }
}
