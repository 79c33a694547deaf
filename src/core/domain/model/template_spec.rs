//! Desired state of a cloud template built from a downloaded base image.

use crate::core::domain::{
    catalog::{OsFamily, Size},
    error::{ProxmoxResult, ValidationError},
    model::vm_spec::{Hugepages, VmSpec},
    value_object::{DiskSize, Sha256Checksum, VmId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmid: Option<VmId>,
    pub host: String,
    #[serde(default)]
    pub size: Size,
    #[serde(default = "TemplateSpec::default_net")]
    pub net: BTreeMap<String, String>,
    #[serde(default = "TemplateSpec::default_numa")]
    pub numa: bool,
    #[serde(default)]
    pub hugepages: Hugepages,
    #[serde(default = "TemplateSpec::default_ostype")]
    pub ostype: String,
    #[serde(default)]
    pub disk: DiskSize,
    #[serde(default = "TemplateSpec::default_storage")]
    pub storage: String,
    /// Where the qcow2 base image is fetched from.
    #[serde(alias = "image", alias = "src")]
    pub image_src: Url,
    /// Expected SHA-256 of the image; unchecked when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Sha256Checksum>,
}

impl TemplateSpec {
    pub fn new(name: impl Into<String>, host: impl Into<String>, image_src: Url) -> Self {
        let defaults = VmSpec::new(name, host);
        Self {
            name: defaults.name,
            vmid: None,
            host: defaults.host,
            size: defaults.size,
            net: defaults.net,
            numa: defaults.numa,
            hugepages: defaults.hugepages,
            ostype: defaults.ostype,
            disk: defaults.disk,
            storage: defaults.storage,
            image_src,
            checksum: None,
        }
    }

    fn default_net() -> BTreeMap<String, String> {
        VmSpec::new("", "").net
    }

    fn default_numa() -> bool {
        true
    }

    fn default_ostype() -> String {
        VmSpec::new("", "").ostype
    }

    fn default_storage() -> String {
        VmSpec::new("", "").storage
    }

    /// The VM spec handed to the convergence engine once the disk is in place.
    pub fn to_vm_spec(&self, vmid: VmId) -> VmSpec {
        VmSpec {
            vmid: Some(vmid),
            size: self.size,
            net: self.net.clone(),
            numa: self.numa,
            hugepages: self.hugepages,
            ostype: self.ostype.clone(),
            disk: self.disk,
            storage: self.storage.clone(),
            template: true,
            ..VmSpec::new(self.name.clone(), self.host.clone())
        }
    }

    /// Resolved OS family for `ostype`.
    pub fn os_family(&self) -> ProxmoxResult<OsFamily> {
        OsFamily::from_alias(&self.ostype)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !matches!(self.image_src.scheme(), "http" | "https") {
            return Err(ValidationError::field(
                "image_src",
                format!("unsupported scheme '{}'", self.image_src.scheme()),
            ));
        }
        self.to_vm_spec(self.vmid.unwrap_or(VmId::new_unchecked(100)))
            .validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_aliases_and_defaults() {
        let spec: TemplateSpec = serde_json::from_value(serde_json::json!({
            "name": "ubuntu-cloud",
            "host": "node-a",
            "src": "https://cloud-images.ubuntu.com/noble/current/noble-server-cloudimg-amd64.img",
            "checksum": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        }))
        .unwrap();
        assert_eq!(spec.storage, "local");
        assert_eq!(spec.ostype, "linux");
        assert!(spec.checksum.is_some());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_to_vm_spec_sets_template() {
        let spec = TemplateSpec::new(
            "debian-cloud",
            "node-b",
            Url::parse("https://example.com/debian.qcow2").unwrap(),
        );
        let vm = spec.to_vm_spec(VmId::new(9000).unwrap());
        assert!(vm.template);
        assert_eq!(vm.vmid.unwrap().get(), 9000);
        assert_eq!(vm.host, "node-b");
        assert_eq!(vm.clone, None);
    }

    #[test]
    fn test_rejects_non_http_source() {
        let spec = TemplateSpec::new(
            "t",
            "node-a",
            Url::parse("ftp://example.com/image.qcow2").unwrap(),
        );
        assert!(spec.validate().is_err());
    }
}
