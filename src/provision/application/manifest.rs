//! Declarative input: the VMs and templates a run should converge.

use crate::{
    core::domain::{
        error::{ProxmoxError, ProxmoxResult},
        model::{template_spec::TemplateSpec, vm_spec::VmSpec},
    },
    provision::domain::action::RequestedAction,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A manifest file: `{"templates": [...], "vms": [...]}`.
///
/// Templates are provisioned before VMs so VMs can clone from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub templates: Vec<TemplateSpec>,
    #[serde(default)]
    pub vms: Vec<VmEntry>,
}

/// A VM spec plus the actions to run for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmEntry {
    #[serde(flatten)]
    pub spec: VmSpec,
    /// One action or a list of them; `start` when omitted.
    #[serde(default = "default_actions", alias = "actions", with = "one_or_many")]
    pub action: Vec<RequestedAction>,
}

fn default_actions() -> Vec<RequestedAction> {
    vec![RequestedAction::default()]
}

mod one_or_many {
    use super::RequestedAction;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(RequestedAction),
        Many(Vec<RequestedAction>),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<RequestedAction>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(action) => vec![action],
            OneOrMany::Many(actions) => actions,
        })
    }

    pub fn serialize<S>(actions: &[RequestedAction], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        actions.serialize(serializer)
    }
}

impl Manifest {
    /// Parses a manifest from JSON text.
    ///
    /// # Errors
    /// `Manifest` on malformed JSON or invalid field values.
    pub fn from_json(text: &str) -> ProxmoxResult<Self> {
        serde_json::from_str(text).map_err(|e| ProxmoxError::Manifest(e.to_string()))
    }

    /// Reads and parses a manifest file.
    ///
    /// # Errors
    /// `Io` when the file cannot be read, `Manifest` when it does not parse.
    pub async fn load(path: &Path) -> ProxmoxResult<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProxmoxError::io(format!("reading {}", path.display()), e))?;
        serde_json::from_str(&text)
            .map_err(|e| ProxmoxError::Manifest(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::catalog::{InstanceSize, Size};
    use std::io::Write;

    const MANIFEST: &str = r#"{
        "templates": [
            {
                "name": "noble-tpl",
                "vmid": 9000,
                "host": "node-a",
                "image_src": "https://cloud-images.ubuntu.com/noble/current/noble-server-cloudimg-amd64.img"
            }
        ],
        "vms": [
            {"name": "web1", "host": "node-a", "size": "small", "ostype": "l26"},
            {"name": "db1", "host": "node-b", "clone": 9000, "action": ["start", "enable"]},
            {"name": "scratch", "host": "node-b", "action": "create"}
        ]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        assert_eq!(manifest.templates.len(), 1);
        assert_eq!(manifest.vms.len(), 3);

        let web1 = &manifest.vms[0];
        assert_eq!(web1.spec.size, Size::Named(InstanceSize::Small));
        assert_eq!(web1.action, vec![RequestedAction::Start]);

        let db1 = &manifest.vms[1];
        assert_eq!(db1.spec.clone.map(|id| id.get()), Some(9000));
        assert_eq!(
            db1.action,
            vec![RequestedAction::Start, RequestedAction::Enable]
        );

        assert_eq!(manifest.vms[2].action, vec![RequestedAction::Create]);
    }

    #[test]
    fn test_bad_manifest() {
        let result = Manifest::from_json(r#"{"vms": [{"name": "web1"}]}"#);
        assert!(matches!(result, Err(ProxmoxError::Manifest(_))));

        let result = Manifest::from_json(
            r#"{"vms": [{"name": "web1", "host": "node-a", "action": "reboot"}]}"#,
        );
        assert!(matches!(result, Err(ProxmoxError::Manifest(_))));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let manifest = Manifest::load(file.path()).await.unwrap();
        assert_eq!(manifest.vms[0].spec.name, "web1");

        let missing = Manifest::load(Path::new("/nonexistent/manifest.json")).await;
        assert!(matches!(missing, Err(ProxmoxError::Io { .. })));
    }
}
