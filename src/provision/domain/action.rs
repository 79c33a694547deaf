use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::domain::error::ValidationError;

/// What a caller asks the engine to do with a VM.
///
/// Every action implies `Create` first; `Start` also migrates the VM to the
/// desired node when it lives elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedAction {
    Create,
    #[default]
    Start,
    /// Mark the VM to start when its node boots.
    Enable,
}

impl RequestedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestedAction::Create => "create",
            RequestedAction::Start => "start",
            RequestedAction::Enable => "enable",
        }
    }
}

impl fmt::Display for RequestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestedAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(RequestedAction::Create),
            "start" => Ok(RequestedAction::Start),
            "enable" => Ok(RequestedAction::Enable),
            other => Err(ValidationError::field(
                "action",
                format!("'{}' is not one of create, start, enable", other),
            )),
        }
    }
}

/// When the create (or clone) request is sent for a VM that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReissuePolicy {
    /// Send it on every pass and let the endpoint reject duplicates.
    Always,
    /// Only create absent VMs; reconcile existing ones with targeted updates.
    #[default]
    OnDrift,
}

impl FromStr for ReissuePolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "always" => Ok(ReissuePolicy::Always),
            "on_drift" => Ok(ReissuePolicy::OnDrift),
            other => Err(ValidationError::field(
                "policy",
                format!("'{}' is not one of always, on-drift", other),
            )),
        }
    }
}
