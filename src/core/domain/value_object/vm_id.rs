use crate::core::domain::{
    error::ValidationError, value_object::serde_helpers::NumberOrString,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest id Proxmox hands out to guests; 0-99 are reserved.
const MIN_VMID: u32 = 100;
const MAX_VMID: u32 = 999_999_999;

/// A validated cluster-wide guest identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "NumberOrString", into = "u32")]
pub struct VmId(u32);

impl VmId {
    /// Creates a validated id.
    pub fn new(id: u32) -> Result<Self, ValidationError> {
        validate_vmid(id)?;
        Ok(Self(id))
    }

    /// Creates a new id without validation.
    pub(crate) fn new_unchecked(id: u32) -> Self {
        Self(id)
    }

    /// Returns the numeric id.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<VmId> for u32 {
    fn from(id: VmId) -> Self {
        id.0
    }
}

impl FromStr for VmId {
    type Err = ValidationError;

    /// Parses an id, tolerating the quoting `pvesh get /cluster/nextid` wraps it in.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.trim().trim_matches('"').trim();
        let id = bare
            .parse::<u32>()
            .map_err(|_| ValidationError::Format(format!("'{}' is not a numeric VM id", s)))?;
        Self::new(id)
    }
}

impl TryFrom<NumberOrString> for VmId {
    type Error = ValidationError;

    fn try_from(raw: NumberOrString) -> Result<Self, Self::Error> {
        match raw {
            NumberOrString::String(s) => s.parse(),
            other => {
                let n = other
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| ValidationError::field("vmid", format!("{:?}", other)))?;
                Self::new(n)
            }
        }
    }
}

/// Validates that an id falls in the range Proxmox accepts for guests.
pub(crate) fn validate_vmid(id: u32) -> Result<(), ValidationError> {
    if !(MIN_VMID..=MAX_VMID).contains(&id) {
        return Err(ValidationError::Field {
            field: "vmid".to_string(),
            message: format!(
                "VM id must be between {} and {} (got {})",
                MIN_VMID, MAX_VMID, id
            ),
        });
    }
    Ok(())
}
