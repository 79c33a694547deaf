use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A disk size as Proxmox writes it in volume descriptors, e.g. `32G`.
///
/// Units are binary (`K` = 1024 bytes) and a unit suffix is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiskSize {
    amount: u64,
    unit: DiskUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DiskUnit {
    K,
    M,
    G,
    T,
}

impl DiskUnit {
    fn multiplier(self) -> u64 {
        match self {
            DiskUnit::K => 1 << 10,
            DiskUnit::M => 1 << 20,
            DiskUnit::G => 1 << 30,
            DiskUnit::T => 1 << 40,
        }
    }

    fn suffix(self) -> char {
        match self {
            DiskUnit::K => 'K',
            DiskUnit::M => 'M',
            DiskUnit::G => 'G',
            DiskUnit::T => 'T',
        }
    }
}

impl DiskSize {
    /// Size in bytes.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.amount.saturating_mul(self.unit.multiplier())
    }
}

impl Default for DiskSize {
    /// `32G`.
    fn default() -> Self {
        Self {
            amount: 32,
            unit: DiskUnit::G,
        }
    }
}

impl fmt::Display for DiskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for DiskSize {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_disk_size(s)?;
        let s = s.trim();
        let (digits, suffix) = s.split_at(s.len() - 1);
        let unit = match suffix.to_ascii_uppercase().as_str() {
            "K" => DiskUnit::K,
            "M" => DiskUnit::M,
            "G" => DiskUnit::G,
            _ => DiskUnit::T,
        };
        let amount = digits
            .parse::<u64>()
            .map_err(|e| ValidationError::Format(format!("Invalid disk size '{}': {}", s, e)))?;
        Ok(Self { amount, unit })
    }
}

impl TryFrom<String> for DiskSize {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiskSize> for String {
    fn from(size: DiskSize) -> Self {
        size.to_string()
    }
}

/// Validates a disk size string such as `32G` or `512M`.
pub(crate) fn validate_disk_size(size: &str) -> Result<(), ValidationError> {
    let size = size.trim();
    if size.is_empty() {
        return Err(ValidationError::field("disk", "Disk size cannot be empty"));
    }
    if !size.is_ascii() {
        return Err(ValidationError::Format(format!(
            "Disk size '{}' contains non-ASCII characters",
            size
        )));
    }
    let (digits, suffix) = size.split_at(size.len() - 1);
    if !matches!(suffix, "K" | "M" | "G" | "T" | "k" | "m" | "g" | "t") {
        return Err(ValidationError::Format(format!(
            "Disk size '{}' must end with one of K, M, G, T",
            size
        )));
    }
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::Format(format!(
            "Disk size '{}' must be a whole number followed by a unit",
            size
        )));
    }
    if digits.chars().all(|c| c == '0') {
        return Err(ValidationError::ConstraintViolation(
            "Disk size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
