//! Instance size catalog.
//!
//! Maps human-friendly size names to a (cores, memory in MB) pair and back.
//! Reverse lookups are exact: a pair that is not in the table comes back as
//! [`Size::Custom`] carrying exactly that pair.

use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named entry of the size catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceSize {
    Nano,
    Micro,
    Small,
    Medium,
    Large,
    #[serde(rename = "xlarge")]
    XLarge,
    #[serde(rename = "2xlarge")]
    X2Large,
    #[serde(rename = "4xlarge")]
    X4Large,
}

struct SizeEntry {
    size: InstanceSize,
    name: &'static str,
    cpu: u32,
    memory: u32,
}

static SIZE_CATALOG: [SizeEntry; 8] = [
    SizeEntry { size: InstanceSize::Nano, name: "nano", cpu: 1, memory: 512 },
    SizeEntry { size: InstanceSize::Micro, name: "micro", cpu: 1, memory: 1024 },
    SizeEntry { size: InstanceSize::Small, name: "small", cpu: 1, memory: 2048 },
    SizeEntry { size: InstanceSize::Medium, name: "medium", cpu: 2, memory: 4096 },
    SizeEntry { size: InstanceSize::Large, name: "large", cpu: 2, memory: 8192 },
    SizeEntry { size: InstanceSize::XLarge, name: "xlarge", cpu: 4, memory: 16384 },
    SizeEntry { size: InstanceSize::X2Large, name: "2xlarge", cpu: 8, memory: 32768 },
    SizeEntry { size: InstanceSize::X4Large, name: "4xlarge", cpu: 16, memory: 65536 },
];

impl InstanceSize {
    /// Every catalog entry, smallest first.
    pub fn all() -> impl Iterator<Item = InstanceSize> {
        SIZE_CATALOG.iter().map(|e| e.size)
    }

    fn entry(self) -> &'static SizeEntry {
        // The table is indexed in declaration order.
        &SIZE_CATALOG[self as usize]
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// Core count.
    #[must_use]
    pub fn cpu(self) -> u32 {
        self.entry().cpu
    }

    /// Memory in MB.
    #[must_use]
    pub fn memory(self) -> u32 {
        self.entry().memory
    }
}

impl fmt::Display for InstanceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InstanceSize {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SIZE_CATALOG
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(s.trim()))
            .map(|e| e.size)
            .ok_or_else(|| {
                ValidationError::field(
                    "size",
                    format!(
                        "unknown size '{}', expected one of: {}",
                        s,
                        SIZE_CATALOG
                            .iter()
                            .map(|e| e.name)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                )
            })
    }
}

/// Hardware size of a VM: either a catalog entry or an explicit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Size {
    Named(InstanceSize),
    Custom { cpu: u32, memory: u32 },
}

impl Size {
    /// Core count.
    #[must_use]
    pub fn cpu(&self) -> u32 {
        match self {
            Size::Named(size) => size.cpu(),
            Size::Custom { cpu, .. } => *cpu,
        }
    }

    /// Memory in MB.
    #[must_use]
    pub fn memory(&self) -> u32 {
        match self {
            Size::Named(size) => size.memory(),
            Size::Custom { memory, .. } => *memory,
        }
    }

    /// Folds a custom pair that exactly matches a catalog entry into that entry.
    #[must_use]
    pub fn canonical(self) -> Size {
        size_of(self.cpu(), self.memory())
    }
}

impl Default for Size {
    fn default() -> Self {
        Size::Named(InstanceSize::Micro)
    }
}

impl From<InstanceSize> for Size {
    fn from(size: InstanceSize) -> Self {
        Size::Named(size)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Named(size) => write!(f, "{}", size),
            Size::Custom { cpu, memory } => write!(f, "custom({} cores, {} MB)", cpu, memory),
        }
    }
}

/// Reverse lookup from a (cores, memory MB) pair. Exact match only.
#[must_use]
pub fn size_of(cpu: u32, memory: u32) -> Size {
    SIZE_CATALOG
        .iter()
        .find(|e| e.cpu == cpu && e.memory == memory)
        .map(|e| Size::Named(e.size))
        .unwrap_or(Size::Custom { cpu, memory })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_round_trip() {
        for size in InstanceSize::all() {
            assert_eq!(size_of(size.cpu(), size.memory()), Size::Named(size));
            assert_eq!(size.name().parse::<InstanceSize>().unwrap(), size);
        }
        assert_eq!(InstanceSize::all().count(), 8);
    }

    #[test]
    fn test_catalog_values() {
        assert_eq!((InstanceSize::Nano.cpu(), InstanceSize::Nano.memory()), (1, 512));
        assert_eq!((InstanceSize::Small.cpu(), InstanceSize::Small.memory()), (1, 2048));
        assert_eq!((InstanceSize::X4Large.cpu(), InstanceSize::X4Large.memory()), (16, 65536));
    }

    #[test]
    fn test_non_catalog_pair_is_custom() {
        for (cpu, memory) in [(1, 2047), (3, 4096), (2, 2048), (0, 0), (16, 65537)] {
            assert_eq!(size_of(cpu, memory), Size::Custom { cpu, memory });
        }
    }

    #[test]
    fn test_custom_canonicalizes_only_on_exact_match() {
        assert_eq!(
            Size::Custom { cpu: 2, memory: 4096 }.canonical(),
            Size::Named(InstanceSize::Medium)
        );
        assert_eq!(
            Size::Custom { cpu: 2, memory: 4095 }.canonical(),
            Size::Custom { cpu: 2, memory: 4095 }
        );
    }

    #[test]
    fn test_unknown_name_rejected() {
        assert!("huge".parse::<InstanceSize>().is_err());
        assert_eq!("XLarge".parse::<InstanceSize>().unwrap(), InstanceSize::XLarge);
    }

    #[test]
    fn test_serde_shapes() {
        let named: Size = serde_json::from_str("\"2xlarge\"").unwrap();
        assert_eq!(named, Size::Named(InstanceSize::X2Large));
        let custom: Size = serde_json::from_str(r#"{"cpu": 3, "memory": 3072}"#).unwrap();
        assert_eq!(custom, Size::Custom { cpu: 3, memory: 3072 });
        assert!(serde_json::from_str::<Size>("\"huge\"").is_err());
        assert_eq!(serde_json::to_string(&named).unwrap(), "\"2xlarge\"");
    }
}
