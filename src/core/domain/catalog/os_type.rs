//! OS type catalog.
//!
//! Each family has one internal code (what Proxmox stores in `ostype`) and a
//! list of accepted aliases. The first alias is the family's canonical name.

use crate::core::domain::error::{ProxmoxError, ProxmoxResult};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Other,
    Linux24,
    Linux,
    WindowsXp,
    Windows2000,
    Windows2003,
    Windows2008,
    WindowsVista,
    Windows7,
    Windows8,
    Windows10,
    Windows11,
    Solaris,
}

struct OsTypeEntry {
    family: OsFamily,
    code: &'static str,
    aliases: &'static [&'static str],
}

static OS_TYPE_CATALOG: [OsTypeEntry; 13] = [
    OsTypeEntry {
        family: OsFamily::Other,
        code: "other",
        aliases: &["other"],
    },
    OsTypeEntry {
        family: OsFamily::Linux24,
        code: "l24",
        aliases: &["linux24", "l24"],
    },
    OsTypeEntry {
        family: OsFamily::Linux,
        code: "l26",
        aliases: &["linux", "l26", "linux26", "linux3", "linux4"],
    },
    OsTypeEntry {
        family: OsFamily::WindowsXp,
        code: "wxp",
        aliases: &["winxp", "wxp"],
    },
    OsTypeEntry {
        family: OsFamily::Windows2000,
        code: "w2k",
        aliases: &["win2000", "w2k"],
    },
    OsTypeEntry {
        family: OsFamily::Windows2003,
        code: "w2k3",
        aliases: &["win2003", "w2k3"],
    },
    OsTypeEntry {
        family: OsFamily::Windows2008,
        code: "w2k8",
        aliases: &["win2008", "w2k8", "win2k8", "w2k8r2", "win2008r2", "win2k8r2"],
    },
    OsTypeEntry {
        family: OsFamily::WindowsVista,
        code: "wvista",
        aliases: &["vista", "wvista", "win2008sp0"],
    },
    OsTypeEntry {
        family: OsFamily::Windows7,
        code: "win7",
        aliases: &["win7"],
    },
    OsTypeEntry {
        family: OsFamily::Windows8,
        code: "win8",
        aliases: &["win8", "win2012"],
    },
    OsTypeEntry {
        family: OsFamily::Windows10,
        code: "win10",
        aliases: &["win10", "windows", "win2016"],
    },
    OsTypeEntry {
        family: OsFamily::Windows11,
        code: "win11",
        aliases: &["win11", "win2022"],
    },
    OsTypeEntry {
        family: OsFamily::Solaris,
        code: "solaris",
        aliases: &["solaris", "opensolaris", "openindiana"],
    },
];

impl OsFamily {
    pub fn all() -> impl Iterator<Item = OsFamily> {
        OS_TYPE_CATALOG.iter().map(|e| e.family)
    }

    fn entry(self) -> &'static OsTypeEntry {
        &OS_TYPE_CATALOG[self as usize]
    }

    /// The code Proxmox expects in the `ostype` config key.
    #[must_use]
    pub fn code(self) -> &'static str {
        self.entry().code
    }

    /// Canonical family name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.entry().aliases[0]
    }

    #[must_use]
    pub fn aliases(self) -> &'static [&'static str] {
        self.entry().aliases
    }

    /// Forward lookup: any alias, case-insensitive.
    pub fn from_alias(alias: &str) -> ProxmoxResult<OsFamily> {
        let wanted = alias.trim().to_ascii_lowercase();
        OS_TYPE_CATALOG
            .iter()
            .find(|e| e.aliases.contains(&wanted.as_str()))
            .map(|e| e.family)
            .ok_or_else(|| ProxmoxError::UnknownOsType(alias.to_string()))
    }

    /// Reverse lookup from the code read out of a VM config.
    pub fn from_code(code: &str) -> ProxmoxResult<OsFamily> {
        OS_TYPE_CATALOG
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.family)
            .ok_or_else(|| ProxmoxError::UnknownOsType(code.to_string()))
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves an OS family alias straight to the code written on create.
pub fn os_type_code(alias: &str) -> ProxmoxResult<&'static str> {
    OsFamily::from_alias(alias).map(OsFamily::code)
}
