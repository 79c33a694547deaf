mod credentials;
mod disk_size;
pub(crate) mod serde_helpers;
mod sha256_checksum;
mod vm_id;

pub use credentials::{ProxmoxHost, ProxmoxPassword, ProxmoxPort, ProxmoxRealm, ProxmoxUsername};
pub use disk_size::DiskSize;
pub use sha256_checksum::Sha256Checksum;
pub use vm_id::VmId;
