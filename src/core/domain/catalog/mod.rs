//! Static lookup tables shipped with the crate. Never mutated at runtime.

mod os_type;
mod size;

pub use os_type::{OsFamily, os_type_code};
pub use size::{InstanceSize, Size, size_of};
