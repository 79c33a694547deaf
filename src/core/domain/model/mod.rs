pub mod client_config;
pub mod cluster_resource;
pub mod observed_vm;
pub mod proxmox_auth;
pub mod proxmox_connection;
pub mod task;
pub mod template_spec;
pub mod vm_config;
pub mod vm_spec;
