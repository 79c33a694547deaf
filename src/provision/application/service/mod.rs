pub mod template_service;
pub mod vm_service;
