pub mod manifest;
pub mod service;
