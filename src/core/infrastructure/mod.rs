pub mod api_client;
pub mod image_fetcher;
pub mod proxmox_api;
pub mod pvesh;
pub mod transport;
