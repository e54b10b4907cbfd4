//! Adapters for the ports in [`crate::domain::ports`].

pub mod http_gateway;
pub mod in_memory;
pub mod provider;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod sandbox;
pub mod signature;
