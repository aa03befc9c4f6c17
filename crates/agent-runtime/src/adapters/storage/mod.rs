//! # Production Storage Adapters
//!
//! Enable the `rocksdb` feature for the persistent backend:
//!
//! ```toml
//! agent-runtime = { path = "...", features = ["rocksdb"] }
//! ```
//!
//! Without it the runtime only offers the in-memory store.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};

pub use agent_core::InMemoryKVStore;
