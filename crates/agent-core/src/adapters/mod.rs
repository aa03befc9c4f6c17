//! # Adapters
//!
//! Reference implementations of the outbound ports.
//!
//! - `memory` - `InMemoryKVStore`
//! - `resolver` - `StaticResolver`
//! - `gateway` - `HttpOutboundGateway` (reqwest)
//!
//! The RocksDB store lives in `agent-runtime` behind the `rocksdb` feature.

pub mod gateway;
pub mod memory;
pub mod resolver;

pub use gateway::HttpOutboundGateway;
pub use memory::InMemoryKVStore;
pub use resolver::StaticResolver;
