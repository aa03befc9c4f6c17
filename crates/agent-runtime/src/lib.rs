//! # DID Agent Runtime
//!
//! Hosts `agent-core` behind an HTTP route table.
//!
//! - `config` - Defaults plus environment overrides
//! - `adapters/` - Storage backends (RocksDB behind the `rocksdb` feature)
//! - `routes` - axum router, one POST route per message type
//! - `runtime` - Startup wiring and graceful shutdown

pub mod adapters;
pub mod config;
pub mod routes;
pub mod runtime;

pub use config::{load_config, AgentConfig, ConfigError};
pub use routes::build_router;
pub use runtime::AgentRuntime;
