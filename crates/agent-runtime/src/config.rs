//! # Agent Configuration
//!
//! Defaults for every setting, overridable from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `AGENT_LABEL` | `agent.label` |
//! | `AGENT_HTTP_ADDR` | `network.http_addr` |
//! | `AGENT_STORAGE` | `storage.backend` (`memory` or `rocksdb`) |
//! | `AGENT_DATA_DIR` | `storage.data_dir` |
//! | `AGENT_GATEWAY_TIMEOUT_SECS` | `gateway.timeout_secs` |
//! | `AGENT_ENDPOINTS` | `resolver.endpoints`, as `did#service=url,...` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

/// Complete agent configuration.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    pub resolver: ResolverConfig,
}

impl AgentConfig {
    /// Reject settings the runtime cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        for entry in &self.resolver.endpoints {
            if entry.did.is_empty() || entry.url.is_empty() {
                return Err(ConfigError::MalformedEndpoint(format!(
                    "{}#{}={}",
                    entry.did, entry.service_id, entry.url
                )));
            }
        }
        if self.storage.backend == StorageBackend::RocksDb && !cfg!(feature = "rocksdb") {
            return Err(ConfigError::BackendUnavailable("rocksdb"));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("gateway timeout must be greater than zero")]
    ZeroTimeout,

    #[error("malformed endpoint entry {0:?}, expected did#service=url")]
    MalformedEndpoint(String),

    #[error("storage backend {0} is not compiled in; rebuild with --features {0}")]
    BackendUnavailable(&'static str),
}

#[derive(Debug, Clone)]
pub struct AgentSection {
    /// Stamped on invitations created without a label.
    pub label: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            label: "did-agent".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// HTTP listen address.
    pub http_addr: SocketAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    RocksDb,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "rocksdb" => Ok(StorageBackend::RocksDb),
            other => Err(format!("unknown backend {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// RocksDB directory.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("./data/agent"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Outbound delivery timeout in seconds.
    pub timeout_secs: u64,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// One static resolver entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointEntry {
    pub did: String,
    /// Empty for the DID's default endpoint.
    pub service_id: String,
    pub url: String,
}

impl FromStr for EndpointEntry {
    type Err = ConfigError;

    /// `did#service=url` or `did=url`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedEndpoint(s.to_string());
        let (target, url) = s.trim().split_once('=').ok_or_else(malformed)?;
        let (did, service_id) = target.split_once('#').unwrap_or((target, ""));
        if did.is_empty() || url.is_empty() {
            return Err(malformed());
        }
        Ok(Self {
            did: did.to_string(),
            service_id: service_id.to_string(),
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    pub endpoints: Vec<EndpointEntry>,
}

/// Build the configuration from the process environment.
pub fn load_config() -> Result<AgentConfig, ConfigError> {
    load_config_from(|var| std::env::var(var).ok())
}

/// Build the configuration from an arbitrary variable lookup.
pub fn load_config_from<F>(lookup: F) -> Result<AgentConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = AgentConfig::default();

    if let Some(label) = lookup("AGENT_LABEL") {
        config.agent.label = label;
    }
    if let Some(addr) = lookup("AGENT_HTTP_ADDR") {
        config.network.http_addr = parse("AGENT_HTTP_ADDR", &addr)?;
    }
    if let Some(backend) = lookup("AGENT_STORAGE") {
        config.storage.backend = backend.parse().map_err(|reason| ConfigError::InvalidValue {
            var: "AGENT_STORAGE",
            value: backend.clone(),
            reason,
        })?;
    }
    if let Some(dir) = lookup("AGENT_DATA_DIR") {
        config.storage.data_dir = PathBuf::from(dir);
    }
    if let Some(secs) = lookup("AGENT_GATEWAY_TIMEOUT_SECS") {
        config.gateway.timeout_secs = parse("AGENT_GATEWAY_TIMEOUT_SECS", &secs)?;
    }
    if let Some(entries) = lookup("AGENT_ENDPOINTS") {
        config.resolver.endpoints = entries
            .split(',')
            .filter(|e| !e.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<EndpointEntry>, _>>()?;
        info!(
            "[runtime] Loaded {} resolver endpoints from environment",
            config.resolver.endpoints.len()
        );
    }

    config.validate()?;
    Ok(config)
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.timeout(), Duration::from_secs(10));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_environment_overrides() {
        let config = load_config_from(env(&[
            ("AGENT_LABEL", "alice"),
            ("AGENT_HTTP_ADDR", "0.0.0.0:9000"),
            ("AGENT_GATEWAY_TIMEOUT_SECS", "3"),
            (
                "AGENT_ENDPOINTS",
                "did:example:bob#router=http://bob:8080, did:example:carol=http://carol:8080",
            ),
        ]))
        .unwrap();

        assert_eq!(config.agent.label, "alice");
        assert_eq!(config.network.http_addr.port(), 9000);
        assert_eq!(config.gateway.timeout_secs, 3);
        assert_eq!(
            config.resolver.endpoints,
            vec![
                EndpointEntry {
                    did: "did:example:bob".to_string(),
                    service_id: "router".to_string(),
                    url: "http://bob:8080".to_string(),
                },
                EndpointEntry {
                    did: "did:example:carol".to_string(),
                    service_id: String::new(),
                    url: "http://carol:8080".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = load_config_from(env(&[("AGENT_GATEWAY_TIMEOUT_SECS", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroTimeout);
    }

    #[test]
    fn test_malformed_endpoint_rejected() {
        let err = load_config_from(env(&[("AGENT_ENDPOINTS", "did:example:bob")])).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedEndpoint(_)));
    }

    #[test]
    fn test_bad_address_names_the_variable() {
        let err = load_config_from(env(&[("AGENT_HTTP_ADDR", "not-an-addr")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "AGENT_HTTP_ADDR",
                ..
            }
        ));
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_rocksdb_requires_feature() {
        let err = load_config_from(env(&[("AGENT_STORAGE", "rocksdb")])).unwrap_err();
        assert_eq!(err, ConfigError::BackendUnavailable("rocksdb"));
    }
}
