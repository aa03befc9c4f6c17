//! Resolver backed by a fixed table of service endpoints.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::errors::AgentError;
use crate::ports::outbound::Resolver;

/// Maps `(did, service_id)` to an endpoint URL.
///
/// An entry registered with an empty service id acts as the DID's default
/// endpoint.
#[derive(Debug, Default)]
pub struct StaticResolver {
    endpoints: RwLock<HashMap<(String, String), String>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(
        self,
        did: impl Into<String>,
        service_id: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        self.register(did, service_id, endpoint);
        self
    }

    pub fn register(
        &self,
        did: impl Into<String>,
        service_id: impl Into<String>,
        endpoint: impl Into<String>,
    ) {
        let endpoint = endpoint.into();
        let endpoint = endpoint.trim_end_matches('/').to_string();
        self.endpoints
            .write()
            .insert((did.into(), service_id.into()), endpoint);
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve_service_endpoint(
        &self,
        did: &str,
        service_id: &str,
    ) -> Result<String, AgentError> {
        let endpoints = self.endpoints.read();
        let found = endpoints
            .get(&(did.to_string(), service_id.to_string()))
            .or_else(|| endpoints.get(&(did.to_string(), String::new())));

        match found {
            Some(endpoint) => {
                debug!("[resolver] {}#{} -> {}", did, service_id, endpoint);
                Ok(endpoint.clone())
            }
            None => Err(AgentError::Resolution {
                did: did.to_string(),
                service_id: service_id.to_string(),
                reason: "no endpoint registered".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exact_match_then_default() {
        let resolver = StaticResolver::new()
            .with_endpoint("did:example:bob", "router", "http://bob:8080/")
            .with_endpoint("did:example:bob", "", "http://bob-default:8080");

        assert_eq!(
            resolver
                .resolve_service_endpoint("did:example:bob", "router")
                .await
                .unwrap(),
            "http://bob:8080"
        );
        assert_eq!(
            resolver
                .resolve_service_endpoint("did:example:bob", "other")
                .await
                .unwrap(),
            "http://bob-default:8080"
        );
    }

    #[tokio::test]
    async fn test_unknown_did_fails() {
        let resolver = StaticResolver::new();
        let err = resolver
            .resolve_service_endpoint("did:example:nobody", "router")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Resolution { .. }));
    }
}
