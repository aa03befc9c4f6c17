//! # HTTP Outbound Gateway
//!
//! Delivers a message to the peer named by `connection.their_did`:
//!
//! 1. resolve `(their_did, their_service_id)` to a base URL;
//! 2. POST the message payload as JSON to `<base>/api/v1/<route>`;
//! 3. give up after the configured timeout.
//!
//! No retries here. A failed delivery is reported to the controller, which
//! has already committed its local state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::domain::errors::AgentError;
use crate::ports::outbound::{OutboundGateway, OutboundMessage, Resolver};

/// Default delivery timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Route prefix shared with the receiving runtime's router.
pub const API_PREFIX: &str = "/api/v1";

pub struct HttpOutboundGateway {
    client: Client,
    resolver: Arc<dyn Resolver>,
    timeout: Duration,
}

impl HttpOutboundGateway {
    pub fn new(resolver: Arc<dyn Resolver>, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(2)))
            .build()
            .map_err(|e| AgentError::Initiate {
                controller: "http-outbound-gateway",
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            resolver,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn delivery_failed(did: &str, reason: impl Into<String>) -> AgentError {
        AgentError::RemoteDeliveryFailed {
            did: did.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl OutboundGateway for HttpOutboundGateway {
    async fn send(&self, outbound: OutboundMessage) -> Result<(), AgentError> {
        let peer = &outbound.connection;
        let endpoint = self
            .resolver
            .resolve_service_endpoint(&peer.their_did, &peer.their_service_id)
            .await?;

        let route = outbound.message.message_type().route();
        let url = format!("{}{}/{}", endpoint, API_PREFIX, route);
        let body = outbound.message.content_json()?;

        debug!("[gateway] POST {} to {}", route, url);

        let request = self.client.post(&url).json(&body).send();
        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("[gateway] Delivery of {} to {} failed: {}", route, url, e);
                return Err(Self::delivery_failed(&peer.their_did, e.to_string()));
            }
            Err(_) => {
                warn!("[gateway] Delivery of {} to {} timed out", route, url);
                return Err(Self::delivery_failed(
                    &peer.their_did,
                    format!("timed out after {:?}", self.timeout),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("[gateway] {} answered {} for {}", url, status, route);
            return Err(Self::delivery_failed(
                &peer.their_did,
                format!("peer answered {}: {}", status, detail),
            ));
        }

        Ok(())
    }
}
