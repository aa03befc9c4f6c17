//! Fixtures shared by unit and integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::adapters::memory::InMemoryKVStore;
use crate::controllers::default_controllers;
use crate::domain::errors::AgentError;
use crate::domain::message::Message;
use crate::ports::inbound::{ControllerParams, Reply};
use crate::ports::outbound::{OutboundGateway, OutboundMessage};
use crate::service::repository::RecordStore;
use crate::service::AgentService;

/// Gateway that records instead of delivering.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: bool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails with `RemoteDeliveryFailed`.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    /// Drain everything sent so far.
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

#[async_trait]
impl OutboundGateway for RecordingGateway {
    async fn send(&self, outbound: OutboundMessage) -> Result<(), AgentError> {
        if self.failing {
            return Err(AgentError::RemoteDeliveryFailed {
                did: outbound.connection.their_did,
                reason: "recording gateway set to fail".to_string(),
            });
        }
        self.sent.lock().push(outbound);
        Ok(())
    }
}

/// One agent wired with the default controllers over an in-memory store.
pub struct TestAgent {
    pub service: AgentService,
    pub records: RecordStore,
    pub store: Arc<InMemoryKVStore>,
    pub gateway: Arc<RecordingGateway>,
}

impl TestAgent {
    pub async fn new(label: &str) -> Self {
        Self::with_gateway(label, RecordingGateway::new()).await
    }

    pub async fn with_gateway(label: &str, gateway: RecordingGateway) -> Self {
        let store = Arc::new(InMemoryKVStore::new());
        let records = RecordStore::new(store.clone());
        let gateway = Arc::new(gateway);

        let mut service = AgentService::new();
        for controller in default_controllers(records.clone(), gateway.clone()) {
            service.register_controller(controller);
        }
        let params = ControllerParams {
            agent_label: label.to_string(),
        };
        if let Err(e) = service.initiate_all(&params).await {
            panic!("test agent failed to initiate: {}", e);
        }

        Self {
            service,
            records,
            store,
            gateway,
        }
    }

    /// Dispatch and unwrap `Unhandled` into an error.
    pub async fn serve(&self, message: Message) -> Result<Option<Reply>, AgentError> {
        self.service.serve(message).await?.into_reply()
    }

    /// Feed every message this agent has sent into `peer`, in order.
    pub async fn flush_to(&self, peer: &TestAgent) -> Vec<Result<Option<Reply>, AgentError>> {
        let mut results = Vec::new();
        for outbound in self.gateway.take() {
            results.push(peer.serve(outbound.message).await);
        }
        results
    }
}
