//! # Controllers
//!
//! One controller per protocol family. Each owns the record keys of its
//! family and reads (never writes) the connection records owned by the
//! connection controller.
//!
//! | Controller | Message types |
//! |---|---|
//! | `connection-controller` | invitation, request, response, ack, disconnect |
//! | `general-message-controller` | send / receive / query general messages |
//! | `credential-controller` | proposal, offer, request, issue, ack, query, delete |
//! | `presentation-controller` | request, presentation, ack, query |
//!
//! Outbound delivery always happens after every record lock of the
//! sequence has been released.

pub mod connection;
pub mod credential;
pub mod general;
pub mod presentation;

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

pub use connection::ConnectionController;
pub use credential::CredentialController;
pub use general::GeneralMessageController;
pub use presentation::PresentationController;

use crate::domain::connection::Connection;
use crate::domain::errors::AgentError;
use crate::domain::message::Message;
use crate::domain::records::{ConnectionRecord, RecordKind};
use crate::ports::inbound::Controller;
use crate::ports::outbound::{OutboundGateway, OutboundMessage};
use crate::service::repository::RecordStore;

/// The four standard controllers, in registration order.
pub fn default_controllers(
    records: RecordStore,
    gateway: Arc<dyn OutboundGateway>,
) -> Vec<Arc<dyn Controller>> {
    vec![
        Arc::new(ConnectionController::new(records.clone(), gateway.clone())),
        Arc::new(GeneralMessageController::new(
            records.clone(),
            gateway.clone(),
        )),
        Arc::new(CredentialController::new(records.clone(), gateway.clone())),
        Arc::new(PresentationController::new(records, gateway)),
    ]
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Stored connection of `owner` with `peer`, if any.
pub(crate) fn lookup_connection(
    records: &RecordStore,
    owner: &str,
    peer: &str,
) -> Result<Option<Connection>, AgentError> {
    let record: Option<ConnectionRecord> = records.load(&RecordKind::Connection.owner_key(owner))?;
    Ok(record.and_then(|r| r.get(peer).cloned()))
}

/// Like [`lookup_connection`], failing with `ReferenceNotFound`.
pub(crate) fn require_connection(
    records: &RecordStore,
    owner: &str,
    peer: &str,
) -> Result<Connection, AgentError> {
    lookup_connection(records, owner, peer)?.ok_or_else(|| AgentError::ReferenceNotFound {
        kind: "connection",
        id: format!("{} -> {}", owner, peer),
    })
}

/// Hand `message` to the gateway. Callers must not hold record locks.
pub(crate) async fn deliver(
    gateway: &Arc<dyn OutboundGateway>,
    message: Message,
    connection: Connection,
) -> Result<(), AgentError> {
    debug!(
        "[agent] Sending {} to {}",
        message.message_type(),
        connection.their_did
    );
    gateway
        .send(OutboundMessage::new(message, connection))
        .await
}

/// Key used by controllers to verify the store at startup.
pub(crate) fn probe_key(controller: &str) -> String {
    format!("__probe_{}", controller)
}
