//! # Domain Errors
//!
//! Every failure a controller can report to the dispatcher, and through it
//! to the transport layer.
//!
//! ## Propagation
//!
//! - Errors are returned to the immediate caller; nothing inside the core
//!   retries a state-advancing write.
//! - Replays of an already-applied step surface as `AlreadyExists` or
//!   `InvalidStateTransition`, never as silent success.
//! - Store failures fail the current request only.

use thiserror::Error;

use crate::domain::message::MessageType;
use crate::ports::outbound::StoreError;

/// Errors produced by the protocol engine.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Record absent from the store.
    #[error("record not found: {key}")]
    NotFound { key: String },

    /// Create of a record whose key is already taken.
    #[error("record already exists: {key}")]
    AlreadyExists { key: String },

    /// Update whose target state is not reachable from the stored state.
    #[error("invalid state transition for {key}: {from} -> {to}")]
    InvalidStateTransition {
        key: String,
        from: String,
        to: String,
    },

    /// Payload does not match the shape its message type promises.
    #[error("malformed content for {message_type}: {reason}")]
    MalformedContent {
        message_type: MessageType,
        reason: String,
    },

    /// A message refers to an artifact this agent does not hold
    /// (invitation, outstanding request, connection, credential).
    #[error("referenced {kind} not found: {id}")]
    ReferenceNotFound { kind: &'static str, id: String },

    /// Outbound gateway could not deliver the message.
    #[error("delivery to {did} failed: {reason}")]
    RemoteDeliveryFailed { did: String, reason: String },

    /// No registered controller claims the message type.
    #[error("no controller handles message type {0}")]
    Unhandled(MessageType),

    /// An acknowledgement carried a non-`succeed` status.
    #[error("got failed ACK for thread {thread_id}")]
    FailedAck { thread_id: String },

    /// Key-value store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Record (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resolver could not map a DID to a service endpoint.
    #[error("cannot resolve service endpoint for {did}#{service_id}: {reason}")]
    Resolution {
        did: String,
        service_id: String,
        reason: String,
    },

    /// Controller setup failed at agent startup.
    #[error("controller {controller} failed to initiate: {reason}")]
    Initiate {
        controller: &'static str,
        reason: String,
    },
}

impl AgentError {
    /// Shorthand for a missing required field in an otherwise decodable payload.
    pub fn missing_field(message_type: MessageType, field: &str) -> Self {
        AgentError::MalformedContent {
            message_type,
            reason: format!("missing required field `{}`", field),
        }
    }
}
