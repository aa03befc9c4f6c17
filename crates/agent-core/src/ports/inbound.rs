//! # Inbound Ports (Driving Ports)
//!
//! The contract every controller implements so the dispatcher can drive it.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::connection::Invitation;
use crate::domain::errors::AgentError;
use crate::domain::general::BasicMessage;
use crate::domain::message::{Message, MessageType};
use crate::domain::records::{CredentialRecord, PresentationRecord};

/// Startup parameters shared by all controllers.
#[derive(Debug, Clone, Default)]
pub struct ControllerParams {
    /// Human-readable agent name, stamped on invitations without a label.
    pub agent_label: String,
}

/// Result of a controller processing one message.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerResponse {
    /// Processed, with data for the caller.
    Reply(Reply),
    /// Processed, nothing to return.
    Done,
    /// Not this controller's business after all; the dispatcher tries the
    /// next one.
    Skip(Message),
}

/// Data returned to the local caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Invitation(Invitation),
    /// The message that was sent to the peer.
    Sent(Box<Message>),
    GeneralMessages(Vec<BasicMessage>),
    Credential(Box<CredentialRecord>),
    Credentials(Vec<CredentialRecord>),
    Presentation(Box<PresentationRecord>),
}

/// A named, independently initializable handler of a subset of message
/// types.
#[async_trait]
pub trait Controller: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this controller claims `message_type`.
    fn handles(&self, message_type: MessageType) -> bool;

    /// Called once at startup; an error aborts the agent.
    async fn initiate(&self, params: &ControllerParams) -> Result<(), AgentError>;

    async fn process(&self, message: Message) -> Result<ControllerResponse, AgentError>;

    /// Called once at shutdown; failures are logged by the dispatcher.
    async fn shutdown(&self) -> Result<(), AgentError> {
        Ok(())
    }
}
