//! # Message Model
//!
//! The closed catalog of protocol message types and the tagged [`Message`]
//! union carrying each type's payload.
//!
//! Untyped input becomes typed exactly once, in [`Message::decode`]. A
//! payload that does not fit the shape its type promises is rejected there
//! as `MalformedContent`; past that point a controller can only ever see
//! the payload its message type declares.
//!
//! ## Wire Envelope
//!
//! ```text
//! { "type": "connection_request", "content": { ...ConnectionRequest... } }
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::connection::{
    ConnectionAck, ConnectionRequest, ConnectionResponse, DisconnectRequest, GeneralAck,
    Invitation,
};
use crate::domain::credential::{
    CredentialQuery, IssueCredential, OfferCredential, ProposalCredential, RequestCredential,
};
use crate::domain::errors::AgentError;
use crate::domain::general::{BasicMessage, QueryGeneralMessage};
use crate::domain::presentation::{Presentation, PresentationQuery, RequestPresentation};

/// Every message type the agent understands.
///
/// `Send*` variants are local API calls that originate an exchange; the
/// others arrive from a peer (or, for queries, from the local API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Connection handshake
    Invitation,
    SendConnectionRequest,
    ConnectionRequest,
    ConnectionResponse,
    ConnectionAck,
    SendDisconnect,
    Disconnect,

    // Credential exchange
    SendProposalCredential,
    ProposalCredential,
    OfferCredential,
    SendRequestCredential,
    RequestCredential,
    IssueCredential,
    CredentialAck,
    QueryCredential,
    DeleteCredential,

    // Presentation exchange
    SendRequestPresentation,
    RequestPresentation,
    Presentation,
    PresentationAck,
    QueryPresentation,

    // General messages
    SendGeneralMsg,
    ReceiveGeneralMsg,
    QueryGeneralMessage,
}

impl MessageType {
    /// All message types, in catalog order.
    pub const ALL: [MessageType; 24] = [
        MessageType::Invitation,
        MessageType::SendConnectionRequest,
        MessageType::ConnectionRequest,
        MessageType::ConnectionResponse,
        MessageType::ConnectionAck,
        MessageType::SendDisconnect,
        MessageType::Disconnect,
        MessageType::SendProposalCredential,
        MessageType::ProposalCredential,
        MessageType::OfferCredential,
        MessageType::SendRequestCredential,
        MessageType::RequestCredential,
        MessageType::IssueCredential,
        MessageType::CredentialAck,
        MessageType::QueryCredential,
        MessageType::DeleteCredential,
        MessageType::SendRequestPresentation,
        MessageType::RequestPresentation,
        MessageType::Presentation,
        MessageType::PresentationAck,
        MessageType::QueryPresentation,
        MessageType::SendGeneralMsg,
        MessageType::ReceiveGeneralMsg,
        MessageType::QueryGeneralMessage,
    ];

    /// Stable name used for routes, logs and the envelope `type` tag.
    #[must_use]
    pub fn route(&self) -> &'static str {
        match self {
            Self::Invitation => "invitation",
            Self::SendConnectionRequest => "send_connection_request",
            Self::ConnectionRequest => "connection_request",
            Self::ConnectionResponse => "connection_response",
            Self::ConnectionAck => "connection_ack",
            Self::SendDisconnect => "send_disconnect",
            Self::Disconnect => "disconnect",
            Self::SendProposalCredential => "send_proposal_credential",
            Self::ProposalCredential => "proposal_credential",
            Self::OfferCredential => "offer_credential",
            Self::SendRequestCredential => "send_request_credential",
            Self::RequestCredential => "request_credential",
            Self::IssueCredential => "issue_credential",
            Self::CredentialAck => "credential_ack",
            Self::QueryCredential => "query_credential",
            Self::DeleteCredential => "delete_credential",
            Self::SendRequestPresentation => "send_request_presentation",
            Self::RequestPresentation => "request_presentation",
            Self::Presentation => "presentation",
            Self::PresentationAck => "presentation_ack",
            Self::QueryPresentation => "query_presentation",
            Self::SendGeneralMsg => "send_general_msg",
            Self::ReceiveGeneralMsg => "receive_general_msg",
            Self::QueryGeneralMessage => "query_general_message",
        }
    }

    /// Inverse of [`MessageType::route`].
    #[must_use]
    pub fn from_route(route: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.route() == route)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route())
    }
}

/// A protocol message: type tag plus typed content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Message {
    Invitation(Invitation),
    SendConnectionRequest(ConnectionRequest),
    ConnectionRequest(ConnectionRequest),
    ConnectionResponse(ConnectionResponse),
    ConnectionAck(ConnectionAck),
    SendDisconnect(DisconnectRequest),
    Disconnect(DisconnectRequest),

    SendProposalCredential(ProposalCredential),
    ProposalCredential(ProposalCredential),
    OfferCredential(OfferCredential),
    SendRequestCredential(RequestCredential),
    RequestCredential(RequestCredential),
    IssueCredential(IssueCredential),
    CredentialAck(GeneralAck),
    QueryCredential(CredentialQuery),
    DeleteCredential(CredentialQuery),

    SendRequestPresentation(RequestPresentation),
    RequestPresentation(RequestPresentation),
    Presentation(Presentation),
    PresentationAck(GeneralAck),
    QueryPresentation(PresentationQuery),

    SendGeneralMsg(BasicMessage),
    ReceiveGeneralMsg(BasicMessage),
    QueryGeneralMessage(QueryGeneralMessage),
}

impl Message {
    /// The type tag of this message.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Invitation(_) => MessageType::Invitation,
            Self::SendConnectionRequest(_) => MessageType::SendConnectionRequest,
            Self::ConnectionRequest(_) => MessageType::ConnectionRequest,
            Self::ConnectionResponse(_) => MessageType::ConnectionResponse,
            Self::ConnectionAck(_) => MessageType::ConnectionAck,
            Self::SendDisconnect(_) => MessageType::SendDisconnect,
            Self::Disconnect(_) => MessageType::Disconnect,
            Self::SendProposalCredential(_) => MessageType::SendProposalCredential,
            Self::ProposalCredential(_) => MessageType::ProposalCredential,
            Self::OfferCredential(_) => MessageType::OfferCredential,
            Self::SendRequestCredential(_) => MessageType::SendRequestCredential,
            Self::RequestCredential(_) => MessageType::RequestCredential,
            Self::IssueCredential(_) => MessageType::IssueCredential,
            Self::CredentialAck(_) => MessageType::CredentialAck,
            Self::QueryCredential(_) => MessageType::QueryCredential,
            Self::DeleteCredential(_) => MessageType::DeleteCredential,
            Self::SendRequestPresentation(_) => MessageType::SendRequestPresentation,
            Self::RequestPresentation(_) => MessageType::RequestPresentation,
            Self::Presentation(_) => MessageType::Presentation,
            Self::PresentationAck(_) => MessageType::PresentationAck,
            Self::QueryPresentation(_) => MessageType::QueryPresentation,
            Self::SendGeneralMsg(_) => MessageType::SendGeneralMsg,
            Self::ReceiveGeneralMsg(_) => MessageType::ReceiveGeneralMsg,
            Self::QueryGeneralMessage(_) => MessageType::QueryGeneralMessage,
        }
    }

    /// Decode an untyped payload into the variant `message_type` declares.
    ///
    /// # Errors
    ///
    /// `MalformedContent` when `content` does not deserialize into that
    /// variant's payload.
    pub fn decode(message_type: MessageType, content: Value) -> Result<Self, AgentError> {
        let t = message_type;
        let msg = match t {
            MessageType::Invitation => Self::Invitation(typed(t, content)?),
            MessageType::SendConnectionRequest => Self::SendConnectionRequest(typed(t, content)?),
            MessageType::ConnectionRequest => Self::ConnectionRequest(typed(t, content)?),
            MessageType::ConnectionResponse => Self::ConnectionResponse(typed(t, content)?),
            MessageType::ConnectionAck => Self::ConnectionAck(typed(t, content)?),
            MessageType::SendDisconnect => Self::SendDisconnect(typed(t, content)?),
            MessageType::Disconnect => Self::Disconnect(typed(t, content)?),
            MessageType::SendProposalCredential => {
                Self::SendProposalCredential(typed(t, content)?)
            }
            MessageType::ProposalCredential => Self::ProposalCredential(typed(t, content)?),
            MessageType::OfferCredential => Self::OfferCredential(typed(t, content)?),
            MessageType::SendRequestCredential => Self::SendRequestCredential(typed(t, content)?),
            MessageType::RequestCredential => Self::RequestCredential(typed(t, content)?),
            MessageType::IssueCredential => Self::IssueCredential(typed(t, content)?),
            MessageType::CredentialAck => Self::CredentialAck(typed(t, content)?),
            MessageType::QueryCredential => Self::QueryCredential(typed(t, content)?),
            MessageType::DeleteCredential => Self::DeleteCredential(typed(t, content)?),
            MessageType::SendRequestPresentation => {
                Self::SendRequestPresentation(typed(t, content)?)
            }
            MessageType::RequestPresentation => Self::RequestPresentation(typed(t, content)?),
            MessageType::Presentation => Self::Presentation(typed(t, content)?),
            MessageType::PresentationAck => Self::PresentationAck(typed(t, content)?),
            MessageType::QueryPresentation => Self::QueryPresentation(typed(t, content)?),
            MessageType::SendGeneralMsg => Self::SendGeneralMsg(typed(t, content)?),
            MessageType::ReceiveGeneralMsg => Self::ReceiveGeneralMsg(typed(t, content)?),
            MessageType::QueryGeneralMessage => Self::QueryGeneralMessage(typed(t, content)?),
        };
        Ok(msg)
    }

    /// The payload alone, as it is POSTed to a peer's route.
    pub fn content_json(&self) -> Result<Value, AgentError> {
        let mut envelope = serde_json::to_value(self)?;
        Ok(envelope
            .get_mut("content")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

fn typed<T: DeserializeOwned>(message_type: MessageType, content: Value) -> Result<T, AgentError> {
    if content.is_null() {
        return Err(AgentError::MalformedContent {
            message_type,
            reason: "message content is nil".to_string(),
        });
    }
    serde_json::from_value(content).map_err(|e| AgentError::MalformedContent {
        message_type,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_round_trips_for_every_type() {
        for t in MessageType::ALL {
            assert_eq!(MessageType::from_route(t.route()), Some(t));
        }
        assert_eq!(MessageType::from_route("teleport"), None);
    }

    #[test]
    fn test_route_matches_serde_tag() {
        for t in MessageType::ALL {
            let tag = serde_json::to_value(t).unwrap();
            assert_eq!(tag, json!(t.route()));
        }
    }

    #[test]
    fn test_decode_typed_payload() {
        let msg = Message::decode(
            MessageType::Invitation,
            json!({ "id": "inv-1", "did": "did:example:alice", "service_id": "router" }),
        )
        .unwrap();
        assert_eq!(msg.message_type(), MessageType::Invitation);
        match msg {
            Message::Invitation(inv) => assert_eq!(inv.id, "inv-1"),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        // A basic message is not a connection request.
        let err = Message::decode(
            MessageType::ConnectionRequest,
            json!({ "content": "hello", "connection": {} }),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AgentError::MalformedContent {
                message_type: MessageType::ConnectionRequest,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_rejects_null_content() {
        let err = Message::decode(MessageType::QueryGeneralMessage, Value::Null).unwrap_err();
        assert!(err.to_string().contains("nil"));
    }

    #[test]
    fn test_envelope_and_content_json() {
        let msg = Message::QueryCredential(CredentialQuery {
            did: "did:example:holder".to_string(),
            id: "cred-1".to_string(),
        });
        let envelope = serde_json::to_value(&msg).unwrap();
        assert_eq!(envelope["type"], json!("query_credential"));
        assert_eq!(
            msg.content_json().unwrap(),
            json!({ "did": "did:example:holder", "id": "cred-1" })
        );
    }
}
