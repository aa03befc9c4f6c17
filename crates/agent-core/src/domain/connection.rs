//! # Connection Handshake Payloads
//!
//! Invitation → request → response → acknowledgement, plus disconnect.
//!
//! Every payload that travels between agents carries its [`Connection`]
//! descriptor from the SENDER's point of view. A receiver calls
//! [`Connection::reversed`] to obtain its own view of the relationship.

use serde::{Deserialize, Serialize};

/// An established (or proposed) relationship between two DIDs.
///
/// `my_*` fields belong to the party holding this value, `their_*` to the peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub my_did: String,
    /// Service entry of `my_did` that routes messages to this agent.
    #[serde(default)]
    pub my_service_id: String,
    pub their_did: String,
    #[serde(default)]
    pub their_service_id: String,
}

impl Connection {
    /// The same relationship as seen by the peer.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            my_did: self.their_did.clone(),
            my_service_id: self.their_service_id.clone(),
            their_did: self.my_did.clone(),
            their_service_id: self.my_service_id.clone(),
        }
    }
}

/// Correlation identifier tying a reply back to the message that opened
/// the exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
}

impl Thread {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Outcome carried by every acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Succeed,
    Failed,
}

/// Offer to connect, published out-of-band by the inviter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    /// Stamped with a UUID when left empty.
    #[serde(default)]
    pub id: String,
    /// Owner (inviter) DID.
    pub did: String,
    /// Inviter's router / service entry.
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub label: String,
}

/// The invitee's answer to an invitation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    #[serde(default)]
    pub id: String,
    pub invitation_id: String,
    /// Requester's view: `my` = requester, `their` = inviter.
    pub connection: Connection,
}

/// The inviter's reply to a connection request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionResponse {
    pub id: String,
    /// `thread.id` is the request id.
    pub thread: Thread,
    /// Inviter's view: `my` = inviter, `their` = requester.
    pub connection: Connection,
}

/// Final handshake confirmation sent by the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAck {
    pub id: String,
    pub thread: Thread,
    pub status: AckStatus,
    /// Requester's view.
    pub connection: Connection,
}

/// Acknowledgement used by the credential and presentation exchanges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralAck {
    pub id: String,
    pub thread: Thread,
    pub status: AckStatus,
    pub connection: Connection,
}

/// Tear down an established relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectRequest {
    pub connection: Connection,
}
