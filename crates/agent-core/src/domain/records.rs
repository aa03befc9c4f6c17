//! # Persisted Records
//!
//! One record family per protocol artifact, each stored as JSON under a
//! deterministic key:
//!
//! | Kind | Key |
//! |---|---|
//! | Invitation, ConnectionReq, OfferCredential, RequestCredential, Credential, RequestPresentation, Presentation | `<Kind>_<did>_<id>` |
//! | Connection, GeneralMsg | `<Kind>_<did>` |

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::connection::{Connection, ConnectionRequest, Invitation};
use crate::domain::credential::{IssueCredential, RequestCredential};
use crate::domain::general::BasicMessage;
use crate::domain::presentation::{Presentation, RequestPresentation};
use crate::domain::state::{
    ConnectionRequestState, InvitationState, PresentationState, RequestCredentialState,
    StatefulRecord,
};

/// Record family; determines the key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Invitation,
    ConnectionReq,
    Connection,
    GeneralMsg,
    OfferCredential,
    RequestCredential,
    Credential,
    RequestPresentation,
    Presentation,
}

impl RecordKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Invitation => "Invitation",
            Self::ConnectionReq => "ConnectionReq",
            Self::Connection => "Connection",
            Self::GeneralMsg => "GeneralMsg",
            Self::OfferCredential => "OfferCredential",
            Self::RequestCredential => "RequestCredential",
            Self::Credential => "Credential",
            Self::RequestPresentation => "RequestPresentation",
            Self::Presentation => "Presentation",
        }
    }

    /// `<Kind>_<did>_<id>`
    pub fn key(&self, did: &str, id: &str) -> String {
        format!("{}_{}_{}", self.prefix(), did, id)
    }

    /// `<Kind>_<did>`, for per-owner records.
    pub fn owner_key(&self, did: &str) -> String {
        format!("{}_{}", self.prefix(), did)
    }

    /// Prefix shared by every `<Kind>_<did>_<id>` key of one owner.
    pub fn scan_prefix(&self, did: &str) -> String {
        format!("{}_{}_", self.prefix(), did)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationRecord {
    pub invitation: Invitation,
    pub state: InvitationState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequestRecord {
    #[serde(rename = "conn_req")]
    pub request: ConnectionRequest,
    pub state: ConnectionRequestState,
}

/// Every connection an owner DID holds, keyed by the peer DID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub owner_did: String,
    #[serde(default)]
    pub connections: BTreeMap<String, Connection>,
}

impl ConnectionRecord {
    pub fn new(owner_did: impl Into<String>) -> Self {
        Self {
            owner_did: owner_did.into(),
            connections: BTreeMap::new(),
        }
    }

    /// Insert or overwrite the entry for `connection.their_did`.
    pub fn save(&mut self, connection: Connection) {
        self.connections
            .insert(connection.their_did.clone(), connection);
    }

    pub fn get(&self, their_did: &str) -> Option<&Connection> {
        self.connections.get(their_did)
    }
}

/// Per-owner inbox, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralMsgRecord {
    pub owner_did: String,
    #[serde(default)]
    pub messages: Vec<BasicMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCredentialRecord {
    pub requester_did: String,
    pub request_credential: RequestCredential,
    pub state: RequestCredentialState,
}

/// Holder-side copy of an issued credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub owner_did: String,
    pub credential: IssueCredential,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPresentationRecord {
    pub request: RequestPresentation,
    pub state: PresentationState,
}

/// Verifier-side copy of a received presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationRecord {
    pub owner_did: String,
    pub presentation: Presentation,
    pub timestamp: DateTime<Utc>,
}

impl StatefulRecord for InvitationRecord {
    type State = InvitationState;

    fn state(&self) -> InvitationState {
        self.state
    }

    fn set_state(&mut self, state: InvitationState) {
        self.state = state;
    }
}

impl StatefulRecord for ConnectionRequestRecord {
    type State = ConnectionRequestState;

    fn state(&self) -> ConnectionRequestState {
        self.state
    }

    fn set_state(&mut self, state: ConnectionRequestState) {
        self.state = state;
    }
}

impl StatefulRecord for RequestCredentialRecord {
    type State = RequestCredentialState;

    fn state(&self) -> RequestCredentialState {
        self.state
    }

    fn set_state(&mut self, state: RequestCredentialState) {
        self.state = state;
    }
}

impl StatefulRecord for RequestPresentationRecord {
    type State = PresentationState;

    fn state(&self) -> PresentationState {
        self.state
    }

    fn set_state(&mut self, state: PresentationState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(
            RecordKind::Invitation.key("did:example:alice", "inv-1"),
            "Invitation_did:example:alice_inv-1"
        );
        assert_eq!(
            RecordKind::ConnectionReq.key("did:example:bob", "req-9"),
            "ConnectionReq_did:example:bob_req-9"
        );
        assert_eq!(
            RecordKind::Connection.owner_key("did:example:alice"),
            "Connection_did:example:alice"
        );
        assert_eq!(
            RecordKind::GeneralMsg.owner_key("did:example:alice"),
            "GeneralMsg_did:example:alice"
        );
        assert_eq!(
            RecordKind::Credential.scan_prefix("did:example:holder"),
            "Credential_did:example:holder_"
        );
    }

    #[test]
    fn test_connection_record_overwrites_by_peer() {
        let mut record = ConnectionRecord::new("did:example:alice");
        let mut conn = Connection {
            my_did: "did:example:alice".to_string(),
            their_did: "did:example:bob".to_string(),
            ..Default::default()
        };
        record.save(conn.clone());
        conn.their_service_id = "router".to_string();
        record.save(conn);

        assert_eq!(record.connections.len(), 1);
        assert_eq!(
            record.get("did:example:bob").unwrap().their_service_id,
            "router"
        );
    }

    #[test]
    fn test_request_record_wire_field_name() {
        let record = ConnectionRequestRecord {
            request: ConnectionRequest::default(),
            state: ConnectionRequestState::RequestSent,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("conn_req").is_some());
        assert_eq!(value["state"], "request_sent");
    }
}
