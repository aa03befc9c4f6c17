//! # Credential Exchange Payloads
//!
//! Propose → offer → request → issue → ack between a holder and an issuer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::connection::{Connection, Thread};

/// A single claim in a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialAttribute {
    pub name: String,
    pub value: String,
}

impl CredentialAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Attributes proposed, offered or requested before issuance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPreview {
    #[serde(default)]
    pub attributes: Vec<CredentialAttribute>,
}

/// Holder → issuer: "I would like a credential like this".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCredential {
    #[serde(default)]
    pub id: String,
    pub connection: Connection,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub credential_proposal: CredentialPreview,
}

/// Issuer → holder, answering a proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferCredential {
    pub id: String,
    /// `thread.id` is the proposal id.
    pub thread: Thread,
    pub connection: Connection,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub credential_preview: CredentialPreview,
}

/// Holder → issuer: request issuance, optionally answering an offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCredential {
    #[serde(default)]
    pub id: String,
    /// Offer being accepted; empty when requesting without an offer.
    #[serde(default)]
    pub thread: Thread,
    pub connection: Connection,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub credential_preview: CredentialPreview,
}

/// The issued claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPayload {
    pub issuer_did: String,
    pub subject_did: String,
    pub attributes: Vec<CredentialAttribute>,
    pub issued_at: DateTime<Utc>,
}

/// Issuer → holder: the credential itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCredential {
    pub id: String,
    /// `thread.id` is the request id.
    pub thread: Thread,
    pub connection: Connection,
    #[serde(default)]
    pub comment: String,
    pub credential: CredentialPayload,
}

/// Local lookup / cleanup of a stored credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialQuery {
    pub did: String,
    pub id: String,
}
