//! # Presentation Exchange Payloads

use serde::{Deserialize, Serialize};

use crate::domain::connection::{Connection, Thread};
use crate::domain::credential::CredentialPayload;

/// Verifier → prover: present these credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPresentation {
    #[serde(default)]
    pub id: String,
    pub connection: Connection,
    #[serde(default)]
    pub comment: String,
    /// Ids of credentials the prover holds.
    pub credential_ids: Vec<String>,
}

/// Prover → verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub id: String,
    /// `thread.id` is the presentation request id.
    pub thread: Thread,
    pub connection: Connection,
    pub credentials: Vec<CredentialPayload>,
}

/// Local lookup of a received presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationQuery {
    pub did: String,
    pub id: String,
}
