//! # Record State Machines
//!
//! Each stateful record kind owns an explicit transition table. A state
//! change is legal only if the `(from, to)` pair appears in that table;
//! ordering between states is never inferred from declaration order.
//!
//! ```text
//! Invitation         : Init ──► Used
//! ConnectionRequest  : RequestSent ──► ResponseReceived
//!                      RequestReceived ──► AckReceived
//! RequestCredential  : Received ──► Issued ──► AckReceived
//! RequestPresentation: Sent ──► PresentationReceived
//!                      Received ──► PresentationSent ──► AckReceived
//! ```

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::domain::errors::AgentError;

/// A closed set of record states with an explicit transition table.
pub trait RecordState: Copy + Eq + Debug + Send + Sync + 'static {
    /// Allowed `(from, to)` pairs.
    const TRANSITIONS: &'static [(Self, Self)];

    fn can_transition(self, to: Self) -> bool {
        Self::TRANSITIONS
            .iter()
            .any(|&(from, target)| from == self && target == to)
    }
}

/// Reject `from -> to` unless the table allows it.
pub fn guard_transition<S: RecordState>(key: &str, from: S, to: S) -> Result<(), AgentError> {
    if from.can_transition(to) {
        Ok(())
    } else {
        Err(AgentError::InvalidStateTransition {
            key: key.to_string(),
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        })
    }
}

/// A persisted record whose lifecycle is governed by a [`RecordState`].
pub trait StatefulRecord {
    type State: RecordState;

    fn state(&self) -> Self::State;
    fn set_state(&mut self, state: Self::State);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationState {
    Init,
    Used,
}

impl RecordState for InvitationState {
    const TRANSITIONS: &'static [(Self, Self)] = &[(Self::Init, Self::Used)];
}

/// Both sides of a handshake keep a request record; which branch of the
/// table applies depends on who created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionRequestState {
    /// Requester side, awaiting the response.
    RequestSent,
    /// Inviter side, awaiting the ACK.
    RequestReceived,
    ResponseReceived,
    AckReceived,
}

impl RecordState for ConnectionRequestState {
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (Self::RequestSent, Self::ResponseReceived),
        (Self::RequestReceived, Self::AckReceived),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCredentialState {
    Received,
    Issued,
    AckReceived,
}

impl RecordState for RequestCredentialState {
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (Self::Received, Self::Issued),
        (Self::Issued, Self::AckReceived),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationState {
    /// Verifier side, awaiting the presentation.
    Sent,
    /// Prover side, before answering.
    Received,
    PresentationSent,
    PresentationReceived,
    AckReceived,
}

impl RecordState for PresentationState {
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (Self::Sent, Self::PresentationReceived),
        (Self::Received, Self::PresentationSent),
        (Self::PresentationSent, Self::AckReceived),
    ];
}
