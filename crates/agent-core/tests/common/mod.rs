//! Shared helpers for agent-core integration tests.

#![allow(dead_code)]

use agent_core::domain::connection::{Connection, ConnectionRequest, Invitation};
use agent_core::test_utils::TestAgent;
use agent_core::Message;

pub const ALICE: &str = "did:example:alice";
pub const BOB: &str = "did:example:bob";

/// Bob's view of the relationship.
pub fn bob_view() -> Connection {
    Connection {
        my_did: BOB.to_string(),
        my_service_id: "router".to_string(),
        their_did: ALICE.to_string(),
        their_service_id: "router".to_string(),
    }
}

pub fn invitation(id: &str) -> Message {
    Message::Invitation(Invitation {
        id: id.to_string(),
        did: ALICE.to_string(),
        service_id: "router".to_string(),
        label: "alice".to_string(),
    })
}

pub fn send_request(id: &str, invitation_id: &str) -> Message {
    Message::SendConnectionRequest(ConnectionRequest {
        id: id.to_string(),
        invitation_id: invitation_id.to_string(),
        connection: bob_view(),
    })
}

/// Alice invites, Bob requests; stops with Alice's response still queued
/// in Alice's gateway.
pub async fn up_to_response(alice: &TestAgent, bob: &TestAgent) {
    alice.serve(invitation("inv-1")).await.unwrap();
    bob.serve(send_request("req-1", "inv-1")).await.unwrap();
    for result in bob.flush_to(alice).await {
        result.unwrap();
    }
}

/// Full handshake; both sides end up connected.
pub async fn connect(alice: &TestAgent, bob: &TestAgent) {
    up_to_response(alice, bob).await;
    for result in alice.flush_to(bob).await {
        result.unwrap();
    }
    for result in bob.flush_to(alice).await {
        result.unwrap();
    }
}
