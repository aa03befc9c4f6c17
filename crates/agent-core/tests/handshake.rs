//! # Connection Handshake Integration Tests
//!
//! Two agents, each with its own store, exchange messages by draining one
//! agent's recording gateway into the other's dispatcher.

mod common;

use std::sync::Arc;

use agent_core::domain::connection::{AckStatus, Connection, ConnectionAck, DisconnectRequest};
use agent_core::domain::records::{
    ConnectionRecord, ConnectionRequestRecord, InvitationRecord, RecordKind,
};
use agent_core::domain::state::{ConnectionRequestState, InvitationState};
use agent_core::test_utils::TestAgent;
use agent_core::{AgentError, Message};

use common::{bob_view, connect, invitation, send_request, up_to_response, ALICE, BOB};

fn connection_of(agent: &TestAgent, owner: &str, peer: &str) -> Option<Connection> {
    agent
        .records
        .load::<ConnectionRecord>(&RecordKind::Connection.owner_key(owner))
        .unwrap()
        .and_then(|r| r.get(peer).cloned())
}

/// Take the ACK Bob queued after the response, without delivering it.
async fn pending_ack(alice: &TestAgent, bob: &TestAgent) -> Message {
    up_to_response(alice, bob).await;
    for result in alice.flush_to(bob).await {
        result.unwrap();
    }
    let mut sent = bob.gateway.take();
    assert_eq!(sent.len(), 1);
    sent.remove(0).message
}

#[tokio::test]
async fn test_handshake_yields_symmetric_connections() {
    let alice = TestAgent::new("alice").await;
    let bob = TestAgent::new("bob").await;

    connect(&alice, &bob).await;

    let alice_side = connection_of(&alice, ALICE, BOB).expect("alice connected");
    let bob_side = connection_of(&bob, BOB, ALICE).expect("bob connected");
    assert_eq!(alice_side, bob_side.reversed());
    assert_eq!(bob_side, bob_view());

    let invitation: InvitationRecord = alice
        .records
        .get(&RecordKind::Invitation.key(ALICE, "inv-1"))
        .unwrap();
    assert_eq!(invitation.state, InvitationState::Used);

    let inviter_request: ConnectionRequestRecord = alice
        .records
        .get(&RecordKind::ConnectionReq.key(ALICE, "req-1"))
        .unwrap();
    assert_eq!(inviter_request.state, ConnectionRequestState::AckReceived);

    let requester_request: ConnectionRequestRecord = bob
        .records
        .get(&RecordKind::ConnectionReq.key(BOB, "req-1"))
        .unwrap();
    assert_eq!(
        requester_request.state,
        ConnectionRequestState::ResponseReceived
    );
}

#[tokio::test]
async fn test_response_threads_the_request_id() {
    let alice = TestAgent::new("alice").await;
    let bob = TestAgent::new("bob").await;
    up_to_response(&alice, &bob).await;

    let sent = alice.gateway.take();
    match &sent[0].message {
        Message::ConnectionResponse(response) => {
            assert_eq!(response.thread.id, "req-1");
            assert_eq!(response.connection.my_did, ALICE);
            assert_eq!(response.connection.their_did, BOB);
        }
        other => panic!("Expected ConnectionResponse, got {:?}", other),
    }
    assert_eq!(sent[0].connection.their_did, BOB);
}

#[tokio::test]
async fn test_replayed_request_rejected() {
    let alice = TestAgent::new("alice").await;
    let bob = TestAgent::new("bob").await;
    alice.serve(invitation("inv-1")).await.unwrap();
    bob.serve(send_request("req-1", "inv-1")).await.unwrap();

    let request = bob.gateway.take().remove(0).message;
    alice.serve(request.clone()).await.unwrap();

    let err = alice.serve(request).await.unwrap_err();
    assert!(matches!(err, AgentError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_invitation_is_single_use() {
    let alice = TestAgent::new("alice").await;
    let bob = TestAgent::new("bob").await;
    up_to_response(&alice, &bob).await;

    bob.serve(send_request("req-2", "inv-1")).await.unwrap();
    let results = bob.flush_to(&alice).await;
    assert!(matches!(
        results[0],
        Err(AgentError::InvalidStateTransition { .. })
    ));
    assert!(!alice
        .records
        .contains(&RecordKind::ConnectionReq.key(ALICE, "req-2"))
        .unwrap());
}

#[tokio::test]
async fn test_failed_ack_changes_nothing() {
    let alice = TestAgent::new("alice").await;
    let bob = TestAgent::new("bob").await;
    let ack = match pending_ack(&alice, &bob).await {
        Message::ConnectionAck(ack) => ack,
        other => panic!("Expected ConnectionAck, got {:?}", other),
    };

    let failed = Message::ConnectionAck(ConnectionAck {
        status: AckStatus::Failed,
        ..ack
    });
    let err = alice.serve(failed).await.unwrap_err();
    assert!(matches!(err, AgentError::FailedAck { .. }));

    let request: ConnectionRequestRecord = alice
        .records
        .get(&RecordKind::ConnectionReq.key(ALICE, "req-1"))
        .unwrap();
    assert_eq!(request.state, ConnectionRequestState::RequestReceived);
    assert!(connection_of(&alice, ALICE, BOB).is_none());
}

#[tokio::test]
async fn test_duplicate_ack_rejected() {
    let alice = TestAgent::new("alice").await;
    let bob = TestAgent::new("bob").await;
    let ack = pending_ack(&alice, &bob).await;

    alice.serve(ack.clone()).await.unwrap();
    let err = alice.serve(ack).await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidStateTransition { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_acks_apply_once() {
    let alice = Arc::new(TestAgent::new("alice").await);
    let bob = TestAgent::new("bob").await;
    let ack = pending_ack(&alice, &bob).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let alice = Arc::clone(&alice);
        let ack = ack.clone();
        handles.push(tokio::spawn(async move { alice.serve(ack).await }));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(AgentError::InvalidStateTransition { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn test_disconnect_removes_both_sides() {
    let alice = TestAgent::new("alice").await;
    let bob = TestAgent::new("bob").await;
    connect(&alice, &bob).await;

    let disconnect = Message::SendDisconnect(DisconnectRequest {
        connection: bob_view(),
    });
    bob.serve(disconnect.clone()).await.unwrap();
    let mut sent = bob.gateway.take();
    assert_eq!(sent.len(), 1);
    let received = sent.remove(0).message;
    assert!(matches!(received, Message::Disconnect(_)));
    alice.serve(received.clone()).await.unwrap();

    assert!(!bob
        .records
        .contains(&RecordKind::Connection.owner_key(BOB))
        .unwrap());
    assert!(connection_of(&alice, ALICE, BOB).is_none());

    let err = bob.serve(disconnect).await.unwrap_err();
    assert!(matches!(err, AgentError::NotFound { .. }));

    let err = alice.serve(received).await.unwrap_err();
    assert!(matches!(err, AgentError::NotFound { .. }));
}
