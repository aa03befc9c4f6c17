//! # Connection Controller
//!
//! Drives the four-message handshake and disconnects.
//!
//! ```text
//!   inviter A                                   requester B
//!   ─────────                                   ───────────
//!   Invitation            (Init)
//!                         ◄── ConnectionRequest  (RequestSent)
//!   (Used, RequestReceived)
//!   ConnectionResponse ──►
//!                                               (ResponseReceived, connection saved)
//!                         ◄── ConnectionAck
//!   (AckReceived, connection saved)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::controllers::{deliver, new_id, probe_key};
use crate::domain::connection::{
    AckStatus, Connection, ConnectionAck, ConnectionRequest, ConnectionResponse,
    DisconnectRequest, Invitation, Thread,
};
use crate::domain::errors::AgentError;
use crate::domain::message::{Message, MessageType};
use crate::domain::records::{
    ConnectionRecord, ConnectionRequestRecord, InvitationRecord, RecordKind,
};
use crate::domain::state::{guard_transition, ConnectionRequestState, InvitationState};
use crate::ports::inbound::{Controller, ControllerParams, ControllerResponse, Reply};
use crate::ports::outbound::OutboundGateway;
use crate::service::repository::RecordStore;

pub const NAME: &str = "connection-controller";

pub struct ConnectionController {
    records: RecordStore,
    gateway: Arc<dyn OutboundGateway>,
    label: RwLock<String>,
}

impl ConnectionController {
    pub fn new(records: RecordStore, gateway: Arc<dyn OutboundGateway>) -> Self {
        Self {
            records,
            gateway,
            label: RwLock::new(String::new()),
        }
    }

    async fn create_invitation(&self, mut invitation: Invitation) -> Result<Reply, AgentError> {
        if invitation.did.is_empty() {
            return Err(AgentError::missing_field(MessageType::Invitation, "did"));
        }
        if invitation.id.is_empty() {
            invitation.id = new_id();
        }
        if invitation.label.is_empty() {
            invitation.label = self.label.read().clone();
        }

        let key = RecordKind::Invitation.key(&invitation.did, &invitation.id);
        let guard = self.records.lock(&key).await;
        self.records.insert_new(
            &guard,
            &InvitationRecord {
                invitation: invitation.clone(),
                state: InvitationState::Init,
            },
        )?;

        info!("[connection] Created invitation {}", key);
        Ok(Reply::Invitation(invitation))
    }

    async fn send_request(&self, mut request: ConnectionRequest) -> Result<Reply, AgentError> {
        let t = MessageType::SendConnectionRequest;
        if request.invitation_id.is_empty() {
            return Err(AgentError::missing_field(t, "invitation_id"));
        }
        if request.connection.my_did.is_empty() || request.connection.their_did.is_empty() {
            return Err(AgentError::missing_field(t, "connection"));
        }
        if request.id.is_empty() {
            request.id = new_id();
        }

        let key = RecordKind::ConnectionReq.key(&request.connection.my_did, &request.id);
        {
            let guard = self.records.lock(&key).await;
            self.records.insert_new(
                &guard,
                &ConnectionRequestRecord {
                    request: request.clone(),
                    state: ConnectionRequestState::RequestSent,
                },
            )?;
        }
        info!("[connection] Sending connection request {}", key);

        let message = Message::ConnectionRequest(request.clone());
        deliver(&self.gateway, message.clone(), request.connection).await?;
        Ok(Reply::Sent(Box::new(message)))
    }

    /// Inviter side.
    async fn receive_request(&self, request: ConnectionRequest) -> Result<(), AgentError> {
        if request.id.is_empty() {
            return Err(AgentError::missing_field(
                MessageType::ConnectionRequest,
                "id",
            ));
        }
        // Inviter's view: my = inviter, their = requester.
        let view = request.connection.reversed();
        let inviter = view.my_did.clone();

        let invitation_key = RecordKind::Invitation.key(&inviter, &request.invitation_id);
        let request_key = RecordKind::ConnectionReq.key(&inviter, &request.id);
        {
            let (invitation_guard, request_guard) = self
                .records
                .lock_pair(&invitation_key, &request_key)
                .await;

            if self.records.contains(&request_key)? {
                return Err(AgentError::AlreadyExists { key: request_key });
            }
            let mut invitation: InvitationRecord = self
                .records
                .load(&invitation_key)?
                .ok_or_else(|| AgentError::ReferenceNotFound {
                    kind: "invitation",
                    id: request.invitation_id.clone(),
                })?;
            guard_transition(&invitation_key, invitation.state, InvitationState::Used)?;
            invitation.state = InvitationState::Used;

            let mut batch = self.records.batch();
            batch.put(
                &request_guard,
                &ConnectionRequestRecord {
                    request: request.clone(),
                    state: ConnectionRequestState::RequestReceived,
                },
            )?;
            batch.put(&invitation_guard, &invitation)?;
            self.records.commit(batch)?;
        }
        info!(
            "[connection] Accepted request {} on invitation {}",
            request_key, invitation_key
        );

        let response = ConnectionResponse {
            id: new_id(),
            thread: Thread::new(request.id),
            connection: view.clone(),
        };
        deliver(&self.gateway, Message::ConnectionResponse(response), view).await
    }

    /// Requester side.
    async fn receive_response(&self, response: ConnectionResponse) -> Result<(), AgentError> {
        // Requester's view: my = requester, their = inviter.
        let view = response.connection.reversed();
        let requester = view.my_did.clone();

        let request_key = RecordKind::ConnectionReq.key(&requester, &response.thread.id);
        let connection_key = RecordKind::Connection.owner_key(&requester);
        {
            let (request_guard, connection_guard) = self
                .records
                .lock_pair(&request_key, &connection_key)
                .await;

            let mut record: ConnectionRequestRecord = self
                .records
                .load(&request_key)?
                .filter(|r: &ConnectionRequestRecord| {
                    r.request.connection.their_did == view.their_did
                })
                .ok_or_else(|| AgentError::ReferenceNotFound {
                    kind: "connection request",
                    id: response.thread.id.clone(),
                })?;
            guard_transition(
                &request_key,
                record.state,
                ConnectionRequestState::ResponseReceived,
            )?;
            record.state = ConnectionRequestState::ResponseReceived;

            let mut connections: ConnectionRecord = self
                .records
                .load(&connection_key)?
                .unwrap_or_else(|| ConnectionRecord::new(&requester));
            connections.save(view.clone());

            let mut batch = self.records.batch();
            batch.put(&request_guard, &record)?;
            batch.put(&connection_guard, &connections)?;
            self.records.commit(batch)?;
        }
        info!(
            "[connection] Connected {} -> {}",
            view.my_did, view.their_did
        );

        let ack = ConnectionAck {
            id: new_id(),
            thread: response.thread,
            status: AckStatus::Succeed,
            connection: view.clone(),
        };
        deliver(&self.gateway, Message::ConnectionAck(ack), view).await
    }

    /// Inviter side.
    async fn receive_ack(&self, ack: ConnectionAck) -> Result<(), AgentError> {
        if ack.status != AckStatus::Succeed {
            warn!("[connection] Failed ACK for thread {}", ack.thread.id);
            return Err(AgentError::FailedAck {
                thread_id: ack.thread.id,
            });
        }
        let inviter = ack.connection.their_did.clone();
        let request_key = RecordKind::ConnectionReq.key(&inviter, &ack.thread.id);
        let connection_key = RecordKind::Connection.owner_key(&inviter);

        let (request_guard, connection_guard) = self
            .records
            .lock_pair(&request_key, &connection_key)
            .await;

        let mut record: ConnectionRequestRecord = self.records.get(&request_key)?;
        if record.request.connection.my_did != ack.connection.my_did {
            return Err(AgentError::ReferenceNotFound {
                kind: "connection request",
                id: ack.thread.id,
            });
        }
        guard_transition(
            &request_key,
            record.state,
            ConnectionRequestState::AckReceived,
        )?;
        record.state = ConnectionRequestState::AckReceived;

        // The stored request is authoritative for the requester's side.
        let connection = record.request.connection.reversed();
        let mut connections: ConnectionRecord = self
            .records
            .load(&connection_key)?
            .unwrap_or_else(|| ConnectionRecord::new(&inviter));
        connections.save(connection.clone());

        let mut batch = self.records.batch();
        batch.put(&request_guard, &record)?;
        batch.put(&connection_guard, &connections)?;
        self.records.commit(batch)?;

        info!(
            "[connection] Connected {} -> {}",
            connection.my_did, connection.their_did
        );
        Ok(())
    }

    async fn send_disconnect(&self, request: DisconnectRequest) -> Result<Reply, AgentError> {
        let connection = self
            .remove_connection(&request.connection.my_did, &request.connection.their_did)
            .await?;
        let message = Message::Disconnect(DisconnectRequest {
            connection: connection.clone(),
        });
        deliver(&self.gateway, message.clone(), connection).await?;
        Ok(Reply::Sent(Box::new(message)))
    }

    async fn receive_disconnect(&self, request: DisconnectRequest) -> Result<(), AgentError> {
        self.remove_connection(&request.connection.their_did, &request.connection.my_did)
            .await?;
        Ok(())
    }

    /// Drop `owner`'s entry for `peer`, deleting the record once empty.
    async fn remove_connection(&self, owner: &str, peer: &str) -> Result<Connection, AgentError> {
        let key = RecordKind::Connection.owner_key(owner);
        let guard = self.records.lock(&key).await;

        let mut record: ConnectionRecord = self.records.get(&key)?;
        let removed = record
            .connections
            .remove(peer)
            .ok_or_else(|| AgentError::NotFound {
                key: format!("{}#{}", key, peer),
            })?;

        if record.connections.is_empty() {
            self.records.remove(&guard)?;
        } else {
            self.records.save(&guard, &record)?;
        }
        info!("[connection] Disconnected {} -> {}", owner, peer);
        Ok(removed)
    }
}

#[async_trait]
impl Controller for ConnectionController {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handles(&self, message_type: MessageType) -> bool {
        matches!(
            message_type,
            MessageType::Invitation
                | MessageType::SendConnectionRequest
                | MessageType::ConnectionRequest
                | MessageType::ConnectionResponse
                | MessageType::ConnectionAck
                | MessageType::SendDisconnect
                | MessageType::Disconnect
        )
    }

    async fn initiate(&self, params: &ControllerParams) -> Result<(), AgentError> {
        *self.label.write() = params.agent_label.clone();
        self.records
            .probe(&probe_key(NAME))
            .map_err(|e| AgentError::Initiate {
                controller: NAME,
                reason: e.to_string(),
            })
    }

    async fn process(&self, message: Message) -> Result<ControllerResponse, AgentError> {
        let response = match message {
            Message::Invitation(invitation) => {
                ControllerResponse::Reply(self.create_invitation(invitation).await?)
            }
            Message::SendConnectionRequest(request) => {
                ControllerResponse::Reply(self.send_request(request).await?)
            }
            Message::ConnectionRequest(request) => {
                self.receive_request(request).await?;
                ControllerResponse::Done
            }
            Message::ConnectionResponse(response) => {
                self.receive_response(response).await?;
                ControllerResponse::Done
            }
            Message::ConnectionAck(ack) => {
                self.receive_ack(ack).await?;
                ControllerResponse::Done
            }
            Message::SendDisconnect(request) => {
                ControllerResponse::Reply(self.send_disconnect(request).await?)
            }
            Message::Disconnect(request) => {
                self.receive_disconnect(request).await?;
                ControllerResponse::Done
            }
            other => ControllerResponse::Skip(other),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingGateway, TestAgent};

    fn invitation(id: &str) -> Message {
        Message::Invitation(Invitation {
            id: id.to_string(),
            did: "did:example:alice".to_string(),
            service_id: "router".to_string(),
            label: String::new(),
        })
    }

    #[tokio::test]
    async fn test_invitation_id_and_label_are_stamped() {
        let agent = TestAgent::new("alice-agent").await;
        let reply = agent.serve(invitation("")).await.unwrap();
        match reply {
            Some(Reply::Invitation(inv)) => {
                assert!(!inv.id.is_empty());
                assert_eq!(inv.label, "alice-agent");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_invitation_rejected() {
        let agent = TestAgent::new("alice").await;
        agent.serve(invitation("inv-1")).await.unwrap();

        let mut duplicate = invitation("inv-1");
        if let Message::Invitation(inner) = &mut duplicate {
            inner.label = "impostor".to_string();
        }
        let err = agent.serve(duplicate).await.unwrap_err();
        assert!(matches!(err, AgentError::AlreadyExists { .. }));

        let stored: InvitationRecord = agent
            .records
            .get(&RecordKind::Invitation.key("did:example:alice", "inv-1"))
            .unwrap();
        assert_eq!(stored.invitation.label, "alice");
        assert_eq!(stored.state, InvitationState::Init);
    }

    #[tokio::test]
    async fn test_request_for_unknown_invitation() {
        let agent = TestAgent::new("alice").await;
        let err = agent
            .serve(Message::ConnectionRequest(ConnectionRequest {
                id: "req-1".to_string(),
                invitation_id: "missing".to_string(),
                connection: Connection {
                    my_did: "did:example:bob".to_string(),
                    their_did: "did:example:alice".to_string(),
                    ..Default::default()
                },
            }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::ReferenceNotFound {
                kind: "invitation",
                ..
            }
        ));
        assert!(agent.gateway.take().is_empty());
    }

    #[tokio::test]
    async fn test_response_without_request_rejected() {
        let agent = TestAgent::new("bob").await;
        let err = agent
            .serve(Message::ConnectionResponse(ConnectionResponse {
                id: "resp-1".to_string(),
                thread: Thread::new("never-sent"),
                connection: Connection {
                    my_did: "did:example:alice".to_string(),
                    their_did: "did:example:bob".to_string(),
                    ..Default::default()
                },
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ReferenceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_send_request_persists_before_delivery_failure() {
        let agent = TestAgent::with_gateway("bob", RecordingGateway::failing()).await;
        let err = agent
            .serve(Message::SendConnectionRequest(ConnectionRequest {
                id: "req-1".to_string(),
                invitation_id: "inv-1".to_string(),
                connection: Connection {
                    my_did: "did:example:bob".to_string(),
                    their_did: "did:example:alice".to_string(),
                    ..Default::default()
                },
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::RemoteDeliveryFailed { .. }));

        let record: ConnectionRequestRecord = agent
            .records
            .get("ConnectionReq_did:example:bob_req-1")
            .unwrap();
        assert_eq!(record.state, ConnectionRequestState::RequestSent);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_connection() {
        let agent = TestAgent::new("alice").await;
        let err = agent
            .serve(Message::SendDisconnect(DisconnectRequest {
                connection: Connection {
                    my_did: "did:example:alice".to_string(),
                    their_did: "did:example:bob".to_string(),
                    ..Default::default()
                },
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotFound { .. }));
    }
}
