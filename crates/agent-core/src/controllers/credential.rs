//! # Credential Controller
//!
//! Holder H, issuer I:
//!
//! ```text
//!   H ── ProposalCredential ──► I      (offer stored at OfferCredential_<I>_<id>)
//!   H ◄── OfferCredential ───── I      (stored at OfferCredential_<H>_<id>)
//!   H ── RequestCredential ───► I      (Received → Issued)
//!   H ◄── IssueCredential ───── I      (stored at Credential_<H>_<id>)
//!   H ── CredentialAck ───────► I      (Issued → AckReceived)
//! ```
//!
//! Every step except the local `Send*` calls requires the receiving DID to
//! already hold a connection with the sender.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::controllers::{deliver, new_id, probe_key, require_connection};
use crate::domain::connection::{AckStatus, Connection, GeneralAck, Thread};
use crate::domain::credential::{
    CredentialPayload, CredentialQuery, IssueCredential, OfferCredential, ProposalCredential,
    RequestCredential,
};
use crate::domain::errors::AgentError;
use crate::domain::message::{Message, MessageType};
use crate::domain::records::{CredentialRecord, RecordKind, RequestCredentialRecord};
use crate::domain::state::RequestCredentialState;
use crate::ports::inbound::{Controller, ControllerParams, ControllerResponse, Reply};
use crate::ports::outbound::OutboundGateway;
use crate::service::repository::RecordStore;

pub const NAME: &str = "credential-controller";

pub struct CredentialController {
    records: RecordStore,
    gateway: Arc<dyn OutboundGateway>,
}

impl CredentialController {
    pub fn new(records: RecordStore, gateway: Arc<dyn OutboundGateway>) -> Self {
        Self { records, gateway }
    }

    /// The receiver's stored connection for a payload carrying the sender's view.
    fn inbound_connection(&self, sender_view: &Connection) -> Result<Connection, AgentError> {
        require_connection(&self.records, &sender_view.their_did, &sender_view.my_did)
    }

    async fn send_proposal(&self, mut proposal: ProposalCredential) -> Result<Reply, AgentError> {
        let connection = require_connection(
            &self.records,
            &proposal.connection.my_did,
            &proposal.connection.their_did,
        )?;
        if proposal.id.is_empty() {
            proposal.id = new_id();
        }
        proposal.connection = connection.clone();

        let message = Message::ProposalCredential(proposal);
        deliver(&self.gateway, message.clone(), connection).await?;
        Ok(Reply::Sent(Box::new(message)))
    }

    /// Issuer side: answer a proposal with an offer.
    async fn receive_proposal(&self, proposal: ProposalCredential) -> Result<(), AgentError> {
        let connection = self.inbound_connection(&proposal.connection)?;
        let offer = OfferCredential {
            id: new_id(),
            thread: Thread::new(proposal.id),
            connection: connection.clone(),
            comment: proposal.comment,
            credential_preview: proposal.credential_proposal,
        };

        let key = RecordKind::OfferCredential.key(&connection.my_did, &offer.id);
        {
            let guard = self.records.lock(&key).await;
            self.records.insert_new(&guard, &offer)?;
        }
        info!("[credential] Offered {}", key);

        deliver(&self.gateway, Message::OfferCredential(offer), connection).await
    }

    /// Holder side.
    async fn receive_offer(&self, offer: OfferCredential) -> Result<(), AgentError> {
        let connection = self.inbound_connection(&offer.connection)?;
        let key = RecordKind::OfferCredential.key(&connection.my_did, &offer.id);
        let guard = self.records.lock(&key).await;
        self.records.insert_new(&guard, &offer)?;
        info!("[credential] Stored offer {}", key);
        Ok(())
    }

    async fn send_request(&self, mut request: RequestCredential) -> Result<Reply, AgentError> {
        let connection = require_connection(
            &self.records,
            &request.connection.my_did,
            &request.connection.their_did,
        )?;
        if !request.thread.id.is_empty() {
            let offer_key = RecordKind::OfferCredential.key(&connection.my_did, &request.thread.id);
            if !self.records.contains(&offer_key)? {
                return Err(AgentError::ReferenceNotFound {
                    kind: "credential offer",
                    id: request.thread.id,
                });
            }
        }
        if request.id.is_empty() {
            request.id = new_id();
        }
        request.connection = connection.clone();

        let message = Message::RequestCredential(request);
        deliver(&self.gateway, message.clone(), connection).await?;
        Ok(Reply::Sent(Box::new(message)))
    }

    /// Issuer side: record the request, issue, mark it issued.
    async fn receive_request(&self, request: RequestCredential) -> Result<(), AgentError> {
        if request.id.is_empty() {
            return Err(AgentError::missing_field(
                MessageType::RequestCredential,
                "id",
            ));
        }
        let connection = self.inbound_connection(&request.connection)?;
        let issuer = connection.my_did.clone();
        let holder = connection.their_did.clone();

        let issue = IssueCredential {
            id: new_id(),
            thread: Thread::new(request.id.clone()),
            connection: connection.clone(),
            comment: request.comment.clone(),
            credential: CredentialPayload {
                issuer_did: issuer.clone(),
                subject_did: holder.clone(),
                attributes: request.credential_preview.attributes.clone(),
                issued_at: Utc::now(),
            },
        };

        let key = RecordKind::RequestCredential.key(&issuer, &request.id);
        {
            let guard = self.records.lock(&key).await;
            self.records.insert_new(
                &guard,
                &RequestCredentialRecord {
                    requester_did: holder,
                    request_credential: request,
                    state: RequestCredentialState::Received,
                },
            )?;
            self.records
                .advance::<RequestCredentialRecord>(&guard, RequestCredentialState::Issued)?;
        }
        info!("[credential] Issued credential {} for {}", issue.id, key);

        deliver(&self.gateway, Message::IssueCredential(issue), connection).await
    }

    /// Holder side: store and acknowledge.
    async fn receive_issue(&self, issue: IssueCredential) -> Result<(), AgentError> {
        let connection = self.inbound_connection(&issue.connection)?;
        let key = RecordKind::Credential.key(&connection.my_did, &issue.id);
        let thread = issue.thread.clone();
        {
            let guard = self.records.lock(&key).await;
            self.records.insert_new(
                &guard,
                &CredentialRecord {
                    owner_did: connection.my_did.clone(),
                    credential: issue,
                    timestamp: Utc::now(),
                },
            )?;
        }
        info!("[credential] Stored credential {}", key);

        let ack = GeneralAck {
            id: new_id(),
            thread,
            status: AckStatus::Succeed,
            connection: connection.clone(),
        };
        deliver(&self.gateway, Message::CredentialAck(ack), connection).await
    }

    /// Issuer side.
    async fn receive_ack(&self, ack: GeneralAck) -> Result<(), AgentError> {
        self.inbound_connection(&ack.connection)?;
        if ack.status != AckStatus::Succeed {
            warn!("[credential] Failed ACK for thread {}", ack.thread.id);
            return Err(AgentError::FailedAck {
                thread_id: ack.thread.id,
            });
        }
        let key = RecordKind::RequestCredential.key(&ack.connection.their_did, &ack.thread.id);
        let guard = self.records.lock(&key).await;
        let record: RequestCredentialRecord = self.records.get(&key)?;
        if record.requester_did != ack.connection.my_did {
            warn!(
                "[credential] ACK for {} from {} who did not request it",
                key, ack.connection.my_did
            );
            return Err(AgentError::ReferenceNotFound {
                kind: "credential request",
                id: ack.thread.id,
            });
        }
        self.records
            .advance::<RequestCredentialRecord>(&guard, RequestCredentialState::AckReceived)?;
        info!("[credential] Exchange {} acknowledged", key);
        Ok(())
    }

    fn query(&self, query: CredentialQuery) -> Result<Reply, AgentError> {
        if query.did.is_empty() {
            return Err(AgentError::missing_field(
                MessageType::QueryCredential,
                "did",
            ));
        }
        if query.id.is_empty() {
            // The prefix also matches DIDs that extend this one with `_`.
            let credentials: Vec<CredentialRecord> = self
                .records
                .scan::<CredentialRecord>(&RecordKind::Credential.scan_prefix(&query.did))?
                .into_iter()
                .filter(|record| record.owner_did == query.did)
                .collect();
            return Ok(Reply::Credentials(credentials));
        }
        let record: CredentialRecord = self
            .records
            .get(&RecordKind::Credential.key(&query.did, &query.id))?;
        Ok(Reply::Credential(Box::new(record)))
    }

    async fn delete(&self, query: CredentialQuery) -> Result<(), AgentError> {
        let credential_key = RecordKind::Credential.key(&query.did, &query.id);
        let request_key = RecordKind::RequestCredential.key(&query.did, &query.id);
        let (credential_guard, request_guard) = self
            .records
            .lock_pair(&credential_key, &request_key)
            .await;

        let mut batch = self.records.batch();
        if self.records.contains(&credential_key)? {
            batch.delete(&credential_guard);
        }
        if self.records.contains(&request_key)? {
            batch.delete(&request_guard);
        }
        if batch.is_empty() {
            return Err(AgentError::NotFound {
                key: credential_key,
            });
        }
        self.records.commit(batch)?;
        info!("[credential] Deleted {} for {}", query.id, query.did);
        Ok(())
    }
}

#[async_trait]
impl Controller for CredentialController {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handles(&self, message_type: MessageType) -> bool {
        matches!(
            message_type,
            MessageType::SendProposalCredential
                | MessageType::ProposalCredential
                | MessageType::OfferCredential
                | MessageType::SendRequestCredential
                | MessageType::RequestCredential
                | MessageType::IssueCredential
                | MessageType::CredentialAck
                | MessageType::QueryCredential
                | MessageType::DeleteCredential
        )
    }

    async fn initiate(&self, _params: &ControllerParams) -> Result<(), AgentError> {
        self.records
            .probe(&probe_key(NAME))
            .map_err(|e| AgentError::Initiate {
                controller: NAME,
                reason: e.to_string(),
            })
    }

    async fn process(&self, message: Message) -> Result<ControllerResponse, AgentError> {
        let response = match message {
            Message::SendProposalCredential(proposal) => {
                ControllerResponse::Reply(self.send_proposal(proposal).await?)
            }
            Message::ProposalCredential(proposal) => {
                self.receive_proposal(proposal).await?;
                ControllerResponse::Done
            }
            Message::OfferCredential(offer) => {
                self.receive_offer(offer).await?;
                ControllerResponse::Done
            }
            Message::SendRequestCredential(request) => {
                ControllerResponse::Reply(self.send_request(request).await?)
            }
            Message::RequestCredential(request) => {
                self.receive_request(request).await?;
                ControllerResponse::Done
            }
            Message::IssueCredential(issue) => {
                self.receive_issue(issue).await?;
                ControllerResponse::Done
            }
            Message::CredentialAck(ack) => {
                self.receive_ack(ack).await?;
                ControllerResponse::Done
            }
            Message::QueryCredential(query) => ControllerResponse::Reply(self.query(query)?),
            Message::DeleteCredential(query) => {
                self.delete(query).await?;
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
    use crate::domain::credential::CredentialAttribute;
    use crate::domain::records::ConnectionRecord;
    use crate::test_utils::TestAgent;

    const HOLDER: &str = "did:example:holder";
    const ISSUER: &str = "did:example:issuer";

    async fn agent_connected(me: &str, peer: &str) -> TestAgent {
        let agent = TestAgent::new(me).await;
        let mut record = ConnectionRecord::new(me);
        record.save(Connection {
            my_did: me.to_string(),
            their_did: peer.to_string(),
            ..Default::default()
        });
        let guard = agent.records.lock(&RecordKind::Connection.owner_key(me)).await;
        agent.records.save(&guard, &record).unwrap();
        agent
    }

    fn holder_view() -> Connection {
        Connection {
            my_did: HOLDER.to_string(),
            their_did: ISSUER.to_string(),
            ..Default::default()
        }
    }

    fn request(id: &str) -> RequestCredential {
        RequestCredential {
            id: id.to_string(),
            connection: holder_view(),
            credential_preview: crate::domain::credential::CredentialPreview {
                attributes: vec![CredentialAttribute::new("degree", "BSc")],
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_request_is_issued_and_marked() {
        let issuer = agent_connected(ISSUER, HOLDER).await;
        issuer
            .serve(Message::RequestCredential(request("req-1")))
            .await
            .unwrap();

        let record: RequestCredentialRecord = issuer
            .records
            .get(&RecordKind::RequestCredential.key(ISSUER, "req-1"))
            .unwrap();
        assert_eq!(record.state, RequestCredentialState::Issued);
        assert_eq!(record.requester_did, HOLDER);

        let sent = issuer.gateway.take();
        match &sent[0].message {
            Message::IssueCredential(issue) => {
                assert_eq!(issue.thread.id, "req-1");
                assert_eq!(issue.credential.subject_did, HOLDER);
                assert_eq!(issue.credential.attributes.len(), 1);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_without_connection() {
        let issuer = TestAgent::new(ISSUER).await;
        let err = issuer
            .serve(Message::RequestCredential(request("req-1")))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ReferenceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_failed_ack_leaves_request_issued() {
        let issuer = agent_connected(ISSUER, HOLDER).await;
        issuer
            .serve(Message::RequestCredential(request("req-1")))
            .await
            .unwrap();

        let err = issuer
            .serve(Message::CredentialAck(GeneralAck {
                id: "ack-1".to_string(),
                thread: Thread::new("req-1"),
                status: AckStatus::Failed,
                connection: holder_view(),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::FailedAck { .. }));

        let record: RequestCredentialRecord = issuer
            .records
            .get(&RecordKind::RequestCredential.key(ISSUER, "req-1"))
            .unwrap();
        assert_eq!(record.state, RequestCredentialState::Issued);
    }

    #[tokio::test]
    async fn test_ack_from_stranger_rejected() {
        const MALLORY: &str = "did:example:mallory";
        let issuer = agent_connected(ISSUER, HOLDER).await;
        issuer
            .serve(Message::RequestCredential(request("req-1")))
            .await
            .unwrap();
        let ack_from = |sender: &str| {
            Message::CredentialAck(GeneralAck {
                id: "ack-1".to_string(),
                thread: Thread::new("req-1"),
                status: AckStatus::Succeed,
                connection: Connection {
                    my_did: sender.to_string(),
                    their_did: ISSUER.to_string(),
                    ..Default::default()
                },
            })
        };
        let key = RecordKind::RequestCredential.key(ISSUER, "req-1");

        // No connection with the issuer.
        let err = issuer.serve(ack_from(MALLORY)).await.unwrap_err();
        assert!(matches!(err, AgentError::ReferenceNotFound { .. }));

        // Connected, but not the requester.
        let owner_key = RecordKind::Connection.owner_key(ISSUER);
        let mut connections: ConnectionRecord = issuer.records.get(&owner_key).unwrap();
        connections.save(Connection {
            my_did: ISSUER.to_string(),
            their_did: MALLORY.to_string(),
            ..Default::default()
        });
        {
            let guard = issuer.records.lock(&owner_key).await;
            issuer.records.save(&guard, &connections).unwrap();
        }
        let err = issuer.serve(ack_from(MALLORY)).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::ReferenceNotFound {
                kind: "credential request",
                ..
            }
        ));

        let record: RequestCredentialRecord = issuer.records.get(&key).unwrap();
        assert_eq!(record.state, RequestCredentialState::Issued);

        issuer.serve(ack_from(HOLDER)).await.unwrap();
        let record: RequestCredentialRecord = issuer.records.get(&key).unwrap();
        assert_eq!(record.state, RequestCredentialState::AckReceived);
    }

    #[tokio::test]
    async fn test_list_skips_owners_sharing_the_prefix() {
        let holder = TestAgent::new(HOLDER).await;
        let lookalike = format!("{}_evil", HOLDER);
        for (owner, id) in [(HOLDER, "c1"), (lookalike.as_str(), "c2")] {
            let key = RecordKind::Credential.key(owner, id);
            let guard = holder.records.lock(&key).await;
            holder
                .records
                .insert_new(
                    &guard,
                    &CredentialRecord {
                        owner_did: owner.to_string(),
                        credential: IssueCredential {
                            id: id.to_string(),
                            thread: Thread::new("req"),
                            connection: holder_view().reversed(),
                            comment: String::new(),
                            credential: CredentialPayload {
                                issuer_did: ISSUER.to_string(),
                                subject_did: owner.to_string(),
                                attributes: Vec::new(),
                                issued_at: Utc::now(),
                            },
                        },
                        timestamp: Utc::now(),
                    },
                )
                .unwrap();
        }

        let reply = holder
            .serve(Message::QueryCredential(CredentialQuery {
                did: HOLDER.to_string(),
                id: String::new(),
            }))
            .await
            .unwrap();
        match reply {
            Some(Reply::Credentials(listed)) => {
                assert_eq!(listed.len(), 1);
                assert_eq!(listed[0].owner_did, HOLDER);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_request_for_unknown_offer() {
        let holder = agent_connected(HOLDER, ISSUER).await;
        let mut req = request("");
        req.thread = Thread::new("offer-that-never-came");
        let err = holder
            .serve(Message::SendRequestCredential(req))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::ReferenceNotFound {
                kind: "credential offer",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_nothing_is_not_found() {
        let holder = TestAgent::new(HOLDER).await;
        let err = holder
            .serve(Message::DeleteCredential(CredentialQuery {
                did: HOLDER.to_string(),
                id: "missing".to_string(),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotFound { .. }));
    }
}
