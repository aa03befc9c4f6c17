//! # Presentation Controller
//!
//! Verifier V asks prover P to present credentials P holds:
//!
//! ```text
//!   V ── RequestPresentation ──► P     V: Sent          P: Received → PresentationSent
//!   V ◄── Presentation ───────── P     V: PresentationReceived (+ PresentationRecord)
//!   V ── PresentationAck ──────► P     P: AckReceived
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::controllers::{deliver, new_id, probe_key, require_connection};
use crate::domain::connection::{AckStatus, GeneralAck, Thread};
use crate::domain::credential::CredentialPayload;
use crate::domain::errors::AgentError;
use crate::domain::message::{Message, MessageType};
use crate::domain::presentation::{Presentation, PresentationQuery, RequestPresentation};
use crate::domain::records::{
    CredentialRecord, PresentationRecord, RecordKind, RequestPresentationRecord,
};
use crate::domain::state::{guard_transition, PresentationState};
use crate::ports::inbound::{Controller, ControllerParams, ControllerResponse, Reply};
use crate::ports::outbound::OutboundGateway;
use crate::service::repository::RecordStore;

pub const NAME: &str = "presentation-controller";

pub struct PresentationController {
    records: RecordStore,
    gateway: Arc<dyn OutboundGateway>,
}

impl PresentationController {
    pub fn new(records: RecordStore, gateway: Arc<dyn OutboundGateway>) -> Self {
        Self { records, gateway }
    }

    async fn send_request(&self, mut request: RequestPresentation) -> Result<Reply, AgentError> {
        let connection = require_connection(
            &self.records,
            &request.connection.my_did,
            &request.connection.their_did,
        )?;
        if request.id.is_empty() {
            request.id = new_id();
        }
        request.connection = connection.clone();

        let key = RecordKind::RequestPresentation.key(&connection.my_did, &request.id);
        {
            let guard = self.records.lock(&key).await;
            self.records.insert_new(
                &guard,
                &RequestPresentationRecord {
                    request: request.clone(),
                    state: PresentationState::Sent,
                },
            )?;
        }
        info!("[presentation] Requested presentation {}", key);

        let message = Message::RequestPresentation(request);
        deliver(&self.gateway, message.clone(), connection).await?;
        Ok(Reply::Sent(Box::new(message)))
    }

    /// Prover side: gather the credentials, then record and answer.
    async fn receive_request(&self, request: RequestPresentation) -> Result<(), AgentError> {
        if request.id.is_empty() {
            return Err(AgentError::missing_field(
                MessageType::RequestPresentation,
                "id",
            ));
        }
        let connection = require_connection(
            &self.records,
            &request.connection.their_did,
            &request.connection.my_did,
        )?;
        let prover = connection.my_did.clone();

        let credentials = request
            .credential_ids
            .iter()
            .map(|id| {
                self.records
                    .load::<CredentialRecord>(&RecordKind::Credential.key(&prover, id))?
                    .map(|record| record.credential.credential)
                    .ok_or_else(|| AgentError::ReferenceNotFound {
                        kind: "credential",
                        id: id.clone(),
                    })
            })
            .collect::<Result<Vec<CredentialPayload>, AgentError>>()?;

        let presentation = Presentation {
            id: new_id(),
            thread: Thread::new(request.id.clone()),
            connection: connection.clone(),
            credentials,
        };

        let key = RecordKind::RequestPresentation.key(&prover, &request.id);
        {
            let guard = self.records.lock(&key).await;
            self.records.insert_new(
                &guard,
                &RequestPresentationRecord {
                    request,
                    state: PresentationState::Received,
                },
            )?;
            self.records
                .advance::<RequestPresentationRecord>(&guard, PresentationState::PresentationSent)?;
        }
        info!(
            "[presentation] Presenting {} credentials for {}",
            presentation.credentials.len(),
            key
        );

        deliver(&self.gateway, Message::Presentation(presentation), connection).await
    }

    /// Verifier side.
    async fn receive_presentation(&self, presentation: Presentation) -> Result<(), AgentError> {
        let connection = require_connection(
            &self.records,
            &presentation.connection.their_did,
            &presentation.connection.my_did,
        )?;
        let verifier = connection.my_did.clone();
        let request_key = RecordKind::RequestPresentation.key(&verifier, &presentation.thread.id);
        let presentation_key = RecordKind::Presentation.key(&verifier, &presentation.id);
        let thread = presentation.thread.clone();
        {
            let (request_guard, presentation_guard) = self
                .records
                .lock_pair(&request_key, &presentation_key)
                .await;

            if self.records.contains(&presentation_key)? {
                return Err(AgentError::AlreadyExists {
                    key: presentation_key,
                });
            }
            let mut record: RequestPresentationRecord = self
                .records
                .load(&request_key)?
                .ok_or_else(|| AgentError::ReferenceNotFound {
                    kind: "presentation request",
                    id: thread.id.clone(),
                })?;
            guard_transition(
                &request_key,
                record.state,
                PresentationState::PresentationReceived,
            )?;
            record.state = PresentationState::PresentationReceived;

            let mut batch = self.records.batch();
            batch.put(&request_guard, &record)?;
            batch.put(
                &presentation_guard,
                &PresentationRecord {
                    owner_did: verifier,
                    presentation,
                    timestamp: Utc::now(),
                },
            )?;
            self.records.commit(batch)?;
        }
        info!("[presentation] Received presentation {}", presentation_key);

        let ack = GeneralAck {
            id: new_id(),
            thread,
            status: AckStatus::Succeed,
            connection: connection.clone(),
        };
        deliver(&self.gateway, Message::PresentationAck(ack), connection).await
    }

    /// Prover side.
    async fn receive_ack(&self, ack: GeneralAck) -> Result<(), AgentError> {
        require_connection(
            &self.records,
            &ack.connection.their_did,
            &ack.connection.my_did,
        )?;
        if ack.status != AckStatus::Succeed {
            warn!("[presentation] Failed ACK for thread {}", ack.thread.id);
            return Err(AgentError::FailedAck {
                thread_id: ack.thread.id,
            });
        }
        let key = RecordKind::RequestPresentation.key(&ack.connection.their_did, &ack.thread.id);
        let guard = self.records.lock(&key).await;
        // Stored as received, so `my_did` is the verifier's.
        let record: RequestPresentationRecord = self.records.get(&key)?;
        if record.request.connection.my_did != ack.connection.my_did {
            warn!(
                "[presentation] ACK for {} from {} who did not request it",
                key, ack.connection.my_did
            );
            return Err(AgentError::ReferenceNotFound {
                kind: "presentation request",
                id: ack.thread.id,
            });
        }
        self.records
            .advance::<RequestPresentationRecord>(&guard, PresentationState::AckReceived)?;
        info!("[presentation] Exchange {} acknowledged", key);
        Ok(())
    }

    fn query(&self, query: PresentationQuery) -> Result<Reply, AgentError> {
        let record: PresentationRecord = self
            .records
            .get(&RecordKind::Presentation.key(&query.did, &query.id))?;
        Ok(Reply::Presentation(Box::new(record)))
    }
}

#[async_trait]
impl Controller for PresentationController {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handles(&self, message_type: MessageType) -> bool {
        matches!(
            message_type,
            MessageType::SendRequestPresentation
                | MessageType::RequestPresentation
                | MessageType::Presentation
                | MessageType::PresentationAck
                | MessageType::QueryPresentation
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
            Message::SendRequestPresentation(request) => {
                ControllerResponse::Reply(self.send_request(request).await?)
            }
            Message::RequestPresentation(request) => {
                self.receive_request(request).await?;
                ControllerResponse::Done
            }
            Message::Presentation(presentation) => {
                self.receive_presentation(presentation).await?;
                ControllerResponse::Done
            }
            Message::PresentationAck(ack) => {
                self.receive_ack(ack).await?;
                ControllerResponse::Done
            }
            Message::QueryPresentation(query) => ControllerResponse::Reply(self.query(query)?),
            other => ControllerResponse::Skip(other),
        };
        Ok(response)
    }
}
