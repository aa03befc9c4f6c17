//! # General Message Controller
//!
//! Free-form messages between connected DIDs, kept in a per-owner inbox at
//! `GeneralMsg_<owner>`. Sent messages land in the sender's inbox too.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::controllers::{deliver, new_id, probe_key, require_connection};
use crate::domain::errors::AgentError;
use crate::domain::general::{BasicMessage, QueryGeneralMessage};
use crate::domain::message::{Message, MessageType};
use crate::domain::records::{GeneralMsgRecord, RecordKind};
use crate::ports::inbound::{Controller, ControllerParams, ControllerResponse, Reply};
use crate::ports::outbound::OutboundGateway;
use crate::service::repository::RecordStore;

pub const NAME: &str = "general-message-controller";

pub struct GeneralMessageController {
    records: RecordStore,
    gateway: Arc<dyn OutboundGateway>,
}

impl GeneralMessageController {
    pub fn new(records: RecordStore, gateway: Arc<dyn OutboundGateway>) -> Self {
        Self { records, gateway }
    }

    async fn send(&self, mut message: BasicMessage) -> Result<Reply, AgentError> {
        let connection = require_connection(
            &self.records,
            &message.connection.my_did,
            &message.connection.their_did,
        )?;
        message.id = new_id();
        message.sent_time = Some(Utc::now());
        message.connection = connection.clone();

        self.append(&connection.my_did, message.clone()).await?;

        let outbound = Message::ReceiveGeneralMsg(message);
        deliver(&self.gateway, outbound.clone(), connection).await?;
        Ok(Reply::Sent(Box::new(outbound)))
    }

    async fn receive(&self, mut message: BasicMessage) -> Result<(), AgentError> {
        let receiver = message.connection.their_did.clone();
        require_connection(&self.records, &receiver, &message.connection.my_did)?;
        if message.id.is_empty() {
            message.id = new_id();
        }
        if message.sent_time.is_none() {
            message.sent_time = Some(Utc::now());
        }
        self.append(&receiver, message).await
    }

    async fn append(&self, owner: &str, message: BasicMessage) -> Result<(), AgentError> {
        let key = RecordKind::GeneralMsg.owner_key(owner);
        let guard = self.records.lock(&key).await;

        let mut inbox: GeneralMsgRecord =
            self.records.load(&key)?.unwrap_or_else(|| GeneralMsgRecord {
                owner_did: owner.to_string(),
                messages: Vec::new(),
            });
        debug!("[general] Appending message {} to {}", message.id, key);
        inbox.messages.push(message);
        self.records.save(&guard, &inbox)
    }

    async fn query(&self, query: QueryGeneralMessage) -> Result<Reply, AgentError> {
        if query.did.is_empty() {
            return Err(AgentError::missing_field(
                MessageType::QueryGeneralMessage,
                "did",
            ));
        }
        let key = RecordKind::GeneralMsg.owner_key(&query.did);
        let guard = self.records.lock(&key).await;

        let Some(mut inbox) = self.records.load::<GeneralMsgRecord>(&key)? else {
            return Ok(Reply::GeneralMessages(Vec::new()));
        };

        let result = if query.latest {
            let latest: Vec<BasicMessage> = inbox.messages.last().cloned().into_iter().collect();
            if query.remove_after_read && !latest.is_empty() {
                inbox.messages.pop();
                if inbox.messages.is_empty() {
                    self.records.remove(&guard)?;
                } else {
                    self.records.save(&guard, &inbox)?;
                }
            }
            latest
        } else {
            if query.remove_after_read {
                self.records.remove(&guard)?;
            }
            inbox.messages
        };

        if query.remove_after_read {
            info!("[general] Consumed {} messages from {}", result.len(), key);
        }
        Ok(Reply::GeneralMessages(result))
    }
}

#[async_trait]
impl Controller for GeneralMessageController {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handles(&self, message_type: MessageType) -> bool {
        matches!(
            message_type,
            MessageType::SendGeneralMsg
                | MessageType::ReceiveGeneralMsg
                | MessageType::QueryGeneralMessage
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
            Message::SendGeneralMsg(msg) => ControllerResponse::Reply(self.send(msg).await?),
            Message::ReceiveGeneralMsg(msg) => {
                self.receive(msg).await?;
                ControllerResponse::Done
            }
            Message::QueryGeneralMessage(query) => {
                ControllerResponse::Reply(self.query(query).await?)
            }
            other => ControllerResponse::Skip(other),
        };
        Ok(response)
    }
}
