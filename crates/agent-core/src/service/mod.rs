//! # Agent Service (Dispatcher)
//!
//! Ordered registry of controllers. Each message goes to the first
//! registered controller that claims its type; a controller answering
//! `Skip` passes the message on to the next claimant.
//!
//! ```text
//! Message ──► AgentService::serve ──► Controller::process ──► RecordStore
//!                                              │
//!                                              └──► OutboundGateway
//! ```

pub mod lock;
pub mod repository;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::AgentError;
use crate::domain::message::{Message, MessageType};
use crate::ports::inbound::{Controller, ControllerParams, ControllerResponse, Reply};

/// Outcome of dispatching one message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse {
    Handled {
        controller: &'static str,
        reply: Option<Reply>,
    },
    /// No registered controller claims the message type.
    Unhandled { message_type: MessageType },
}

impl ServiceResponse {
    /// The reply for the transport; `Unhandled` becomes an error.
    pub fn into_reply(self) -> Result<Option<Reply>, AgentError> {
        match self {
            ServiceResponse::Handled { reply, .. } => Ok(reply),
            ServiceResponse::Unhandled { message_type } => {
                Err(AgentError::Unhandled(message_type))
            }
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, ServiceResponse::Handled { .. })
    }
}

/// The dispatcher.
#[derive(Default)]
pub struct AgentService {
    controllers: Vec<Arc<dyn Controller>>,
}

impl AgentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a controller; earlier registrations win ties.
    pub fn register_controller(&mut self, controller: Arc<dyn Controller>) {
        info!("[agent] Registered controller {}", controller.name());
        self.controllers.push(controller);
    }

    pub fn controller_names(&self) -> Vec<&'static str> {
        self.controllers.iter().map(|c| c.name()).collect()
    }

    /// Run every controller's `initiate`, stopping at the first failure.
    pub async fn initiate_all(&self, params: &ControllerParams) -> Result<(), AgentError> {
        for controller in &self.controllers {
            controller.initiate(params).await?;
            debug!("[agent] Controller {} initiated", controller.name());
        }
        info!(
            "[agent] {} controllers initiated",
            self.controllers.len()
        );
        Ok(())
    }

    /// Route `message` to its controller.
    pub async fn serve(&self, message: Message) -> Result<ServiceResponse, AgentError> {
        let message_type = message.message_type();
        let mut message = message;

        for controller in &self.controllers {
            if !controller.handles(message_type) {
                continue;
            }
            debug!(
                "[agent] Dispatching {} to {}",
                message_type,
                controller.name()
            );
            match controller.process(message).await? {
                ControllerResponse::Reply(reply) => {
                    return Ok(ServiceResponse::Handled {
                        controller: controller.name(),
                        reply: Some(reply),
                    })
                }
                ControllerResponse::Done => {
                    return Ok(ServiceResponse::Handled {
                        controller: controller.name(),
                        reply: None,
                    })
                }
                ControllerResponse::Skip(returned) => message = returned,
            }
        }

        warn!("[agent] No controller handles {}", message_type);
        Ok(ServiceResponse::Unhandled { message_type })
    }

    /// Run every controller's `shutdown`; failures are logged and skipped.
    pub async fn shutdown_all(&self) {
        for controller in &self.controllers {
            if let Err(e) = controller.shutdown().await {
                warn!(
                    "[agent] Controller {} failed to shut down: {}",
                    controller.name(),
                    e
                );
            }
        }
        info!("[agent] Controllers shut down");
    }
}
