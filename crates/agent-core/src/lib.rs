//! # DID Agent Core
//!
//! Protocol engine of a self-sovereign-identity agent: connection
//! handshakes, credential and presentation exchange, and general messaging
//! between decentralized identifiers, persisted over a key-value store.
//!
//! ## Architecture
//!
//! ```text
//! transport ──► Message::decode ──► AgentService::serve
//!                                        │
//!                        ┌───────────────┼────────────────┐
//!                        ▼               ▼                ▼
//!                  Controller      Controller  ...   Controller
//!                        │
//!                        ├──► RecordStore (keyed locks, FSM guard) ──► KeyValueStore
//!                        └──► OutboundGateway ──► Resolver ──► peer agent
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | Records are created once per key | `RecordStore::insert_new` |
//! | State only moves along its transition table | `domain::state::guard_transition` |
//! | Read-modify-write on a key is serialized | `service::lock::KeyedLock` |
//! | Multi-record steps commit atomically | `RecordStore::commit` |
//! | Payloads are typed before any controller sees them | `Message::decode` |
//! | No network I/O while a record lock is held | controllers drop guards before `deliver` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Payloads, message union, records, state machines, errors
//! - `ports/` - Controller contract (inbound), store/resolver/gateway (outbound)
//! - `service/` - Dispatcher, keyed locks, typed record store
//! - `controllers/` - Connection, general-message, credential, presentation
//! - `adapters/` - In-memory store, static resolver, HTTP gateway
//!
//! ## Usage
//!
//! ```ignore
//! let records = RecordStore::new(Arc::new(InMemoryKVStore::new()));
//! let mut service = AgentService::new();
//! for controller in default_controllers(records, gateway) {
//!     service.register_controller(controller);
//! }
//! service.initiate_all(&ControllerParams::default()).await?;
//!
//! let message = Message::decode(MessageType::Invitation, json)?;
//! let reply = service.serve(message).await?.into_reply()?;
//! ```

pub mod adapters;
pub mod controllers;
pub mod domain;
pub mod ports;
pub mod service;
pub mod test_utils;

pub use adapters::{HttpOutboundGateway, InMemoryKVStore, StaticResolver};
pub use controllers::{
    default_controllers, ConnectionController, CredentialController, GeneralMessageController,
    PresentationController,
};
pub use domain::errors::AgentError;
pub use domain::message::{Message, MessageType};
pub use ports::inbound::{Controller, ControllerParams, ControllerResponse, Reply};
pub use ports::outbound::{
    BatchOperation, KeyValueStore, OutboundGateway, OutboundMessage, Resolver, StoreError,
};
pub use service::repository::RecordStore;
pub use service::{AgentService, ServiceResponse};
