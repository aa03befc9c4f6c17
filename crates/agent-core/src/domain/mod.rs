//! # Domain Layer
//!
//! Payload shapes, the message union, persisted records and their state
//! machines. Nothing here touches storage or the network.
//!
//! ## Modules
//!
//! - `connection` - Handshake payloads and the `Connection` descriptor
//! - `credential` - Credential exchange payloads
//! - `presentation` - Presentation exchange payloads
//! - `general` - Basic messages and inbox queries
//! - `message` - `MessageType` catalog and the tagged `Message` union
//! - `records` - Persisted record families and their key scheme
//! - `state` - Transition tables and the shared guard
//! - `errors` - `AgentError`

pub mod connection;
pub mod credential;
pub mod errors;
pub mod general;
pub mod message;
pub mod presentation;
pub mod records;
pub mod state;
