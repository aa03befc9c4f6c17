//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the agent requires from its host.
//!
//! Production: `RocksDbStore` (agent-runtime/adapters/storage/rocksdb_adapter.rs),
//! `HttpOutboundGateway`, `StaticResolver`.
//! Testing: `InMemoryKVStore`, `RecordingGateway`.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::connection::Connection;
use crate::domain::errors::AgentError;
use crate::domain::message::Message;

/// Key-value store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying engine I/O failure.
    #[error("store I/O error: {message}")]
    IOError { message: String },

    /// Store could not be opened.
    #[error("cannot open store: {message}")]
    Open { message: String },
}

/// Abstract interface for key-value database operations.
///
/// Individual calls are atomic; sequences of calls are not. Callers that
/// read-then-write hold a keyed lock (see `service::lock`).
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, StoreError>;

    /// Iterate over keys with a prefix.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Maps a DID plus service id to a transport endpoint.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Base URL of the agent serving `did`'s `service_id` entry.
    async fn resolve_service_endpoint(
        &self,
        did: &str,
        service_id: &str,
    ) -> Result<String, AgentError>;
}

/// A message headed to a peer, plus the sender's view of the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub message: Message,
    /// `their_*` identifies the recipient.
    pub connection: Connection,
}

impl OutboundMessage {
    pub fn new(message: Message, connection: Connection) -> Self {
        Self {
            message,
            connection,
        }
    }
}

/// Delivers outbound messages to peers.
#[async_trait]
pub trait OutboundGateway: Send + Sync {
    /// Fails with `RemoteDeliveryFailed` (or `Resolution`) when the message
    /// cannot be handed to the peer.
    async fn send(&self, outbound: OutboundMessage) -> Result<(), AgentError>;
}
