//! # Record Store
//!
//! Typed JSON records over the byte-level [`KeyValueStore`], plus the keyed
//! lock manager that serializes read-modify-write on each key.
//!
//! Every mutating method takes the [`KeyGuard`] of the key it writes and
//! writes to that guard's key, so an unlocked write cannot be expressed.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::errors::AgentError;
use crate::domain::state::{guard_transition, StatefulRecord};
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use crate::service::lock::{KeyGuard, KeyedLock};

/// Shared handle to the record layer. Cheap to clone.
#[derive(Clone)]
pub struct RecordStore {
    store: Arc<dyn KeyValueStore>,
    locks: Arc<KeyedLock>,
}

impl RecordStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            locks: Arc::new(KeyedLock::new()),
        }
    }

    pub async fn lock(&self, key: &str) -> KeyGuard {
        self.locks.lock(key).await
    }

    pub async fn lock_pair(&self, first: &str, second: &str) -> (KeyGuard, KeyGuard) {
        self.locks.lock_pair(first, second).await
    }

    pub fn locks(&self) -> &Arc<KeyedLock> {
        &self.locks
    }

    /// Read and decode; `None` when absent.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AgentError> {
        match self.store.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read and decode; `NotFound` when absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, AgentError> {
        self.load(key)?.ok_or_else(|| AgentError::NotFound {
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> Result<bool, AgentError> {
        Ok(self.store.exists(key.as_bytes())?)
    }

    /// Decode every record whose key starts with `prefix`.
    pub fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, AgentError> {
        self.store
            .prefix_scan(prefix.as_bytes())?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(AgentError::from))
            .collect()
    }

    /// Create a record; `AlreadyExists` when the key is taken.
    pub fn insert_new<T: Serialize>(&self, guard: &KeyGuard, record: &T) -> Result<(), AgentError> {
        let key = guard.key();
        if self.store.exists(key.as_bytes())? {
            return Err(AgentError::AlreadyExists {
                key: key.to_string(),
            });
        }
        self.store.put(key.as_bytes(), &serde_json::to_vec(record)?)?;
        Ok(())
    }

    /// Overwrite the whole record.
    pub fn save<T: Serialize>(&self, guard: &KeyGuard, record: &T) -> Result<(), AgentError> {
        self.store
            .put(guard.key().as_bytes(), &serde_json::to_vec(record)?)?;
        Ok(())
    }

    pub fn remove(&self, guard: &KeyGuard) -> Result<(), AgentError> {
        self.store.delete(guard.key().as_bytes())?;
        Ok(())
    }

    /// Load a stateful record, check the transition table, store it back at
    /// `to`. Returns the updated record.
    pub fn advance<R>(&self, guard: &KeyGuard, to: R::State) -> Result<R, AgentError>
    where
        R: StatefulRecord + Serialize + DeserializeOwned,
    {
        let mut record: R = self.get(guard.key())?;
        guard_transition(guard.key(), record.state(), to)?;
        record.set_state(to);
        self.save(guard, &record)?;
        Ok(record)
    }

    pub fn batch(&self) -> RecordBatch {
        RecordBatch::default()
    }

    /// Apply every staged write atomically.
    pub fn commit(&self, batch: RecordBatch) -> Result<(), AgentError> {
        if batch.operations.is_empty() {
            return Ok(());
        }
        self.store.atomic_batch_write(batch.operations)?;
        Ok(())
    }

    /// Round-trip a scratch key; used by controllers at startup.
    pub fn probe(&self, key: &str) -> Result<(), AgentError> {
        self.store.put(key.as_bytes(), b"{}")?;
        self.store.get(key.as_bytes())?;
        self.store.delete(key.as_bytes())?;
        Ok(())
    }
}

/// Writes staged for one atomic commit.
#[derive(Debug, Default)]
pub struct RecordBatch {
    operations: Vec<BatchOperation>,
}

impl RecordBatch {
    pub fn put<T: Serialize>(&mut self, guard: &KeyGuard, record: &T) -> Result<(), AgentError> {
        self.operations.push(BatchOperation::put(
            guard.key().as_bytes(),
            serde_json::to_vec(record)?,
        ));
        Ok(())
    }

    pub fn delete(&mut self, guard: &KeyGuard) {
        self.operations
            .push(BatchOperation::delete(guard.key().as_bytes()));
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
