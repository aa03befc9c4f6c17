//! # Keyed Record Locks
//!
//! Serializes read-modify-write sequences on a single storage key.
//!
//! The store guarantees atomicity per call only. Every
//! `get → check → put` sequence runs while holding the [`KeyGuard`] for
//! its key, so two concurrent handshake steps on the same record cannot
//! interleave.
//!
//! ## Implementation
//!
//! One `tokio::sync::Mutex<()>` per key, created on first use and dropped
//! from the table when the last guard or waiter for it goes away. The
//! table itself sits behind a `parking_lot::Mutex` that is never held
//! across an await point.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock manager keyed by storage key.
#[derive(Debug, Default)]
pub struct KeyedLock {
    entries: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(self: &Arc<Self>, key: &str) -> KeyGuard {
        let entry = {
            let mut entries = self.entries.lock();
            entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = entry.lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            guard: Some(guard),
            owner: Arc::clone(self),
        }
    }

    /// Lock two keys without risking deadlock against a caller locking the
    /// same pair in the opposite order. Guards are returned in argument
    /// order.
    pub async fn lock_pair(self: &Arc<Self>, first: &str, second: &str) -> (KeyGuard, KeyGuard) {
        if first <= second {
            let a = self.lock(first).await;
            let b = self.lock(second).await;
            (a, b)
        } else {
            let b = self.lock(second).await;
            let a = self.lock(first).await;
            (a, b)
        }
    }

    /// Keys with a live entry (held or awaited).
    pub fn active_keys(&self) -> usize {
        self.entries.lock().len()
    }

    fn release(&self, key: &str) {
        let mut entries = self.entries.lock();
        // Only the table still references the mutex: nobody holds or waits.
        if let Some(entry) = entries.get(key) {
            if Arc::strong_count(entry) == 1 {
                entries.remove(key);
            }
        }
    }
}

/// Exclusive access to one storage key, released on drop.
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    owner: Arc<KeyedLock>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // The owned guard holds an Arc to the mutex; drop it before pruning.
        self.guard.take();
        self.owner.release(&self.key);
    }
}
