//! In-memory key-value store for tests and development runs.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::ports::outbound::{BatchOperation, KeyValueStore, StoreError};

/// `KeyValueStore` over an ordered map.
///
/// Batches are applied under one write lock, which makes them atomic with
/// respect to every other call on the same store.
#[derive(Debug, Default)]
pub struct InMemoryKVStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StoreError> {
        let mut data = self.data.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = InMemoryKVStore::new();
        store.put(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert!(store.exists(b"key1").unwrap());

        store.delete(b"key1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), None);
        // Absent keys delete cleanly.
        store.delete(b"key1").unwrap();
    }

    #[test]
    fn test_batch_mixes_puts_and_deletes() {
        let store = InMemoryKVStore::new();
        store.put(b"stale", b"x").unwrap();
        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"a".to_vec(), b"1".to_vec()),
                BatchOperation::put(b"b".to_vec(), b"2".to_vec()),
                BatchOperation::delete(b"stale".to_vec()),
            ])
            .unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.exists(b"stale").unwrap());
    }

    #[test]
    fn test_prefix_scan_is_bounded() {
        let store = InMemoryKVStore::new();
        store.put(b"Credential_did:h_1", b"1").unwrap();
        store.put(b"Credential_did:h_2", b"2").unwrap();
        store.put(b"Credential_did:other_1", b"3").unwrap();
        store.put(b"Connection_did:h", b"4").unwrap();

        let results = store.prefix_scan(b"Credential_did:h_").unwrap();
        assert_eq!(results.len(), 2);
    }
}
