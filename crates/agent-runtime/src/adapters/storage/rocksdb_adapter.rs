//! # RocksDB Storage Adapter
//!
//! Persistent `KeyValueStore` for the agent's records.
//!
//! All records share the default column family; their keys already carry
//! the `<Kind>_<did>_` prefix that query-by-owner scans on.
//!
//! ## Configuration
//!
//! - Snappy compression
//! - Bloom filters (10 bits per key)
//! - fsync on write unless opened `for_testing`

use std::path::Path;
use std::sync::Arc;

use agent_core::{BatchOperation, KeyValueStore, StoreError};
use parking_lot::RwLock;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use tracing::info;

/// RocksDB tuning for the agent store.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// Enable fsync after each write (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/agent".to_string(),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed key-value store.
pub struct RocksDbStore {
    // Writers take the write lock so a batch never interleaves with a single put.
    db: Arc<RwLock<DB>>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create a RocksDB database
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| StoreError::Open {
            message: format!("Failed to open RocksDB at {}: {}", config.path, e),
        })?;
        info!("[runtime] Opened RocksDB store at {}", config.path);

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            config,
        })
    }

    /// Open at `path` with default tuning.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open(RocksDbConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

fn io_error(op: &str, e: rocksdb::Error) -> StoreError {
    StoreError::IOError {
        message: format!("RocksDB {} failed: {}", op, e),
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let db = self.db.read();
        db.get(key).map_err(|e| io_error("get", e))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let db = self.db.write();
        db.put_opt(key, value, &self.write_options())
            .map_err(|e| io_error("put", e))
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let db = self.db.write();
        db.delete_opt(key, &self.write_options())
            .map_err(|e| io_error("delete", e))
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StoreError> {
        let db = self.db.write();
        let mut batch = WriteBatch::default();

        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }

        db.write_opt(batch, &self.write_options())
            .map_err(|e| io_error("batch write", e))
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        let db = self.db.read();
        db.get_pinned(key)
            .map(|v| v.is_some())
            .map_err(|e| io_error("exists check", e))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let db = self.db.read();
        let mut results = Vec::new();

        for item in db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| io_error("scan", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, RocksDbStore) {
        let temp_dir = TempDir::new().unwrap();
        let config = RocksDbConfig::for_testing(temp_dir.path().to_string_lossy().to_string());
        let store = RocksDbStore::open(config).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_rocksdb_basic_operations() {
        let (_dir, store) = open_temp();

        store.put(b"Invitation_did:a_1", b"{}").unwrap();
        assert_eq!(
            store.get(b"Invitation_did:a_1").unwrap(),
            Some(b"{}".to_vec())
        );
        assert!(store.exists(b"Invitation_did:a_1").unwrap());
        assert!(!store.exists(b"nonexistent").unwrap());

        store.delete(b"Invitation_did:a_1").unwrap();
        assert!(!store.exists(b"Invitation_did:a_1").unwrap());
    }

    #[test]
    fn test_rocksdb_batch_write() {
        let (_dir, store) = open_temp();
        store.put(b"stale", b"x").unwrap();

        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"ConnectionReq_did:a_1".to_vec(), b"{}".to_vec()),
                BatchOperation::put(b"Invitation_did:a_1".to_vec(), b"{}".to_vec()),
                BatchOperation::delete(b"stale".to_vec()),
            ])
            .unwrap();

        assert!(store.exists(b"ConnectionReq_did:a_1").unwrap());
        assert!(store.exists(b"Invitation_did:a_1").unwrap());
        assert!(!store.exists(b"stale").unwrap());
    }

    #[test]
    fn test_rocksdb_prefix_scan_stops_at_owner_boundary() {
        let (_dir, store) = open_temp();

        store.put(b"Credential_did:a_1", b"1").unwrap();
        store.put(b"Credential_did:a_2", b"2").unwrap();
        store.put(b"Credential_did:ab_3", b"3").unwrap();
        store.put(b"Invitation_did:a_1", b"i").unwrap();

        let results = store.prefix_scan(b"Credential_did:a_").unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_rocksdb_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_string_lossy().to_string();
        {
            let store = RocksDbStore::open(RocksDbConfig::for_testing(path.clone())).unwrap();
            store.put(b"Connection_did:a", b"{}").unwrap();
        }
        let store = RocksDbStore::open(RocksDbConfig::for_testing(path)).unwrap();
        assert!(store.exists(b"Connection_did:a").unwrap());
    }
}
