use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rocksdb::{DBWithThreadMode, MultiThreaded, Options};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::SnapshotResult;

/// Key/value capability required by the snapshot core. Trie nodes are
/// content-addressed by hash, block records are keyed by block hash, and
/// trio records use the `btrio/` prefix, so writers never alias.
pub trait Database: Send + Sync {
    fn get(&self, key: &[u8]) -> SnapshotResult<Option<Vec<u8>>>;
    fn put(&self, key: &[u8], value: &[u8]) -> SnapshotResult<()>;
}

/// Disk-backed database used by nodes and by validate-mode temporary
/// directories.
pub struct RocksDb {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksDb {
    pub fn open(path: &Path) -> SnapshotResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path)?;
        Ok(Self { db })
    }
}

impl Database for RocksDb {
    fn get(&self, key: &[u8]) -> SnapshotResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> SnapshotResult<()> {
        self.db.put(key, value)?;
        Ok(())
    }
}

/// In-memory database for tests and throwaway loads.
#[derive(Default)]
pub struct MemoryDb {
    inner: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted copy of the full contents, for comparing two loads.
    pub fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = self
            .inner
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        entries.sort();
        entries
    }
}

impl Database for MemoryDb {
    fn get(&self, key: &[u8]) -> SnapshotResult<Option<Vec<u8>>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> SnapshotResult<()> {
        self.inner.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

/// Typed wrapper encoding values with the canonical binary codec.
pub struct KvStore {
    db: Arc<dyn Database>,
}

impl KvStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub fn put<T: Serialize>(&self, key: &[u8], value: &T) -> SnapshotResult<()> {
        self.db.put(key, &bincode::serialize(value)?)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> SnapshotResult<Option<T>> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}
