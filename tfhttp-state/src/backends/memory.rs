//! In-memory storage and lock backends
//!
//! Keeps every object in a process-local map. Useful for development and
//! for tests that need deterministic control over the keyspace; nothing
//! survives a restart.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::backend::{
    LockBackend, LockError, LockResult, StorageBackend, StorageError, StorageResult,
};
use crate::lock::{LockInfo, lock_key};

/// Storage backend over a shared in-process map
#[derive(Clone, Default)]
pub struct MemoryStorageBackend {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorageBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.objects.lock().expect("object map poisoned")
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn create(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        self.objects().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        match self.objects().remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(key)),
        }
    }
}

/// Lock backend over the same in-process map as [`MemoryStorageBackend`]
///
/// The map mutex makes each acquisition atomic, so of any number of
/// concurrent callers exactly one inserts the marker.
pub struct MemoryLockBackend {
    storage: MemoryStorageBackend,
}

impl MemoryLockBackend {
    /// Create a lock backend sharing `storage`'s keyspace
    pub fn new(storage: MemoryStorageBackend) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl LockBackend for MemoryLockBackend {
    async fn lock(&self, key: &str, info: &LockInfo) -> LockResult<()> {
        let data = serde_json::to_vec(info).map_err(|err| LockError::Backend(err.to_string()))?;

        let mut objects = self.storage.objects();
        match objects.entry(lock_key(key)) {
            Entry::Occupied(slot) => {
                let holder: LockInfo = serde_json::from_slice(slot.get())
                    .map_err(|err| LockError::Decode(err.to_string()))?;
                Err(LockError::AlreadyLocked(holder))
            }
            Entry::Vacant(slot) => {
                slot.insert(data);
                Ok(())
            }
        }
    }

    async fn unlock(&self, key: &str) -> LockResult<LockInfo> {
        let marker = lock_key(key);

        let mut objects = self.storage.objects();
        let bytes = match objects.get(&marker) {
            Some(bytes) => bytes,
            None => return Err(LockError::NotLocked(key.to_string())),
        };

        // Decode before removing: a malformed marker is an integrity
        // error and stays in place for inspection.
        let info: LockInfo =
            serde_json::from_slice(bytes).map_err(|err| LockError::Decode(err.to_string()))?;
        objects.remove(&marker);
        Ok(info)
    }
}
