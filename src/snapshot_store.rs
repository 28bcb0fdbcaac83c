//! Durable client storage for the session snapshot.
//!
//! The snapshot is two string values, an auth token and a JSON profile,
//! stored under [`TOKEN_KEY`] and [`PROFILE_KEY`]. Stores only move strings;
//! deciding whether a snapshot is usable is the session store's job.

use sled::Db;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use crate::errors::{ConsoleError, ConsoleResult, SafeReadLock, SafeWriteLock};
use crate::snapshot_crypto::{open, seal};

pub const TOKEN_KEY: &str = "token";
pub const PROFILE_KEY: &str = "profile";

pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> ConsoleResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> ConsoleResult<()>;

    fn remove(&self, key: &str) -> ConsoleResult<()>;

    /// Remove every value belonging to the snapshot.
    fn clear(&self) -> ConsoleResult<()> {
        self.remove(TOKEN_KEY)?;
        self.remove(PROFILE_KEY)
    }
}

/// sled-backed store with optional AES-256-GCM sealing of every value.
pub struct SledSnapshotStore {
    db: Db,
    encryption_key: Option<[u8; 32]>,
}

impl SledSnapshotStore {
    pub fn open<P: AsRef<Path>>(path: P, encryption_key: Option<[u8; 32]>) -> ConsoleResult<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| ConsoleError::storage("open_snapshot_db", e))?;
        Ok(Self { db, encryption_key })
    }

    fn tree(&self) -> ConsoleResult<sled::Tree> {
        self.db
            .open_tree("session")
            .map_err(|e| ConsoleError::storage("open_session_tree", e))
    }

    fn seal_if_needed(&self, data: &[u8]) -> ConsoleResult<Vec<u8>> {
        match &self.encryption_key {
            Some(key) => seal(data, key),
            None => Ok(data.to_vec()),
        }
    }

    fn open_if_needed(&self, data: &[u8]) -> ConsoleResult<Vec<u8>> {
        match &self.encryption_key {
            Some(key) => open(data, key),
            None => Ok(data.to_vec()),
        }
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn get(&self, key: &str) -> ConsoleResult<Option<String>> {
        let Some(bytes) = self.tree()?.get(key.as_bytes())? else {
            return Ok(None);
        };
        let plain = self.open_if_needed(&bytes)?;
        String::from_utf8(plain)
            .map(Some)
            .map_err(|e| ConsoleError::storage("decode_snapshot_value", e))
    }

    fn set(&self, key: &str, value: &str) -> ConsoleResult<()> {
        let sealed = self.seal_if_needed(value.as_bytes())?;
        let tree = self.tree()?;
        tree.insert(key.as_bytes(), sealed)?;
        tree.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> ConsoleResult<()> {
        let tree = self.tree()?;
        tree.remove(key.as_bytes())?;
        tree.flush()?;
        Ok(())
    }
}

/// In-process store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values
            .safe_read()
            .map(|values| values.is_empty())
            .unwrap_or(true)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn get(&self, key: &str) -> ConsoleResult<Option<String>> {
        Ok(self.values.safe_read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ConsoleResult<()> {
        self.values
            .safe_write()?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ConsoleResult<()> {
        self.values.safe_write()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_store_set_get_clear() {
        let store = MemorySnapshotStore::new();
        store.set(TOKEN_KEY, "abc").unwrap();
        store.set(PROFILE_KEY, "{}").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));

        store.clear().unwrap();
        assert!(store.get(TOKEN_KEY).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn sled_store_persists_across_reopen() {
        let dir = tempdir().expect("failed to create temp dir");
        {
            let store = SledSnapshotStore::open(dir.path(), None).unwrap();
            store.set(TOKEN_KEY, "persisted").unwrap();
        }
        let store = SledSnapshotStore::open(dir.path(), None).unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn sealed_sled_values_are_not_stored_in_plaintext() {
        let dir = tempdir().expect("failed to create temp dir");
        let key = [5u8; 32];
        let store = SledSnapshotStore::open(dir.path(), Some(key)).unwrap();
        store.set(TOKEN_KEY, "secret-token").unwrap();

        let raw = store.tree().unwrap().get(TOKEN_KEY).unwrap().unwrap();
        assert!(!raw.windows(12).any(|w| w == b"secret-token"));
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("secret-token"));
    }

    #[test]
    fn sealed_value_read_with_wrong_key_is_an_error() {
        let dir = tempdir().expect("failed to create temp dir");
        {
            let store = SledSnapshotStore::open(dir.path(), Some([1u8; 32])).unwrap();
            store.set(PROFILE_KEY, "{}").unwrap();
        }
        let store = SledSnapshotStore::open(dir.path(), Some([2u8; 32])).unwrap();
        assert!(matches!(store.get(PROFILE_KEY), Err(ConsoleError::Crypto { .. })));
    }
}
