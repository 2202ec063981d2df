#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::sync::{Arc, Mutex};

use super::{KeySnapshotSource, KeyStorage, StoreError};
use crate::key::EncryptionKey;

/// In-memory key store for testing and simulation.
///
/// Implements both collaborator traits. All state lives behind an
/// `Arc<Mutex<_>>`, so clones share the same committed snapshot. `reload()`
/// is a no-op because memory is always current; it exists so engine code
/// paths are identical across backends.
#[derive(Clone)]
pub struct MemoryKeyStore {
    inner: Arc<Mutex<MemoryKeyStoreInner>>,
}

struct MemoryKeyStoreInner {
    /// Committed key set.
    keys: Vec<EncryptionKey>,

    /// Persisted largest id ever issued.
    high_water_mark: Option<i32>,

    /// Number of successful commits, for no-op assertions in tests.
    commit_count: u64,

    /// When set, the next commit fails with this error instead of applying.
    fail_next_commit: Option<StoreError>,
}

impl MemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryKeyStoreInner {
                keys: Vec::new(),
                high_water_mark: None,
                commit_count: 0,
                fail_next_commit: None,
            })),
        }
    }

    /// Replace the committed state directly, bypassing the engine.
    ///
    /// Test seeding helper: stands in for state written by earlier runs or
    /// by concurrent writers.
    pub fn seed(&self, keys: Vec<EncryptionKey>, high_water_mark: Option<i32>) {
        let mut inner = self.inner.lock().expect("MemoryKeyStore mutex poisoned");
        inner.keys = keys;
        inner.high_water_mark = high_water_mark;
    }

    /// Make the next `commit` fail with `error` without applying.
    pub fn fail_next_commit(&self, error: StoreError) {
        let mut inner = self.inner.lock().expect("MemoryKeyStore mutex poisoned");
        inner.fail_next_commit = Some(error);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.inner.lock().expect("MemoryKeyStore mutex poisoned").commit_count
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySnapshotSource for MemoryKeyStore {
    fn reload(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn active_keys(&self) -> Result<Vec<EncryptionKey>, StoreError> {
        let inner = self.inner.lock().expect("MemoryKeyStore mutex poisoned");
        Ok(inner.keys.clone())
    }

    fn high_water_mark(&self) -> Result<Option<i32>, StoreError> {
        let inner = self.inner.lock().expect("MemoryKeyStore mutex poisoned");
        Ok(inner.high_water_mark)
    }
}

impl KeyStorage for MemoryKeyStore {
    fn commit(&self, keys: &[EncryptionKey], high_water_mark: i32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("MemoryKeyStore mutex poisoned");

        if let Some(error) = inner.fail_next_commit.take() {
            return Err(error);
        }

        inner.keys = keys.to_vec();
        inner.high_water_mark = Some(high_water_mark);
        inner.commit_count += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KeySecret, SECRET_LEN};

    fn test_key(id: i32, site_id: i32) -> EncryptionKey {
        EncryptionKey {
            id,
            secret: KeySecret::new(vec![id as u8; SECRET_LEN]),
            site_id,
            created: i64::from(id) * 10,
            activates: i64::from(id) * 20,
            expires: i64::from(id) * 30,
        }
    }

    #[test]
    fn new_store_is_empty() {
        let store = MemoryKeyStore::new();
        assert!(store.active_keys().unwrap().is_empty());
        assert_eq!(store.high_water_mark().unwrap(), None);
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn commit_replaces_snapshot_and_mark() {
        let store = MemoryKeyStore::new();

        store.commit(&[test_key(1, 5)], 1).unwrap();
        store.commit(&[test_key(1, 5), test_key(2, 6)], 2).unwrap();

        let keys = store.active_keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(store.high_water_mark().unwrap(), Some(2));
        assert_eq!(store.commit_count(), 2);
    }

    #[test]
    fn seed_can_set_mark_above_visible_ids() {
        let store = MemoryKeyStore::new();
        store.seed(vec![test_key(3, 5)], Some(777));

        assert_eq!(store.active_keys().unwrap().len(), 1);
        assert_eq!(store.high_water_mark().unwrap(), Some(777));
    }

    #[test]
    fn clone_shares_state() {
        let store = MemoryKeyStore::new();
        let clone = store.clone();

        store.commit(&[test_key(1, 5)], 1).unwrap();

        assert_eq!(clone.active_keys().unwrap().len(), 1);
        assert_eq!(clone.high_water_mark().unwrap(), Some(1));
    }

    #[test]
    fn failed_commit_leaves_state_untouched() {
        let store = MemoryKeyStore::new();
        store.commit(&[test_key(1, 5)], 1).unwrap();

        store.fail_next_commit(StoreError::Io("disk full".to_string()));
        let result = store.commit(&[test_key(1, 5), test_key(2, 6)], 2);
        assert_eq!(result, Err(StoreError::Io("disk full".to_string())));

        assert_eq!(store.active_keys().unwrap().len(), 1);
        assert_eq!(store.high_water_mark().unwrap(), Some(1));
        assert_eq!(store.commit_count(), 1);

        // The failure is one-shot; the next commit applies normally.
        store.commit(&[test_key(1, 5), test_key(2, 6)], 2).unwrap();
        assert_eq!(store.active_keys().unwrap().len(), 2);
    }
}
