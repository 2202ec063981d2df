//! Redb-backed durable key store.
//!
//! Uses Redb's ACID transactions with copy-on-write for crash safety. A
//! commit rewrites the whole key table and the high-water mark inside one
//! write transaction, so the committed key set is replaced atomically.
//!
//! Reads are served from an in-process snapshot cache; `reload()` refreshes
//! the cache from the database. Rotation always reloads before planning, so
//! state written by other processes between operations is picked up.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use keymint_core::{EncryptionKey, KeySnapshotSource, KeyStorage, StoreError};
use redb::{Database, ReadableTable, TableDefinition};

/// Table: keys
/// Key: key id as big-endian bytes [4 bytes]
/// Value: CBOR-encoded `EncryptionKey`
const KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("keys");

/// Table: meta
/// Key: metadata name
/// Value: big-endian bytes (4 bytes for the high-water mark)
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const HIGH_WATER_MARK: &str = "high_water_mark";

/// Durable key store backed by Redb.
///
/// Thread-safe; clones share the database handle and the snapshot cache.
#[derive(Clone)]
pub struct RedbKeyStore {
    db: Arc<Database>,
    cache: Arc<Mutex<SnapshotCache>>,
}

struct SnapshotCache {
    keys: Vec<EncryptionKey>,
    high_water_mark: Option<i32>,
}

impl RedbKeyStore {
    /// Open or create a Redb database at the given path and load the
    /// committed snapshot into the cache.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the database cannot be opened or
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(|e| StoreError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(KEYS).map_err(|e| StoreError::Io(e.to_string()))?;
            let _ = txn.open_table(META).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        let store = Self {
            db: Arc::new(db),
            cache: Arc::new(Mutex::new(SnapshotCache { keys: Vec::new(), high_water_mark: None })),
        };
        store.reload()?;

        Ok(store)
    }

    fn read_snapshot(&self) -> Result<(Vec<EncryptionKey>, Option<i32>), StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;

        let key_table = txn.open_table(KEYS).map_err(|e| StoreError::Io(e.to_string()))?;

        let mut keys = Vec::new();
        for result in key_table.iter().map_err(|e| StoreError::Io(e.to_string()))? {
            let (_, value) = result.map_err(|e| StoreError::Io(e.to_string()))?;
            let key: EncryptionKey = ciborium::from_reader(value.value())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            keys.push(key);
        }

        let meta_table = txn.open_table(META).map_err(|e| StoreError::Io(e.to_string()))?;
        let high_water_mark =
            match meta_table.get(HIGH_WATER_MARK).map_err(|e| StoreError::Io(e.to_string()))? {
                Some(value) => Some(decode_key_id(value.value())?),
                None => None,
            };

        Ok((keys, high_water_mark))
    }
}

impl KeySnapshotSource for RedbKeyStore {
    fn reload(&self) -> Result<(), StoreError> {
        let (keys, high_water_mark) = self.read_snapshot()?;

        let mut cache = self.cache.lock().expect("RedbKeyStore cache mutex poisoned");
        cache.keys = keys;
        cache.high_water_mark = high_water_mark;

        Ok(())
    }

    fn active_keys(&self) -> Result<Vec<EncryptionKey>, StoreError> {
        let cache = self.cache.lock().expect("RedbKeyStore cache mutex poisoned");
        Ok(cache.keys.clone())
    }

    fn high_water_mark(&self) -> Result<Option<i32>, StoreError> {
        let cache = self.cache.lock().expect("RedbKeyStore cache mutex poisoned");
        Ok(cache.high_water_mark)
    }
}

impl KeyStorage for RedbKeyStore {
    fn commit(&self, keys: &[EncryptionKey], high_water_mark: i32) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;

        // Drop and recreate the key table: the committed key set is
        // replaced wholesale, not patched.
        txn.delete_table(KEYS).map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut key_table = txn.open_table(KEYS).map_err(|e| StoreError::Io(e.to_string()))?;

            for key in keys {
                let mut bytes = Vec::new();
                ciborium::into_writer(key, &mut bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;

                let id_bytes = encode_key_id(key.id);
                key_table
                    .insert(id_bytes.as_slice(), bytes.as_slice())
                    .map_err(|e| StoreError::Io(e.to_string()))?;
            }

            let mut meta_table =
                txn.open_table(META).map_err(|e| StoreError::Io(e.to_string()))?;
            let mark_bytes = encode_key_id(high_water_mark);
            meta_table
                .insert(HIGH_WATER_MARK, mark_bytes.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        // The durable state changed; bring the cache along.
        let mut cache = self.cache.lock().expect("RedbKeyStore cache mutex poisoned");
        cache.keys = keys.to_vec();
        cache.high_water_mark = Some(high_water_mark);

        Ok(())
    }
}

/// Encode a key id as a 4-byte big-endian table key.
///
/// Ids are positive, so lexicographic ordering matches numeric ordering.
fn encode_key_id(id: i32) -> [u8; 4] {
    id.to_be_bytes()
}

/// Decode a 4-byte big-endian table key back to a key id.
fn decode_key_id(bytes: &[u8]) -> Result<i32, StoreError> {
    let array: [u8; 4] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization(format!("key id of {} bytes", bytes.len())))?;
    Ok(i32::from_be_bytes(array))
}
