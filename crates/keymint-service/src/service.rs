//! Write-lock serialized admin facade.
//!
//! Every mutating key operation in the surrounding system - key rotation
//! here, admin-user and enclave mutations elsewhere - runs under one
//! process-wide [`WriteLock`]. The lock plus the engine's snapshot reload
//! give linearizable rotation semantics: at most one mint batch is in
//! flight at a time, and every batch observes all previously committed
//! batches.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use keymint_core::{
    ADVERTISING_SITE_ID, EncryptionKey, Environment, KeyListing, KeyRotator, KeySchedule,
    KeySelector, KeySnapshotSource, KeyStorage, RotationError, RotationResult, audit_hash,
    is_valid_site_id,
};

/// Process-wide mutating-operation lock.
///
/// Cloneable handle; clones share the same underlying mutex. Hand the same
/// lock to every sibling admin service so that all mutating admin
/// operations, of any kind, serialize against each other.
#[derive(Clone, Default)]
pub struct WriteLock {
    inner: Arc<Mutex<()>>,
}

impl WriteLock {
    /// Create a new lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is held.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (a thread panicked mid-mutation).
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().expect("admin write lock poisoned")
    }
}

/// Admin-facing key lifecycle operations.
///
/// Mutating calls acquire the write lock for their whole duration and
/// release it unconditionally on completion or failure. Reads
/// ([`KeyAdminService::list_keys`]) take no lock and may run concurrently
/// with anything.
pub struct KeyAdminService<E, S> {
    env: E,
    store: S,
    rotator: KeyRotator,
    write_lock: WriteLock,
}

impl<E, S> KeyAdminService<E, S>
where
    E: Environment,
    S: KeySnapshotSource + KeyStorage,
{
    /// Build the service around an environment, a store, the class
    /// policies, and the shared admin write lock.
    pub fn new(env: E, store: S, schedule: KeySchedule, write_lock: WriteLock) -> Self {
        Self { env, store, rotator: KeyRotator::new(schedule), write_lock }
    }

    /// Rotate the master and refresh keys.
    pub fn rotate_master_keys(
        &self,
        min_age: Duration,
        force: bool,
    ) -> Result<RotationResult, RotationError> {
        let _guard = self.write_lock.acquire();

        let result =
            self.rotator.rotate(KeySelector::MasterAndRefresh, min_age, force, &self.env, &self.store)?;
        self.log_rotated("rotate master key", &result.rotated);

        Ok(result)
    }

    /// Rotate one site's key.
    ///
    /// Rejects site ids outside the targetable range with
    /// [`RotationError::InvalidSiteId`] before touching any state, and maps
    /// "no keys under this site at all" to
    /// [`RotationError::NoKeysForSite`] - as opposed to "has keys but none
    /// old enough", which succeeds with an empty rotated list.
    pub fn rotate_site_key(
        &self,
        site_id: i32,
        min_age: Duration,
        force: bool,
    ) -> Result<RotationResult, RotationError> {
        if site_id != ADVERTISING_SITE_ID && !is_valid_site_id(site_id) {
            return Err(RotationError::InvalidSiteId(site_id));
        }

        let _guard = self.write_lock.acquire();

        let result =
            self.rotator.rotate(KeySelector::Site(site_id), min_age, force, &self.env, &self.store)?;

        if !result.considered_sites.contains(&site_id) {
            return Err(RotationError::NoKeysForSite(site_id));
        }

        self.log_rotated("rotate site key", &result.rotated);

        Ok(result)
    }

    /// Rotate every tenant site's key, plus the shared advertising site.
    pub fn rotate_all_site_keys(
        &self,
        min_age: Duration,
        force: bool,
    ) -> Result<RotationResult, RotationError> {
        let _guard = self.write_lock.acquire();

        let result =
            self.rotator.rotate(KeySelector::AllSites, min_age, force, &self.env, &self.store)?;
        self.log_rotated("rotate site key", &result.rotated);

        Ok(result)
    }

    /// Mint one key for `site_id` unconditionally (first key for a
    /// brand-new tenant).
    pub fn add_site_key(&self, site_id: i32) -> Result<EncryptionKey, RotationError> {
        let _guard = self.write_lock.acquire();

        let key = self.rotator.add_site_key(site_id, &self.env, &self.store)?;
        self.log_rotated("add site key", std::slice::from_ref(&key));

        Ok(key)
    }

    /// The committed key set as presentation records, ordered by
    /// `(site_id, activates)`. No lock taken.
    pub fn list_keys(&self) -> Result<Vec<KeyListing>, RotationError> {
        self.rotator.list_keys(&self.store)
    }

    fn log_rotated(&self, action: &str, keys: &[EncryptionKey]) {
        for key in keys {
            tracing::info!(
                action,
                key_id = key.id,
                site_id = key.site_id,
                record_hash = %audit_hash(key),
                "admin key mutation"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use keymint_core::{KeySecret, MemoryKeyStore, SECRET_LEN};

    use super::*;

    #[derive(Clone)]
    struct FixedEnv;

    impl Environment for FixedEnv {
        fn now_millis(&self) -> i64 {
            1_700_000_000_000
        }

        fn fill_random(&self, buffer: &mut [u8]) {
            buffer.fill(0x42);
        }
    }

    fn service(store: MemoryKeyStore) -> KeyAdminService<FixedEnv, MemoryKeyStore> {
        KeyAdminService::new(FixedEnv, store, KeySchedule::default(), WriteLock::new())
    }

    fn stale_key(id: i32, site_id: i32) -> EncryptionKey {
        EncryptionKey {
            id,
            secret: KeySecret::new(vec![id as u8; SECRET_LEN]),
            site_id,
            created: 1_000,
            activates: 2_000,
            expires: 1_000_000,
        }
    }

    #[test]
    fn reserved_site_ids_are_rejected_before_any_state_access() {
        let store = MemoryKeyStore::new();
        store.seed(vec![stale_key(1, -1)], Some(1));
        let service = service(store.clone());

        for site_id in [-2, -1, 0, 1] {
            let result = service.rotate_site_key(site_id, Duration::ZERO, true);
            assert_eq!(result, Err(RotationError::InvalidSiteId(site_id)));
        }

        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn advertising_site_is_targetable() {
        let store = MemoryKeyStore::new();
        store.seed(vec![stale_key(1, ADVERTISING_SITE_ID)], Some(1));
        let service = service(store);

        let result = service
            .rotate_site_key(ADVERTISING_SITE_ID, Duration::from_secs(100), false)
            .unwrap();
        assert_eq!(result.rotated.len(), 1);
        assert_eq!(result.rotated[0].site_id, ADVERTISING_SITE_ID);
    }

    #[test]
    fn keyless_site_reports_not_found() {
        let store = MemoryKeyStore::new();
        store.seed(vec![stale_key(1, 6)], Some(1));
        let service = service(store.clone());

        let result = service.rotate_site_key(5, Duration::from_secs(100), false);
        assert_eq!(result, Err(RotationError::NoKeysForSite(5)));
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn fresh_key_is_a_noop_not_a_not_found() {
        let store = MemoryKeyStore::new();
        let mut key = stale_key(1, 5);
        key.activates = 1_700_000_000_000 + 1_000_000;
        store.seed(vec![key], Some(1));
        let service = service(store);

        let result = service.rotate_site_key(5, Duration::from_secs(100), false).unwrap();
        assert!(result.considered_sites.contains(&5));
        assert!(result.rotated.is_empty());
    }

    #[test]
    fn add_site_key_then_targeted_rotation_succeeds() {
        let store = MemoryKeyStore::new();
        let service = service(store);

        let first = service.add_site_key(5).unwrap();
        assert_eq!(first.id, 1);

        let rotated = service.rotate_site_key(5, Duration::ZERO, true).unwrap();
        assert_eq!(rotated.rotated.len(), 1);
        assert_eq!(rotated.rotated[0].id, 2);
    }
}
