//! End-to-end rotation flows over the durable store.
//!
//! Exercises the full reload-plan-mint-commit path against Redb, including
//! process-restart persistence of the id high-water mark.

use std::time::Duration;

use keymint_core::{
    EncryptionKey, KeySchedule, KeySecret, KeyStorage, MASTER_KEY_SITE_ID, REFRESH_KEY_SITE_ID,
    SECRET_LEN,
};
use keymint_service::{KeyAdminService, RedbKeyStore, SystemEnv, WriteLock};
use tempfile::tempdir;

fn service(store: RedbKeyStore) -> KeyAdminService<SystemEnv, RedbKeyStore> {
    KeyAdminService::new(SystemEnv::new(), store, KeySchedule::default(), WriteLock::new())
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
fn ids_stay_monotonic_across_restarts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keys.redb");

    {
        let service = service(RedbKeyStore::open(&path).unwrap());
        assert_eq!(service.add_site_key(5).unwrap().id, 1);
        let rotated = service.rotate_site_key(5, Duration::ZERO, true).unwrap();
        assert_eq!(rotated.rotated[0].id, 2);
    }

    // "Restart": a fresh store over the same database file.
    let service = service(RedbKeyStore::open(&path).unwrap());

    let listings = service.list_keys().unwrap();
    assert_eq!(listings.len(), 2);

    let rotated = service.rotate_site_key(5, Duration::ZERO, true).unwrap();
    assert_eq!(rotated.rotated[0].id, 3);
}

#[test]
fn deleted_key_ids_survive_restart_and_are_not_reissued() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keys.redb");

    {
        let store = RedbKeyStore::open(&path).unwrap();
        let service = service(store.clone());

        for site_id in [5, 6, 7] {
            service.add_site_key(site_id).unwrap();
        }

        // Housekeeping deletes key 3 from the committed set but keeps the
        // high-water mark.
        store.commit(&[stale_key(1, 5), stale_key(2, 6)], 3).unwrap();
    }

    let service = service(RedbKeyStore::open(&path).unwrap());
    assert_eq!(service.add_site_key(8).unwrap().id, 4);
}

#[test]
fn master_rotation_over_durable_store() {
    let dir = tempdir().unwrap();
    let store = RedbKeyStore::open(dir.path().join("keys.redb")).unwrap();

    store
        .commit(
            &[
                stale_key(11, MASTER_KEY_SITE_ID),
                stale_key(12, 5),
                stale_key(13, REFRESH_KEY_SITE_ID),
            ],
            13,
        )
        .unwrap();

    let service = service(store);
    let result = service.rotate_master_keys(Duration::from_secs(100), false).unwrap();

    assert_eq!(result.rotated.len(), 2);
    let mut ids: Vec<i32> = result.rotated.iter().map(|key| key.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![14, 15]);

    // Site 5 untouched, everything listed.
    let listings = service.list_keys().unwrap();
    assert_eq!(listings.len(), 5);
    assert!(listings.iter().any(|listing| listing.id == 12 && listing.site_id == 5));
}

#[test]
fn rotate_all_sites_skips_reserved_classes() {
    let dir = tempdir().unwrap();
    let store = RedbKeyStore::open(dir.path().join("keys.redb")).unwrap();

    store
        .commit(
            &[stale_key(1, MASTER_KEY_SITE_ID), stale_key(2, 5), stale_key(3, 6)],
            3,
        )
        .unwrap();

    let service = service(store);
    let result = service.rotate_all_site_keys(Duration::from_secs(100), false).unwrap();

    let sites: Vec<i32> = {
        let mut sites: Vec<i32> = result.rotated.iter().map(|key| key.site_id).collect();
        sites.sort_unstable();
        sites
    };
    assert_eq!(sites, vec![5, 6]);
}
