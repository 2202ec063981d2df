//! Rotation planning and key minting.
//!
//! [`KeyRotator`] is the engine's entry point. It owns nothing but the
//! timing policies; the clock, randomness, and storage collaborators are
//! passed into each call so the same rotator works against any backend and
//! any (test or system) environment.
//!
//! Every mutating call assumes the caller holds the process-wide admin
//! write lock, and begins by force-reloading the snapshot so that each
//! rotation batch observes all previously committed batches.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::{
    allocator::next_key_id,
    env::Environment,
    error::RotationError,
    key::{ADVERTISING_SITE_ID, EncryptionKey, KeyListing, MASTER_KEY_SITE_ID,
        REFRESH_KEY_SITE_ID, is_valid_site_id},
    policy::{KeySchedule, RotationPolicy},
    store::{KeySnapshotSource, KeyStorage},
};

/// Which sites a rotation request applies to.
///
/// Only three selection shapes occur in practice, so this is a closed enum
/// rather than an arbitrary predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySelector {
    /// Exactly one site id (targeted rotation).
    Site(i32),
    /// The two reserved key classes: master and refresh.
    MasterAndRefresh,
    /// Every tenant site plus the shared advertising site.
    AllSites,
}

impl KeySelector {
    /// Whether a key owned by `site_id` falls under this selector.
    pub fn matches(&self, site_id: i32) -> bool {
        match self {
            Self::Site(selected) => site_id == *selected,
            Self::MasterAndRefresh => {
                site_id == MASTER_KEY_SITE_ID || site_id == REFRESH_KEY_SITE_ID
            },
            Self::AllSites => is_valid_site_id(site_id) || site_id == ADVERTISING_SITE_ID,
        }
    }
}

/// Outcome of a rotation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationResult {
    /// Site ids that matched the selector in the snapshot, whether or not
    /// they were rotated. Lets callers distinguish "site has no keys at
    /// all" (absent here) from "site has keys but none needed rotation"
    /// (present here, nothing in `rotated`).
    pub considered_sites: BTreeSet<i32>,

    /// Newly minted keys, in mint order. Empty if no site needed rotation.
    pub rotated: Vec<EncryptionKey>,
}

/// Rotation planner and key minter.
#[derive(Debug, Clone)]
pub struct KeyRotator {
    schedule: KeySchedule,
}

impl KeyRotator {
    /// Create a rotator with the given class policies.
    pub fn new(schedule: KeySchedule) -> Self {
        Self { schedule }
    }

    /// The configured class policies.
    pub fn schedule(&self) -> &KeySchedule {
        &self.schedule
    }

    fn policy_for(&self, selector: KeySelector) -> RotationPolicy {
        match selector {
            KeySelector::MasterAndRefresh => self.schedule.master,
            KeySelector::Site(_) | KeySelector::AllSites => self.schedule.site,
        }
    }

    /// Rotate every selected site whose current key is older than
    /// `min_age` (or every selected site with a key at all, if `force`).
    ///
    /// A site's "current" key is the one with the maximum `activates`
    /// timestamp among its keys under the selector. Sites with zero keys
    /// under the selector are never minted for by this path - a missing key
    /// does not trigger rotation; brand-new sites go through
    /// [`KeyRotator::add_site_key`].
    ///
    /// If no site is selected the call is an idempotent no-op: nothing is
    /// committed and no id is consumed.
    pub fn rotate<E, S>(
        &self,
        selector: KeySelector,
        min_age: Duration,
        force: bool,
        env: &E,
        store: &S,
    ) -> Result<RotationResult, RotationError>
    where
        E: Environment,
        S: KeySnapshotSource + KeyStorage,
    {
        store.reload()?;
        let keys = store.active_keys()?;

        // Report back which sites were considered, rotated or not.
        let considered_sites: BTreeSet<i32> = keys
            .iter()
            .map(|key| key.site_id)
            .filter(|site_id| selector.matches(*site_id))
            .collect();

        let now = env.now_millis();
        let activates_threshold = now - min_age.as_millis() as i64;

        // Per selected site, the key with the maximum activation time is
        // the site's current key; only sites whose current key is old
        // enough (or force) rotate.
        let mut current: BTreeMap<i32, &EncryptionKey> = BTreeMap::new();
        for key in keys.iter().filter(|key| selector.matches(key.site_id)) {
            current
                .entry(key.site_id)
                .and_modify(|existing| {
                    if key.activates >= existing.activates {
                        *existing = key;
                    }
                })
                .or_insert(key);
        }

        let due_sites: Vec<i32> = current
            .values()
            .filter(|key| force || key.activates < activates_threshold)
            .map(|key| key.site_id)
            .collect();

        tracing::debug!(
            ?selector,
            considered = considered_sites.len(),
            due = due_sites.len(),
            force,
            "rotation planned"
        );

        if due_sites.is_empty() {
            return Ok(RotationResult { considered_sites, rotated: Vec::new() });
        }

        let rotated = self.mint_keys(&due_sites, self.policy_for(selector), env, store)?;

        Ok(RotationResult { considered_sites, rotated })
    }

    /// Mint exactly one new key for `site_id`, unconditionally.
    ///
    /// Bypasses the age/force selection logic; used when a brand-new site
    /// has no key at all. Forces a snapshot reload first.
    pub fn add_site_key<E, S>(
        &self,
        site_id: i32,
        env: &E,
        store: &S,
    ) -> Result<EncryptionKey, RotationError>
    where
        E: Environment,
        S: KeySnapshotSource + KeyStorage,
    {
        store.reload()?;

        let mut minted = self.mint_keys(&[site_id], self.schedule.site, env, store)?;

        debug_assert_eq!(minted.len(), 1);
        minted.pop().ok_or(RotationError::NoKeysForSite(site_id))
    }

    /// The committed key set as presentation records, ordered by
    /// `(site_id, activates)`. Secrets are never included.
    pub fn list_keys<S>(&self, store: &S) -> Result<Vec<KeyListing>, RotationError>
    where
        S: KeySnapshotSource,
    {
        let mut keys = store.active_keys()?;
        keys.sort_by_key(|key| (key.site_id, key.activates));

        Ok(keys.iter().map(KeyListing::from).collect())
    }

    /// Mint one key per site id and commit the extended key set.
    ///
    /// Rotation is additive: the full current snapshot (sorted by id) is
    /// the base list to extend, prior keys are never replaced or deleted.
    /// `created` is captured once so the whole batch is coherent, and the
    /// single `commit` at the end is the only durability boundary - any
    /// failure before or during it leaves no partial state behind.
    fn mint_keys<E, S>(
        &self,
        site_ids: &[i32],
        policy: RotationPolicy,
        env: &E,
        store: &S,
    ) -> Result<Vec<EncryptionKey>, RotationError>
    where
        E: Environment,
        S: KeySnapshotSource + KeyStorage,
    {
        if site_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut keys = store.active_keys()?;
        keys.sort_by_key(|key| key.id);

        let first_id = next_key_id(&keys, store.high_water_mark()?)?;

        let created = env.now_millis();
        let activates = created + policy.activates_in_millis();
        let expires = activates + policy.expires_after_millis();

        let mut minted = Vec::with_capacity(site_ids.len());
        let mut last_id = first_id;

        for (index, &site_id) in site_ids.iter().enumerate() {
            let id = first_id
                .checked_add(index as i32)
                .ok_or(RotationError::KeyIdsExhausted)?;

            let key = EncryptionKey {
                id,
                secret: env.generate_secret(),
                site_id,
                created,
                activates,
                expires,
            };

            tracing::info!(key_id = id, site_id, activates, expires, "minted key");

            keys.push(key.clone());
            minted.push(key);
            last_id = id;
        }

        store.commit(&keys, last_id)?;

        Ok(minted)
    }
}
