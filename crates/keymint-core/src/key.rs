//! Key records and site-id classification.
//!
//! An [`EncryptionKey`] is immutable once minted: rotation mints a new key
//! with a fresh id, it never mutates an existing record. Retirement is
//! implicit - a key stops being a site's current key once a newer one
//! activates, but it stays in the committed set.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Reserved site id for the master key class.
pub const MASTER_KEY_SITE_ID: i32 = -1;

/// Reserved site id for the refresh-token key class.
pub const REFRESH_KEY_SITE_ID: i32 = -2;

/// Shared advertising site id. Not a tenant, but always eligible for
/// predicate-driven site-key rotation.
pub const ADVERTISING_SITE_ID: i32 = 2;

/// Length in bytes of every key secret.
pub const SECRET_LEN: usize = 32;

/// Whether `site_id` identifies a regular tenant site.
///
/// Ids at or below [`ADVERTISING_SITE_ID`] are reserved (master, refresh,
/// advertising, and historical placeholders).
pub fn is_valid_site_id(site_id: i32) -> bool {
    site_id > ADVERTISING_SITE_ID
}

/// Opaque key secret, zeroed on drop.
///
/// `Debug` is redacted so secrets never reach logs. The raw bytes are only
/// serialized on the storage path and into audit-trail hashes, never into
/// listings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeySecret(Vec<u8>);

impl KeySecret {
    /// Wrap raw secret bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Secret length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for KeySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeySecret({} bytes)", self.0.len())
    }
}

/// A symmetric encryption key, immutable once minted.
///
/// # Invariants
///
/// - `id` is unique and strictly increasing across the system's lifetime,
///   never reused even after the key is dropped from the committed set
/// - `created <= activates < expires`
/// - `secret` is generated exactly once for a given id
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKey {
    /// Unique positive key identifier.
    pub id: i32,
    /// Secret bytes, [`SECRET_LEN`] long for minted keys.
    pub secret: KeySecret,
    /// Owning site, or a reserved sentinel id.
    pub site_id: i32,
    /// When the key was minted (ms since epoch).
    pub created: i64,
    /// When the key becomes usable (ms since epoch).
    pub activates: i64,
    /// When the key stops being usable (ms since epoch).
    pub expires: i64,
}

/// Presentation record for a key: everything except the secret.
///
/// This is the exact wire shape for listing and rotation responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyListing {
    /// Key identifier.
    pub id: i32,
    /// Owning site (negative for reserved classes).
    pub site_id: i32,
    /// Minting time, ms since epoch.
    pub created: i64,
    /// Activation time, ms since epoch.
    pub activates: i64,
    /// Expiry time, ms since epoch.
    pub expires: i64,
}

impl From<&EncryptionKey> for KeyListing {
    fn from(key: &EncryptionKey) -> Self {
        Self {
            id: key.id,
            site_id: key.site_id,
            created: key.created,
            activates: key.activates,
            expires: key.expires,
        }
    }
}
