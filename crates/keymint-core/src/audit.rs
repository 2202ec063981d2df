//! Audit-trail integrity hashes.
//!
//! Mutating admin operations record a digest of every key they touch so the
//! audit trail can prove what was written. The digest covers the full
//! record including the secret bytes; it is logged, never returned to
//! callers.

use sha2::{Digest, Sha256};

use crate::key::EncryptionKey;

/// Lowercase-hex SHA-256 over the canonical JSON of the full key record.
pub fn audit_hash(key: &EncryptionKey) -> String {
    let record = serde_json::json!({
        "id": key.id,
        "secret": key.secret.as_bytes(),
        "site_id": key.site_id,
        "created": key.created,
        "activates": key.activates,
        "expires": key.expires,
    });

    let mut hasher = Sha256::new();
    hasher.update(record.to_string().as_bytes());

    hex::encode(hasher.finalize())
}
