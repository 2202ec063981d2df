//! Encryption key lifecycle engine.
//!
//! Manages symmetric encryption keys for a multi-tenant identity service:
//! master keys, refresh keys, and per-site keys. The engine decides which
//! sites need a new key, allocates globally unique monotonically increasing
//! key identifiers that are never reused, computes activation and expiry
//! timestamps from a rotation policy, and commits the merged key set through
//! a storage collaborator in a single atomic call.
//!
//! # Architecture
//!
//! The engine is pure logic with no I/O of its own. All system resources are
//! injected at each call site:
//!
//! - [`Environment`]: wall-clock time and cryptographic randomness
//! - [`KeySnapshotSource`]: the committed key set and persisted high-water
//!   mark
//! - [`KeyStorage`]: the atomic replace-key-set operation
//!
//! Callers are responsible for mutual exclusion: every mutating entry point
//! assumes it runs while holding the process-wide admin write lock, and the
//! engine force-reloads the snapshot at the start of every mutation so a
//! rotation batch always observes all previously committed batches.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allocator;
pub mod audit;
pub mod env;
mod error;
pub mod key;
pub mod policy;
pub mod rotation;
pub mod store;

pub use allocator::next_key_id;
pub use audit::audit_hash;
pub use env::Environment;
pub use error::RotationError;
pub use key::{
    ADVERTISING_SITE_ID, EncryptionKey, KeyListing, KeySecret, MASTER_KEY_SITE_ID,
    REFRESH_KEY_SITE_ID, SECRET_LEN, is_valid_site_id,
};
pub use policy::{KeySchedule, PolicyError, RotationPolicy};
pub use rotation::{KeyRotator, KeySelector, RotationResult};
pub use store::{KeySnapshotSource, KeyStorage, MemoryKeyStore, StoreError};
