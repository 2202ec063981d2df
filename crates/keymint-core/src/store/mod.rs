//! Storage collaborators for the key engine.
//!
//! Two trait seams, matching the split between the snapshot provider and the
//! writer in the surrounding system:
//!
//! - [`KeySnapshotSource`]: the committed key set plus the persisted
//!   high-water-mark identifier
//! - [`KeyStorage`]: the atomic replace-key-set operation
//!
//! Both traits are synchronous. Neither provides compare-and-swap semantics;
//! correctness relies on the caller holding the process-wide admin write
//! lock for the whole reload-plan-mint-commit sequence.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryKeyStore;

use crate::key::EncryptionKey;

/// Read side: the latest committed key snapshot.
///
/// Must be Clone + Send + Sync; implementations typically share internal
/// state via Arc, so clones observe the same committed snapshot.
pub trait KeySnapshotSource: Clone + Send + Sync + 'static {
    /// Force a re-read from durable storage.
    ///
    /// Rotation never trusts a cached in-process snapshot: concurrent
    /// writers elsewhere may have advanced the committed state, so every
    /// mutation calls this first (inside the write lock).
    fn reload(&self) -> Result<(), StoreError>;

    /// The committed key set, in no particular order.
    fn active_keys(&self) -> Result<Vec<EncryptionKey>, StoreError>;

    /// The largest key id ever issued, persisted independently of the live
    /// key set. `None` if no id has ever been recorded.
    ///
    /// This is what prevents id reuse across delete-then-recreate cycles
    /// where a retired key's id is no longer visible in the snapshot.
    fn high_water_mark(&self) -> Result<Option<i32>, StoreError>;
}

/// Write side: atomic replacement of the committed key set.
pub trait KeyStorage: Clone + Send + Sync + 'static {
    /// Replace the whole committed key set and high-water mark in one
    /// durable operation.
    ///
    /// This call is the single durability boundary of a mint batch: if it
    /// fails, no partial state has been externally observed.
    fn commit(&self, keys: &[EncryptionKey], high_water_mark: i32) -> Result<(), StoreError>;
}
