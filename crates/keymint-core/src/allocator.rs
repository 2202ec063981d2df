//! Key identifier allocation.
//!
//! Identifiers are globally unique and strictly increasing across the
//! system's lifetime. The allocation base folds in the persisted high-water
//! mark so that ids of keys deleted from the visible snapshot are never
//! reissued.

use crate::{error::RotationError, key::EncryptionKey};

/// First free key id given the visible snapshot and the persisted
/// high-water mark.
///
/// Called once per mint batch; a batch of size N takes ids
/// `base + 1 ..= base + N` in the iteration order of the site list handed
/// to the minter.
///
/// # Errors
///
/// [`RotationError::KeyIdsExhausted`] if the base has reached [`i32::MAX`]
/// and no further id can be issued.
pub fn next_key_id(
    keys: &[EncryptionKey],
    high_water_mark: Option<i32>,
) -> Result<i32, RotationError> {
    let max_visible = keys.iter().map(|key| key.id).max().unwrap_or(0);
    let base = max_visible.max(high_water_mark.unwrap_or(0));

    if base == i32::MAX {
        return Err(RotationError::KeyIdsExhausted);
    }

    Ok(base + 1)
}
