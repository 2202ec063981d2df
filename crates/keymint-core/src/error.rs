//! Engine error types.
//!
//! The engine never swallows or retries an error internally; every failure
//! bubbles to the caller, which maps it to a user-visible response. In
//! particular there is no automatic retry of storage commits - the contract
//! is at-most-once attempted commit per rotation invocation.

use thiserror::Error;

use crate::store::StoreError;

/// Errors from rotation and minting operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RotationError {
    /// No identifier space remains.
    ///
    /// The id base has reached the maximum representable value. Internal
    /// error; not retried, not recoverable without operator intervention.
    #[error("cannot allocate a new key id: id space exhausted")]
    KeyIdsExhausted,

    /// The caller asked for a site id outside the targetable range.
    ///
    /// Rejected-request condition: nothing was mutated and no id was
    /// consumed.
    #[error("invalid site id: {0}")]
    InvalidSiteId(i32),

    /// A targeted rotation matched zero sites in the current snapshot.
    ///
    /// Distinct from "matched but nothing needed rotation": the site has no
    /// keys at all under the selector, so there is nothing to rotate. A
    /// brand-new site gets its first key through the unconditional
    /// single-site add path instead.
    #[error("no keys found for site id: {0}")]
    NoKeysForSite(i32),

    /// A storage collaborator failed.
    ///
    /// On the commit path this means the whole mint batch was abandoned; no
    /// partial key list is ever left half-written because the commit call is
    /// the sole mutation point.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
