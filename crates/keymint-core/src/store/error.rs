//! Storage error types.

use thiserror::Error;

/// Errors from the storage collaborators.
///
/// Both variants propagate to the caller unchanged; the engine never retries
/// a storage operation (at-most-once commit per rotation).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// I/O error (file system, database, object store).
    ///
    /// May be transient, but retrying is the caller's decision, not the
    /// engine's.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization or deserialization failed.
    ///
    /// Indicates corrupt stored data or a format mismatch. Not transient.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
