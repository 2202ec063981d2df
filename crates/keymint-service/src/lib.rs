//! Production glue for the key lifecycle engine.
//!
//! Wraps [`keymint_core`]'s pure rotation logic with real resources:
//!
//! - [`RedbKeyStore`]: durable storage backed by Redb's ACID transactions
//! - [`SystemEnv`]: system wall clock and OS cryptographic RNG
//! - [`KeyAdminService`]: the admin-facing facade that serializes every
//!   mutating operation behind a process-wide [`WriteLock`]
//!
//! The `keymint` binary in this crate drives the facade from the command
//! line; an embedding service would call the facade directly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod redb_store;
mod service;
mod system_env;

pub use redb_store::RedbKeyStore;
pub use service::{KeyAdminService, WriteLock};
pub use system_env::SystemEnv;
