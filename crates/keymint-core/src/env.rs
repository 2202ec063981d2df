//! Environment abstraction for deterministic testing.
//!
//! Decouples the engine from system resources (wall-clock time, randomness).
//! Production wires in the system clock and OS RNG; tests supply a fixed
//! instant and a deterministic byte source so minted timestamps and secrets
//! are exactly assertable.

use crate::key::{KeySecret, SECRET_LEN};

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// - `now_millis()` never decreases within a single execution context
/// - `fill_random()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time, milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Fills the provided buffer with random bytes.
    fn fill_random(&self, buffer: &mut [u8]);

    /// Generates a fresh [`SECRET_LEN`]-byte key secret.
    fn generate_secret(&self) -> KeySecret {
        let mut buffer = vec![0u8; SECRET_LEN];
        self.fill_random(&mut buffer);
        KeySecret::new(buffer)
    }
}
