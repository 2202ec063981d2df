//! Production environment using the system clock and OS RNG.

use keymint_core::Environment;

/// Production environment: `SystemTime` wall clock plus `getrandom` for
/// cryptographic randomness.
///
/// # Security
///
/// `getrandom` provides OS-level cryptographic randomness (/dev/urandom on
/// Linux, `BCryptGenRandom` on Windows), which is what key secrets require.
///
/// # Panics
///
/// Panics if the OS RNG fails or the system clock is before the Unix epoch.
/// Both indicate OS-level breakage a key service cannot operate under.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn now_millis(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_millis() as i64
    }

    #[allow(clippy::expect_used)]
    fn fill_random(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - secrets cannot be minted");
    }
}

#[cfg(test)]
mod tests {
    use keymint_core::SECRET_LEN;

    use super::*;

    #[test]
    fn clock_is_past_2020() {
        let env = SystemEnv::new();
        // 2020-01-01 in ms since epoch.
        assert!(env.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn secrets_are_random() {
        let env = SystemEnv::new();

        let first = env.generate_secret();
        let second = env.generate_secret();

        assert_eq!(first.len(), SECRET_LEN);
        // Extremely unlikely to be equal if random.
        assert_ne!(first, second);
    }
}
