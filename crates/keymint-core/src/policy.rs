//! Rotation timing policies.
//!
//! A policy pairs an activation delay with a validity window. Master and
//! refresh keys share one policy, site keys (including the advertising site)
//! share another. Policy validation happens at construction; a policy whose
//! activation delay does not leave a nonzero validity window is a fatal
//! startup error.

use std::time::Duration;

use thiserror::Error;

/// Policy construction errors. Fatal at startup - fix configuration and
/// restart.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The activation delay must be strictly less than the expiry delay,
    /// otherwise a key would expire before (or exactly when) it activates.
    #[error(
        "activation delay {activates_in:?} must be less than expiry delay {expires_after:?}"
    )]
    ActivationOutlivesExpiry {
        /// Configured activation delay.
        activates_in: Duration,
        /// Configured expiry delay.
        expires_after: Duration,
    },
}

/// Timing policy for one key class.
///
/// Minting computes `activates = created + activates_in` and
/// `expires = activates + expires_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    activates_in: Duration,
    expires_after: Duration,
}

impl RotationPolicy {
    /// Create a policy, rejecting `activates_in >= expires_after`.
    pub fn new(activates_in: Duration, expires_after: Duration) -> Result<Self, PolicyError> {
        if activates_in >= expires_after {
            return Err(PolicyError::ActivationOutlivesExpiry { activates_in, expires_after });
        }

        Ok(Self { activates_in, expires_after })
    }

    /// Activation delay in milliseconds.
    pub fn activates_in_millis(&self) -> i64 {
        self.activates_in.as_millis() as i64
    }

    /// Expiry delay in milliseconds, counted from activation.
    pub fn expires_after_millis(&self) -> i64 {
        self.expires_after.as_millis() as i64
    }
}

/// The rotation policies for both key classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySchedule {
    /// Policy for master and refresh keys.
    pub master: RotationPolicy,
    /// Policy for site keys and the advertising site.
    pub site: RotationPolicy,
}

impl KeySchedule {
    /// Pair the two class policies.
    pub fn new(master: RotationPolicy, site: RotationPolicy) -> Self {
        Self { master, site }
    }
}

impl Default for KeySchedule {
    fn default() -> Self {
        // Both pairs satisfy activates_in < expires_after, so construction
        // cannot fail.
        Self {
            master: RotationPolicy {
                activates_in: Duration::from_secs(3_600),
                expires_after: Duration::from_secs(7_200),
            },
            site: RotationPolicy {
                activates_in: Duration::from_secs(36_000),
                expires_after: Duration::from_secs(72_000),
            },
        }
    }
}
