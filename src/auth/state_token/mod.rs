//! Single-use, request-bound state tokens for the OAuth2 redirect.
//!
//! The issuer stores the requester's [`Fingerprint`](super::fingerprint::Fingerprint)
//! under a random key with a TTL and hands out `encrypt(key)`. The validator
//! reverses that, atomically consumes the record and compares fingerprints.

mod issuer;
mod validator;

pub use issuer::StateTokenIssuer;
pub use validator::StateTokenValidator;

use std::time::Duration;

pub(crate) const KEY_PREFIX: &str = "STATE_TOKEN";
const DEFAULT_TTL_MINUTES: u64 = 5;

#[derive(Clone, Copy, Debug)]
pub struct StateTokenConfig {
    ttl: Duration,
}

impl Default for StateTokenConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTokenConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_MINUTES * 60),
        }
    }

    #[must_use]
    pub const fn with_ttl_minutes(mut self, minutes: u64) -> Self {
        self.ttl = Duration::from_secs(minutes.saturating_mul(60));
        self
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}
