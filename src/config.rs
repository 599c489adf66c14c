//! Configuration for the Digest authentication core.
//!
//! The struct deserializes straight out of a host's TOML configuration:
//!
//! ```toml
//! [digest_auth]
//! nonce_nc_size = 512
//! nonce_timeout_secs = 300
//! random_seed = "per-device secret"
//! ```

use rand::Rng;
use serde::Deserialize;

/// Default number of nonce tracking slots.
pub const DEFAULT_NONCE_NC_SIZE: usize = 256;

/// Default nonce validity period in seconds.
pub const DEFAULT_NONCE_TIMEOUT_SECS: u64 = 300;

/// Recommended minimum random seed length in bytes.
pub const MIN_RANDOM_SEED_LEN: usize = 8;

/// Settings for [`DigestAuth`](crate::DigestAuth).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestAuthConfig {
    /// Number of slots in the nonce tracking table, allocated once at
    /// start-up. Zero disables tracking: challenges are refused and every
    /// verification reports a stale nonce.
    pub nonce_nc_size: usize,

    /// How long an issued nonce stays valid, in seconds.
    pub nonce_timeout_secs: u64,

    /// Secret mixed into every nonce MAC. At least [`MIN_RANDOM_SEED_LEN`]
    /// bytes recommended; generated at start-up when absent.
    pub random_seed: Option<String>,
}

impl Default for DigestAuthConfig {
    fn default() -> Self {
        Self {
            nonce_nc_size: DEFAULT_NONCE_NC_SIZE,
            nonce_timeout_secs: DEFAULT_NONCE_TIMEOUT_SECS,
            random_seed: None,
        }
    }
}

impl DigestAuthConfig {
    /// Materialize the random seed, generating a fresh one when the host did
    /// not configure any.
    pub(crate) fn seed_bytes(&self) -> Vec<u8> {
        match &self.random_seed {
            Some(seed) => {
                if seed.len() < MIN_RANDOM_SEED_LEN {
                    tracing::warn!(
                        seed_len = seed.len(),
                        "digest auth random seed is shorter than the recommended {} bytes",
                        MIN_RANDOM_SEED_LEN
                    );
                }
                seed.clone().into_bytes()
            }
            None => {
                let mut rng = rand::rng();
                let bytes: [u8; 32] = rng.random();
                bytes.to_vec()
            }
        }
    }
}
