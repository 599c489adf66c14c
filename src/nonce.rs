//! Self-authenticating server nonce codec.
//!
//! A nonce is `HEX(H(ts6 ":" method ":" rnd ":" uri ":" realm))` followed by
//! 12 hex chars of the 48-bit millisecond timestamp `ts6`. The hash acts as a
//! MAC over the timestamp and request identity under the server's random
//! seed, so the verifier can recompute the whole nonce without per-nonce
//! state; the tracking table only binds counter progress.

use crate::algo::{
    DigestAlgorithm, DigestContext, MD5_DIGEST_SIZE, SHA256_DIGEST_SIZE, hex_encode,
};
use crate::params::parse_hex_u64;

/// Size of the binary nonce timestamp, in bytes.
const TIMESTAMP_BIN_SIZE: usize = 6;

/// Size of the printed nonce timestamp, in chars.
pub(crate) const TIMESTAMP_CHARS: usize = TIMESTAMP_BIN_SIZE * 2;

/// Longest nonce this server can issue (SHA-256).
pub(crate) const MAX_NONCE_LENGTH: usize = nonce_length(SHA256_DIGEST_SIZE);

/// Standard nonce length for a given digest size, not counting any
/// terminator: the hex digest plus the printed timestamp.
pub(crate) const fn nonce_length(digest_size: usize) -> usize {
    digest_size * 2 + TIMESTAMP_CHARS
}

/// Mask a millisecond counter down to the 48 bits carried in the nonce.
///
/// A 48-bit millisecond counter wraps roughly every 8900 years, which is
/// plenty to keep timestamp differences meaningful.
pub(crate) const fn trim_timestamp(value: u64) -> u64 {
    value & ((1u64 << (TIMESTAMP_BIN_SIZE * 8)) - 1)
}

/// Build the server nonce for the given timestamp and request identity.
pub(crate) fn calculate_nonce(
    timestamp: u64,
    method: &str,
    random: &[u8],
    uri: &str,
    realm: &str,
    algorithm: DigestAlgorithm,
) -> String {
    let ts = trim_timestamp(timestamp).to_be_bytes();
    let ts = &ts[ts.len() - TIMESTAMP_BIN_SIZE..];

    let mut ctx = DigestContext::new(algorithm);
    ctx.update(ts);
    ctx.update(":");
    ctx.update(method);
    ctx.update(":");
    ctx.update(random);
    ctx.update(":");
    ctx.update(uri);
    ctx.update(":");
    ctx.update(realm);

    let mut nonce = ctx.finalize_hex();
    nonce.push_str(&hex_encode(ts));
    nonce
}

/// Extract the 48-bit timestamp embedded in the tail of `nonce`.
///
/// Succeeds only when the nonce has one of the two standard lengths and the
/// last [`TIMESTAMP_CHARS`] chars are all hex digits.
pub(crate) fn extract_timestamp(nonce: &str) -> Option<u64> {
    let len = nonce.len();
    if len != nonce_length(MD5_DIGEST_SIZE) && len != nonce_length(SHA256_DIGEST_SIZE) {
        return None;
    }
    // `get` rather than an index: the submission may contain multi-byte
    // characters, which also disqualify the timestamp field.
    let tail = nonce.get(len - TIMESTAMP_CHARS..)?;
    parse_hex_u64(tail)
}
