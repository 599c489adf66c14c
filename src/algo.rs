//! Digest primitive facade.
//!
//! Wraps the MD5 and SHA-256 hash implementations behind one context type so
//! the rest of the crate can compute digests without caring which algorithm
//! the challenge negotiated. A context is created per request and reused for
//! several independent hashes; finalizing automatically resets it for the
//! next computation.

use md5::{Digest, Md5};
use sha2::Sha256;

/// MD5 digest size in bytes.
pub(crate) const MD5_DIGEST_SIZE: usize = 16;

/// SHA-256 digest size in bytes.
pub(crate) const SHA256_DIGEST_SIZE: usize = 32;

/// Largest digest size supported (SHA-256 > MD5).
pub(crate) const MAX_DIGEST_SIZE: usize = SHA256_DIGEST_SIZE;

/// Hash algorithm used for challenges and response verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// RFC 2617 `MD5`.
    Md5,
    /// RFC 7616 `SHA-256`.
    #[default]
    Sha256,
    /// Let the server pick; resolves to SHA-256.
    Auto,
}

impl DigestAlgorithm {
    /// Collapse [`DigestAlgorithm::Auto`] to the concrete algorithm.
    pub(crate) fn resolve(self) -> DigestAlgorithm {
        match self {
            DigestAlgorithm::Auto => DigestAlgorithm::Sha256,
            other => other,
        }
    }

    /// Digest size in bytes.
    pub fn digest_size(self) -> usize {
        match self {
            DigestAlgorithm::Md5 => MD5_DIGEST_SIZE,
            DigestAlgorithm::Sha256 | DigestAlgorithm::Auto => SHA256_DIGEST_SIZE,
        }
    }

    /// Algorithm token as it appears in the `algorithm=` challenge parameter.
    pub fn token(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha256 | DigestAlgorithm::Auto => "SHA-256",
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

enum HashState {
    Md5(Md5),
    Sha256(Sha256),
}

/// Scratch state for one hash computation.
///
/// `update` feeds data into the current computation; `finalize_bin` /
/// `finalize_hex` produce the digest and leave the context re-initialized,
/// ready for the next independent hash.
pub(crate) struct DigestContext {
    state: HashState,
}

impl DigestContext {
    pub(crate) fn new(algorithm: DigestAlgorithm) -> Self {
        let state = match algorithm.resolve() {
            DigestAlgorithm::Md5 => HashState::Md5(Md5::new()),
            _ => HashState::Sha256(Sha256::new()),
        };
        Self { state }
    }

    pub(crate) fn algorithm(&self) -> DigestAlgorithm {
        match self.state {
            HashState::Md5(_) => DigestAlgorithm::Md5,
            HashState::Sha256(_) => DigestAlgorithm::Sha256,
        }
    }

    /// Digest size in bytes for this context.
    pub(crate) fn size(&self) -> usize {
        self.algorithm().digest_size()
    }

    /// Feed more data into the current computation.
    pub(crate) fn update(&mut self, data: impl AsRef<[u8]>) {
        match &mut self.state {
            HashState::Md5(h) => h.update(data.as_ref()),
            HashState::Sha256(h) => h.update(data.as_ref()),
        }
    }

    /// Finish the computation and return the binary digest; the context is
    /// reset for the next hash.
    pub(crate) fn finalize_bin(&mut self) -> DigestBytes {
        let mut out = DigestBytes {
            bytes: [0u8; MAX_DIGEST_SIZE],
            len: self.size(),
        };
        match &mut self.state {
            HashState::Md5(h) => {
                out.bytes[..MD5_DIGEST_SIZE].copy_from_slice(&h.finalize_reset());
            }
            HashState::Sha256(h) => {
                out.bytes[..SHA256_DIGEST_SIZE].copy_from_slice(&h.finalize_reset());
            }
        }
        out
    }

    /// Finish the computation and return the digest as lowercase hex; the
    /// context is reset for the next hash.
    pub(crate) fn finalize_hex(&mut self) -> String {
        hex_encode(&self.finalize_bin())
    }
}

/// A finalized digest value.
pub(crate) struct DigestBytes {
    bytes: [u8; MAX_DIGEST_SIZE],
    len: usize,
}

impl std::ops::Deref for DigestBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Encode bytes as lowercase hex.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
