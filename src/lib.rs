#![deny(unsafe_op_in_unsafe_fn)]

//! HTTP Digest Access Authentication core (RFC 2617 / RFC 7616).
//!
//! This crate implements the server side of Digest authentication for
//! embedded HTTP servers: challenge generation with self-authenticating
//! nonces, a fixed-size nonce/nonce-count tracking table that defeats
//! replays, and the full response verification pipeline. MD5 and SHA-256
//! with `qop="auth"` are supported; `auth-int` and the `-sess` variants are
//! not.
//!
//! The crate deliberately stops at the protocol core. The host server parses
//! headers and hands over raw parameter views (or uses
//! [`DigestParams::from_header`]), supplies the request method, decoded path
//! and raw query string, and turns verdicts into HTTP responses.
//!
//! # Nonce design
//!
//! A nonce is `HEX(H(ts ":" method ":" rnd ":" uri ":" realm))` followed by
//! 12 hex chars of a 48-bit millisecond timestamp. The hash is a MAC under
//! the server's random seed, so any nonce can be re-derived and validated
//! without per-nonce state; the tracking table exists only to enforce
//! nonce-count progress. Each table slot keeps the highest accepted counter
//! and a 64-bit bitmask of accepted counters below it, so pipelined requests
//! may complete out of order while every counter is accepted at most once.
//!
//! # Quick start
//!
//! ```ignore
//! use httpdigest::{
//!     Credential, DigestAlgorithm, DigestAuth, DigestAuthConfig, DigestParams, RequestInfo,
//! };
//!
//! let auth = DigestAuth::new(&DigestAuthConfig::default());
//! let request = RequestInfo { method: "GET", path: "/protected", query: "" };
//!
//! let params = DigestParams::from_header(authorization_header);
//! let verdict = auth.check_auth(
//!     &request,
//!     params.as_ref(),
//!     "realm",
//!     "user",
//!     Credential::Password("password"),
//!     DigestAlgorithm::Sha256,
//! );
//! if !verdict.is_ok() {
//!     let challenge = auth.generate_challenge(
//!         &request,
//!         "realm",
//!         "opaque",
//!         verdict.signals_stale(),
//!         DigestAlgorithm::Sha256,
//!     )?;
//!     // respond 401 with `WWW-Authenticate: {challenge}`
//! }
//! ```
//!
//! # Module organization
//!
//! - [`auth`] - Verifier pipeline and challenger
//! - [`algo`] - MD5 / SHA-256 digest facade
//! - [`params`] - Header parameter views and the quoted-string codec
//! - [`verdict`] - Verdict taxonomy with stable numeric codes
//! - [`config`] - Configuration
//! - [`clock`] - Monotonic clock abstraction

pub mod algo;
pub mod auth;
pub mod clock;
pub mod config;
pub mod params;
pub mod verdict;

mod nonce;
mod response;
mod table;

pub use algo::DigestAlgorithm;
pub use auth::{
    ChallengeError, Credential, DigestAuth, MAX_REALM_LENGTH, MAX_USERNAME_LENGTH, RequestInfo,
    UnescapeFn, extract_username,
};
pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub use config::{
    DEFAULT_NONCE_NC_SIZE, DEFAULT_NONCE_TIMEOUT_SECS, DigestAuthConfig, MIN_RANDOM_SEED_LEN,
};
pub use params::{DigestParams, MAX_PARAM_SIZE, ParamValue, unquote_value};
pub use verdict::Verdict;
