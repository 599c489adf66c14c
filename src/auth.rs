//! Digest authentication verifier and challenger.
//!
//! [`DigestAuth`] owns the per-daemon state the protocol needs: the nonce
//! tracking table, the random seed mixed into every nonce MAC, the clock and
//! the nonce validity window. Verification and challenge generation run on
//! the serving thread; the table mutex is the only synchronisation point.
//!
//! # Example
//!
//! ```
//! use httpdigest::{
//!     Credential, DigestAlgorithm, DigestAuth, DigestAuthConfig, DigestParams, RequestInfo,
//! };
//!
//! let auth = DigestAuth::new(&DigestAuthConfig::default());
//! let request = RequestInfo { method: "GET", path: "/snapshot", query: "" };
//!
//! // 401 with a fresh challenge:
//! let challenge = auth
//!     .generate_challenge(&request, "camera", "opaque-token", false, DigestAlgorithm::Sha256)
//!     .unwrap();
//!
//! // Later, when the client replays the challenge:
//! let header = r#"Digest username="admin", realm="camera", ..."#;
//! if let Some(params) = DigestParams::from_header(header) {
//!     let verdict = auth.check_auth(
//!         &request,
//!         Some(&params),
//!         "camera",
//!         "admin",
//!         Credential::Password("secret"),
//!         DigestAlgorithm::Sha256,
//!     );
//! }
//! ```

use std::sync::Arc;

use constant_time_eq::constant_time_eq;
use thiserror::Error;
use tracing::{debug, warn};

use crate::algo::{DigestAlgorithm, DigestContext};
use crate::clock::{MonotonicClock, SystemClock};
use crate::config::DigestAuthConfig;
use crate::nonce::{calculate_nonce, extract_timestamp, trim_timestamp};
use crate::params::{DigestParams, Unquoted, param_equals, parse_hex_u64, quote, unquote_param};
use crate::response::{calculate_response, ha1_from_digest, ha1_from_password};
use crate::table::{NonceNcCheck, NonceTable};
use crate::verdict::Verdict;

/// Maximum length of a caller-supplied username.
pub const MAX_USERNAME_LENGTH: usize = 128;

/// Maximum length of a caller-supplied realm.
pub const MAX_REALM_LENGTH: usize = 256;

/// Maximum length of the client's `response` field.
const MAX_AUTH_RESPONSE_LENGTH: usize = 256;

/// Maximum length of the client's `cnonce` field.
const MAX_CLIENT_NONCE_LENGTH: usize = 128;

/// Maximum length of the client's `qop` field.
const MAX_QOP_LENGTH: usize = 15;

/// Maximum length of the client's `nc` field.
const MAX_NC_LENGTH: usize = 20;

/// Largest artificial timestamp jumpback used to dodge slot collisions.
const JUMPBACK_MAX: u64 = 0x7f;

/// Callback applied to the client-supplied `uri` (and its arguments) before
/// comparison with the request target. Hosts with their own URL decoding
/// rules install a matching callback; it must be idempotent on
/// already-decoded input.
pub type UnescapeFn = Arc<dyn Fn(&mut String) + Send + Sync>;

/// The parts of the HTTP request the verifier and challenger consume.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    /// Request method, e.g. `GET`.
    pub method: &'a str,
    /// Request path after URL decoding, without the query string.
    pub path: &'a str,
    /// Raw query string without the leading `?`; empty when absent.
    pub query: &'a str,
}

/// Caller-supplied credential material for one verification.
#[derive(Clone, Copy)]
pub enum Credential<'a> {
    /// Cleartext password; H(A1) is computed on the fly.
    Password(&'a str),
    /// Precomputed binary `H(username:realm:password)`. The length must
    /// match the digest size of the algorithm in use.
    Ha1Digest(&'a [u8]),
}

impl std::fmt::Debug for Credential<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Credential::Password(..)"),
            Credential::Ha1Digest(_) => f.write_str("Credential::Ha1Digest(..)"),
        }
    }
}

/// Challenge generation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChallengeError {
    /// The nonce tracking table has zero slots; no challenge the server
    /// issues could ever verify.
    #[error("nonce tracking is disabled (table size is zero)")]
    TrackingDisabled,
}

/// HTTP Digest authentication verifier and challenger.
pub struct DigestAuth {
    table: NonceTable,
    random: Vec<u8>,
    nonce_timeout_ms: u64,
    clock: Arc<dyn MonotonicClock>,
    unescape: UnescapeFn,
}

impl DigestAuth {
    /// Create an authenticator with the production clock and the built-in
    /// percent-decoding unescape callback.
    pub fn new(config: &DigestAuthConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create an authenticator driven by a caller-supplied clock.
    pub fn with_clock(config: &DigestAuthConfig, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            table: NonceTable::new(config.nonce_nc_size),
            random: config.seed_bytes(),
            nonce_timeout_ms: config.nonce_timeout_secs.saturating_mul(1000),
            clock,
            unescape: Arc::new(percent_unescape),
        }
    }

    /// Replace the URL-unescape callback applied to the client-supplied
    /// `uri` before comparison.
    pub fn with_unescape(mut self, unescape: UnescapeFn) -> Self {
        self.unescape = unescape;
        self
    }

    /// Verify a client's Digest submission against the expected credentials.
    ///
    /// Checks run in a fixed order and the first failure decides the
    /// verdict: header presence, username, realm, nonce (timestamp
    /// freshness, then the embedded MAC), cnonce, qop, nc, response
    /// presence, replay tracking, URI, and finally the response digest.
    ///
    /// # Panics
    ///
    /// Panics when a [`Credential::Ha1Digest`] length does not match the
    /// digest size of `algorithm` — an API misuse, not a client failure.
    pub fn check_auth(
        &self,
        request: &RequestInfo<'_>,
        params: Option<&DigestParams<'_>>,
        realm: &str,
        username: &str,
        credential: Credential<'_>,
        algorithm: DigestAlgorithm,
    ) -> Verdict {
        let algorithm = algorithm.resolve();
        if let Credential::Ha1Digest(digest) = credential {
            assert_eq!(
                digest.len(),
                algorithm.digest_size(),
                "precomputed credential digest does not match the {algorithm} digest size",
            );
        }

        let Some(params) = params else {
            return Verdict::WrongHeader;
        };
        if username.len() > MAX_USERNAME_LENGTH || realm.len() > MAX_REALM_LENGTH {
            return Verdict::Error;
        }

        let Some(client_username) = params.username else {
            return Verdict::WrongHeader;
        };
        if !param_equals(client_username, username) {
            return Verdict::WrongUsername;
        }

        let Some(client_realm) = params.realm else {
            return Verdict::WrongHeader;
        };
        if !param_equals(client_realm, realm) {
            return Verdict::WrongRealm;
        }

        let nonce = match unquote_param(params.nonce) {
            Unquoted::Missing | Unquoted::TooLarge => return Verdict::WrongHeader,
            Unquoted::Value(v) if v.is_empty() => return Verdict::NonceWrong,
            Unquoted::Value(v) => v,
        };
        let Some(nonce_time) = extract_timestamp(&nonce) else {
            debug!("digest auth failed: invalid nonce timestamp format");
            return Verdict::NonceWrong;
        };
        // First-level vetting: reject by age before touching anything else.
        let now = self.clock.now_ms();
        if trim_timestamp(now.wrapping_sub(nonce_time)) > self.nonce_timeout_ms {
            return Verdict::NonceStale;
        }
        // Second-level vetting: the timestamp may be fabricated, but without
        // the random seed a matching hash part is out of reach.
        let expected_nonce = calculate_nonce(
            nonce_time,
            request.method,
            &self.random,
            request.path,
            realm,
            algorithm,
        );
        if expected_nonce != nonce.as_ref() {
            return Verdict::NonceWrong;
        }

        let cnonce = match unquote_param(params.cnonce) {
            Unquoted::Missing | Unquoted::TooLarge => return Verdict::WrongHeader,
            Unquoted::Value(v) if v.is_empty() => return Verdict::WrongHeader,
            Unquoted::Value(v) => v,
        };
        if cnonce.len() > MAX_CLIENT_NONCE_LENGTH {
            return Verdict::Error;
        }

        let qop = match unquote_param(params.qop) {
            Unquoted::Missing | Unquoted::TooLarge => return Verdict::WrongHeader,
            Unquoted::Value(v) => v,
        };
        if qop.len() > MAX_QOP_LENGTH {
            return Verdict::Error;
        }
        if !qop.is_empty() && qop.as_ref() != "auth" {
            return Verdict::WrongHeader;
        }

        let nc_field = match unquote_param(params.nc) {
            Unquoted::Missing | Unquoted::TooLarge => return Verdict::WrongHeader,
            Unquoted::Value(v) if v.is_empty() => return Verdict::WrongHeader,
            Unquoted::Value(v) => v,
        };
        if nc_field.len() > MAX_NC_LENGTH {
            return Verdict::Error;
        }
        let Some(nc) = parse_hex_u64(&nc_field) else {
            debug!("digest auth failed: invalid nc format");
            return Verdict::WrongHeader;
        };
        if nc == 0 {
            debug!("digest auth failed: invalid nc value");
            return Verdict::WrongHeader;
        }

        let response = match unquote_param(params.response) {
            Unquoted::Missing | Unquoted::TooLarge => return Verdict::WrongHeader,
            Unquoted::Value(v) if v.is_empty() => return Verdict::WrongHeader,
            Unquoted::Value(v) => v,
        };
        if response.len() > MAX_AUTH_RESPONSE_LENGTH {
            return Verdict::Error;
        }

        match self.table.check(&expected_nonce, nonce_time, nc) {
            NonceNcCheck::Stale => {
                warn!(
                    "stale nonce received; if this happens a lot, consider increasing \
                     the nonce table size"
                );
                return Verdict::NonceStale;
            }
            NonceNcCheck::Wrong => {
                warn!(
                    "technically valid nonce that was not issued by this server; \
                     this may indicate an attack attempt"
                );
                return Verdict::NonceWrong;
            }
            NonceNcCheck::Ok => {}
        }

        let uri = match unquote_param(params.uri) {
            Unquoted::Missing | Unquoted::TooLarge => return Verdict::WrongHeader,
            Unquoted::Value(v) if v.is_empty() => return Verdict::WrongHeader,
            Unquoted::Value(v) => v,
        };
        if !self.uri_matches(&uri, request) {
            return Verdict::WrongUri;
        }

        // The raw uri parameter, not the normalized copy, enters H(A2).
        let mut ctx = DigestContext::new(algorithm);
        let ha1 = match credential {
            Credential::Password(password) => ha1_from_password(
                &mut ctx,
                username,
                realm,
                password,
                false,
                &expected_nonce,
                &cnonce,
            ),
            Credential::Ha1Digest(digest) => {
                ha1_from_digest(&mut ctx, digest, false, &expected_nonce, &cnonce)
            }
        };
        let expected_response = calculate_response(
            &mut ctx,
            &ha1,
            &expected_nonce,
            &nc_field,
            &cnonce,
            &qop,
            request.method,
            &uri,
        );
        if constant_time_eq(expected_response.as_bytes(), response.as_bytes()) {
            Verdict::Ok
        } else {
            Verdict::ResponseWrong
        }
    }

    /// Build the `WWW-Authenticate` header value for a 401 response, minting
    /// a fresh nonce and recording it in the tracking table.
    ///
    /// On a slot collision the insert is retried once with a slightly
    /// perturbed timestamp; if that also fails the original nonce is emitted
    /// untracked and the client's next submission will come back as wrong,
    /// prompting an automatic retry.
    ///
    /// Set `signal_stale` when answering a [`Verdict::NonceStale`] so
    /// well-behaved clients retry without re-prompting the user.
    pub fn generate_challenge(
        &self,
        request: &RequestInfo<'_>,
        realm: &str,
        opaque: &str,
        signal_stale: bool,
        algorithm: DigestAlgorithm,
    ) -> Result<String, ChallengeError> {
        let algorithm = algorithm.resolve();
        if self.table.size() == 0 {
            warn!("the nonce table size is zero, refusing to issue a challenge");
            return Err(ChallengeError::TrackingDisabled);
        }

        let timestamp = self.clock.now_ms();
        let mut nonce = calculate_nonce(
            timestamp,
            request.method,
            &self.random,
            request.path,
            realm,
            algorithm,
        );
        if !self.table.try_insert(timestamp, &nonce) {
            // Either the very same nonce was handed to a concurrent client,
            // or a colliding fresh nonce still owns the slot. Perturbing the
            // timestamp moves the nonce to a different slot without breaking
            // its MAC.
            let mut retry_ts = self.clock.now_ms();
            if retry_ts == timestamp {
                let jump = address_jumpback(self as *const Self as usize, nonce.as_ptr() as usize);
                retry_ts = retry_ts.wrapping_sub(jump);
                if retry_ts == timestamp {
                    retry_ts = retry_ts.wrapping_sub(2);
                }
            }
            let second = calculate_nonce(
                retry_ts,
                request.method,
                &self.random,
                request.path,
                realm,
                algorithm,
            );
            if self.table.try_insert(retry_ts, &second) {
                nonce = second;
            } else {
                warn!(
                    "could not register the nonce; the client's next request with it \
                     will be rejected and retried"
                );
            }
        }

        Ok(format!(
            "Digest realm=\"{}\",qop=\"auth\",nonce=\"{}\",opaque=\"{}\",algorithm={}{}",
            quote(realm),
            nonce,
            quote(opaque),
            algorithm.token(),
            if signal_stale { ",stale=\"true\"" } else { "" },
        ))
    }

    /// Compare the client's `uri` parameter (path and query arguments)
    /// against the request target.
    fn uri_matches(&self, uri: &str, request: &RequestInfo<'_>) -> bool {
        let (path, args) = match uri.split_once('?') {
            Some((path, args)) => (path, args),
            None => (uri, ""),
        };
        let mut path = path.to_string();
        (self.unescape)(&mut path);
        if path != request.path {
            warn!("digest auth failed: uri does not match the request");
            return false;
        }
        if !self.arguments_match(args, request.query) {
            warn!("digest auth failed: uri arguments do not match the request");
            return false;
        }
        true
    }

    /// Every submitted argument must appear in the request with the same
    /// value, and the argument counts must agree. The client's `uri` is
    /// covered by the response MAC, but without this check a response could
    /// be relayed to a different resource on the same host.
    fn arguments_match(&self, submitted: &str, request_query: &str) -> bool {
        let submitted = self.parse_query(submitted);
        let expected = self.parse_query(request_query);
        submitted.len() == expected.len()
            && submitted.iter().all(|pair| expected.contains(pair))
    }

    /// Split a form-encoded query into decoded key/value pairs. A key
    /// without `=` has no value, distinct from an empty one.
    fn parse_query(&self, query: &str) -> Vec<(String, Option<String>)> {
        let mut pairs = Vec::new();
        for part in query.split('&') {
            if part.is_empty() {
                continue;
            }
            let (key, value) = match part.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (part, None),
            };
            let mut key = key.to_string();
            (self.unescape)(&mut key);
            let value = value.map(|v| {
                let mut v = v.to_string();
                (self.unescape)(&mut v);
                v
            });
            pairs.push((key, value));
        }
        pairs
    }
}

/// Fetch the client's username from parsed parameters as an owned, unquoted
/// string, without verifying anything.
pub fn extract_username(params: &DigestParams<'_>) -> Option<String> {
    match unquote_param(params.username) {
        Unquoted::Value(value) => Some(value.into_owned()),
        Unquoted::Missing | Unquoted::TooLarge => None,
    }
}

/// Default URL unescape: decodes `%XX` sequences in place. The value is left
/// untouched when decoding would not produce valid UTF-8, which keeps the
/// callback idempotent on already-decoded input.
fn percent_unescape(value: &mut String) {
    if !value.contains('%') {
        return;
    }
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let high = char::from(bytes[i + 1]).to_digit(16);
            let low = char::from(bytes[i + 2]).to_digit(16);
            if let (Some(high), Some(low)) = (high, low) {
                decoded.push((high << 4 | low) as u8);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    if let Ok(decoded) = String::from_utf8(decoded) {
        *value = decoded;
    }
}

/// Fold two transient addresses down to a small timestamp perturbation.
/// Unpredictability is not required here: the perturbed timestamp still
/// enters the nonce MAC.
fn address_jumpback(a: usize, b: usize) -> u64 {
    fn fold(value: u64) -> u8 {
        let half = ((value >> 32) as u32) ^ (value as u32);
        let quarter = ((half >> 16) as u16) ^ (half as u16);
        ((quarter >> 8) as u8) ^ (quarter as u8)
    }
    let rot = fold(b as u64);
    let mixed = (a as u64).rotate_left(u32::from((rot >> 4) ^ (rot & 0x0f)));
    u64::from(fold(mixed)) & JUMPBACK_MAX
}
