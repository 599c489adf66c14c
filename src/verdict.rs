//! Verification verdicts.

use std::fmt;

/// Outcome of verifying one client submission.
///
/// Exactly one verdict applies to every submission. The discriminants form a
/// stable numeric contract for hosts that forward results over FFI or into
/// logs; [`Verdict::code`] exposes them.
///
/// Every non-[`Ok`](Verdict::Ok) verdict maps to an HTTP 401 with a fresh
/// challenge, except [`Error`](Verdict::Error) which is an internal failure
/// (500). `stale="true"` belongs in the follow-up challenge only for
/// [`NonceStale`](Verdict::NonceStale).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Verdict {
    /// Authentication succeeded.
    Ok = 0,
    /// The nonce was validly issued but is no longer acceptable: expired,
    /// displaced from the tracking table, or its counter was already used.
    /// Clients retry automatically on `stale="true"`.
    NonceStale = 1,
    /// The nonce was never issued by this server.
    NonceWrong = 2,
    /// Malformed or missing mandatory parameter, or unsupported `qop`.
    WrongHeader = 3,
    /// The submitted username does not match the expected user.
    WrongUsername = 4,
    /// The submitted realm does not match the server's realm.
    WrongRealm = 5,
    /// The `uri` parameter does not match the requested resource.
    WrongUri = 6,
    /// Everything checked out except the response digest: bad credentials.
    ResponseWrong = 7,
    /// Internal failure, e.g. a resource cap was exceeded.
    Error = 8,
}

impl Verdict {
    /// Stable numeric code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Verdict::Ok)
    }

    /// Whether the follow-up challenge should carry `stale="true"`.
    pub const fn signals_stale(self) -> bool {
        matches!(self, Verdict::NonceStale)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::Ok => "ok",
            Verdict::NonceStale => "nonce stale",
            Verdict::NonceWrong => "nonce wrong",
            Verdict::WrongHeader => "wrong header",
            Verdict::WrongUsername => "wrong username",
            Verdict::WrongRealm => "wrong realm",
            Verdict::WrongUri => "wrong uri",
            Verdict::ResponseWrong => "response wrong",
            Verdict::Error => "internal error",
        };
        f.write_str(name)
    }
}
