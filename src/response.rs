//! RFC 2617 / RFC 7616 response digest composition.
//!
//! All byte-string components are fed to the hash exactly as received, with
//! literal colons between them. Usernames containing `:` are therefore
//! ambiguous with respect to the realm field; that is a constraint on
//! credentials, not on this code.

use crate::algo::{DigestContext, hex_encode};

/// H(A1) from the long-term credentials: `HEX(H(username:realm:password))`,
/// optionally extended with the session (`-sess`) composition.
///
/// The verifier never selects `session`; it stays here because the response
/// composition is shared with it.
pub(crate) fn ha1_from_password(
    ctx: &mut DigestContext,
    username: &str,
    realm: &str,
    password: &str,
    session: bool,
    nonce: &str,
    cnonce: &str,
) -> String {
    ctx.update(username);
    ctx.update(":");
    ctx.update(realm);
    ctx.update(":");
    ctx.update(password);
    let digest = ctx.finalize_bin();
    ha1_from_digest(ctx, &digest, session, nonce, cnonce)
}

/// H(A1) from a precomputed binary `H(username:realm:password)`.
pub(crate) fn ha1_from_digest(
    ctx: &mut DigestContext,
    digest: &[u8],
    session: bool,
    nonce: &str,
    cnonce: &str,
) -> String {
    if session {
        ctx.update(digest);
        ctx.update(":");
        ctx.update(nonce);
        ctx.update(":");
        ctx.update(cnonce);
        ctx.finalize_hex()
    } else {
        hex_encode(digest)
    }
}

/// The request digest: `H(HA1:nonce:nc:cnonce:qop:H(A2))` for `qop="auth"`,
/// or the RFC 2069 form `H(HA1:nonce:H(A2))` when `qop` is empty.
///
/// `H(A2)` is `H(method:uri)`; `auth-int` is not supported.
pub(crate) fn calculate_response(
    ctx: &mut DigestContext,
    ha1: &str,
    nonce: &str,
    nc: &str,
    cnonce: &str,
    qop: &str,
    method: &str,
    uri: &str,
) -> String {
    ctx.update(method);
    ctx.update(":");
    ctx.update(uri);
    let ha2 = ctx.finalize_hex();

    ctx.update(ha1);
    ctx.update(":");
    ctx.update(nonce);
    ctx.update(":");
    if !qop.is_empty() {
        ctx.update(nc);
        ctx.update(":");
        ctx.update(cnonce);
        ctx.update(":");
        ctx.update(qop);
        ctx.update(":");
    }
    ctx.update(&ha2);
    ctx.finalize_hex()
}
