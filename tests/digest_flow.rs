//! End-to-end challenge / verify flows against a simulated client.

use std::sync::Arc;

use md5::{Digest, Md5};

use httpdigest::{
    Credential, DigestAlgorithm, DigestAuth, DigestAuthConfig, DigestParams, ManualClock,
    RequestInfo, Verdict,
};

const REALM: &str = "r";
const USER: &str = "u";
const PASSWORD: &str = "p";

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn md5_hex(input: &str) -> String {
    hex(&Md5::digest(input.as_bytes()))
}

/// Authenticator with the seed `"s"` and a manually driven clock.
fn authenticator(start_ms: u64, timeout_secs: u64) -> (DigestAuth, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_ms));
    let config = DigestAuthConfig {
        nonce_nc_size: 64,
        nonce_timeout_secs: timeout_secs,
        random_seed: Some("s".to_string()),
    };
    (DigestAuth::with_clock(&config, clock.clone()), clock)
}

fn mint_nonce(auth: &DigestAuth, request: &RequestInfo<'_>) -> String {
    let challenge = auth
        .generate_challenge(request, REALM, "opq", false, DigestAlgorithm::Md5)
        .unwrap();
    let params = DigestParams::from_header(&challenge).unwrap();
    params.nonce.unwrap().value.to_string()
}

/// Compute the client-side response for `qop="auth"` with MD5.
fn response_for(nonce: &str, nc: &str, cnonce: &str, uri: &str) -> String {
    let ha1 = md5_hex(&format!("{USER}:{REALM}:{PASSWORD}"));
    let ha2 = md5_hex(&format!("GET:{uri}"));
    md5_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:auth:{ha2}"))
}

fn submit(
    auth: &DigestAuth,
    request: &RequestInfo<'_>,
    nonce: &str,
    nc: &str,
    cnonce: &str,
    uri: &str,
) -> Verdict {
    let response = response_for(nonce, nc, cnonce, uri);
    let header = format!(
        r#"Digest username="{USER}", realm="{REALM}", nonce="{nonce}", uri="{uri}", qop=auth, nc={nc}, cnonce="{cnonce}", response="{response}""#
    );
    let params = DigestParams::from_header(&header).unwrap();
    auth.check_auth(
        request,
        Some(&params),
        REALM,
        USER,
        Credential::Password(PASSWORD),
        DigestAlgorithm::Md5,
    )
}

#[test]
fn nonce_wire_format_is_bit_exact() {
    let (auth, _clock) = authenticator(1, 300);
    let request = RequestInfo { method: "GET", path: "/a", query: "" };
    let nonce = mint_nonce(&auth, &request);

    // HEX(MD5(ts6 ":" method ":" rnd ":" uri ":" realm)) ++ HEX(ts48)
    let mut hasher = Md5::new();
    hasher.update([0u8, 0, 0, 0, 0, 1]);
    hasher.update(b":GET:s:/a:r");
    let expected = format!("{}000000000001", hex(&hasher.finalize()));

    assert_eq!(nonce, expected);
    assert_eq!(nonce.len(), 44);
}

#[test]
fn happy_path_then_replay_goes_stale() {
    let (auth, _clock) = authenticator(1, 300);
    let request = RequestInfo { method: "GET", path: "/a", query: "" };
    let nonce = mint_nonce(&auth, &request);

    assert_eq!(submit(&auth, &request, &nonce, "00000001", "c", "/a"), Verdict::Ok);
    // The identical submission is a replay of an already-used counter.
    assert_eq!(
        submit(&auth, &request, &nonce, "00000001", "c", "/a"),
        Verdict::NonceStale
    );
}

#[test]
fn out_of_order_counters_within_window() {
    let (auth, _clock) = authenticator(1, 300);
    let request = RequestInfo { method: "GET", path: "/a", query: "" };
    let nonce = mint_nonce(&auth, &request);

    assert_eq!(submit(&auth, &request, &nonce, "00000001", "c", "/a"), Verdict::Ok);
    assert_eq!(submit(&auth, &request, &nonce, "00000003", "c", "/a"), Verdict::Ok);
    assert_eq!(submit(&auth, &request, &nonce, "00000002", "c", "/a"), Verdict::Ok);
    assert_eq!(
        submit(&auth, &request, &nonce, "00000002", "c", "/a"),
        Verdict::NonceStale
    );
}

#[test]
fn tampered_mac_is_wrong() {
    let (auth, _clock) = authenticator(1, 300);
    let request = RequestInfo { method: "GET", path: "/a", query: "" };
    let mut nonce = mint_nonce(&auth, &request);

    let flipped = if nonce.as_bytes()[0] == b'0' { "1" } else { "0" };
    nonce.replace_range(0..1, flipped);
    assert_eq!(
        submit(&auth, &request, &nonce, "00000001", "c", "/a"),
        Verdict::NonceWrong
    );
}

#[test]
fn nonce_past_timeout_is_stale() {
    let (auth, clock) = authenticator(3_000, 1);
    let request = RequestInfo { method: "GET", path: "/a", query: "" };
    let nonce = mint_nonce(&auth, &request);

    clock.advance(2_000);
    assert_eq!(
        submit(&auth, &request, &nonce, "00000001", "c", "/a"),
        Verdict::NonceStale
    );
}

#[test]
fn uri_parameter_must_match_the_request() {
    let (auth, _clock) = authenticator(1, 300);
    let request = RequestInfo { method: "GET", path: "/b", query: "" };
    let nonce = mint_nonce(&auth, &request);

    // A response computed for /a, relayed to a request for /b.
    assert_eq!(
        submit(&auth, &request, &nonce, "00000001", "c", "/a"),
        Verdict::WrongUri
    );
    assert_eq!(submit(&auth, &request, &nonce, "00000002", "c", "/b"), Verdict::Ok);
}

#[test]
fn sha256_round_trip() {
    let (auth, _clock) = authenticator(1, 300);
    let request = RequestInfo { method: "GET", path: "/a", query: "q=1" };
    let challenge = auth
        .generate_challenge(&request, REALM, "opq", false, DigestAlgorithm::Sha256)
        .unwrap();
    let params = DigestParams::from_header(&challenge).unwrap();
    assert_eq!(params.algorithm.unwrap().value, "SHA-256");
    let nonce = params.nonce.unwrap().value.to_string();
    assert_eq!(nonce.len(), 76);

    let sha_hex = |s: &str| hex(&sha2::Sha256::digest(s.as_bytes()));
    let ha1 = sha_hex(&format!("{USER}:{REALM}:{PASSWORD}"));
    let ha2 = sha_hex("GET:/a?q=1");
    let response = sha_hex(&format!("{ha1}:{nonce}:00000001:c:auth:{ha2}"));
    let header = format!(
        r#"Digest username="{USER}", realm="{REALM}", nonce="{nonce}", uri="/a?q=1", qop=auth, nc=00000001, cnonce="c", response="{response}""#
    );
    let params = DigestParams::from_header(&header).unwrap();
    let verdict = auth.check_auth(
        &request,
        Some(&params),
        REALM,
        USER,
        Credential::Password(PASSWORD),
        DigestAlgorithm::Sha256,
    );
    assert_eq!(verdict, Verdict::Ok);
}

#[test]
fn stale_verdict_drives_stale_challenge() {
    let (auth, clock) = authenticator(3_000, 1);
    let request = RequestInfo { method: "GET", path: "/a", query: "" };
    let nonce = mint_nonce(&auth, &request);

    clock.advance(2_000);
    let verdict = submit(&auth, &request, &nonce, "00000001", "c", "/a");
    assert!(verdict.signals_stale());

    // Let the unused first nonce leave its quiet period so the fresh one can
    // claim its slot even on a collision.
    clock.advance(31_000);
    let retry = auth
        .generate_challenge(&request, REALM, "opq", verdict.signals_stale(), DigestAlgorithm::Md5)
        .unwrap();
    assert!(retry.ends_with(r#",stale="true""#));

    // The fresh nonce from the stale challenge authenticates.
    let fresh = DigestParams::from_header(&retry)
        .unwrap()
        .nonce
        .unwrap()
        .value
        .to_string();
    assert_eq!(submit(&auth, &request, &fresh, "00000001", "c", "/a"), Verdict::Ok);
}
