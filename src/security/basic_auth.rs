//! HTTP Basic authentication: inbound checks and outbound injection.
//!
//! # Responsibilities
//! - Verify caller credentials against a host's `auth` section
//! - Overwrite `Authorization` on forwarded requests when the host has
//!   outbound credentials
//!
//! # Design Decisions
//! - Credentials split at the first `:` (passwords may contain colons)
//! - Scheme name compared case-insensitively
//! - Username and password are both compared, in constant time per byte

use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::policy::{Credentials, HostPolicy};

/// Challenge sent with every 401.
pub const CHALLENGE: &str = "Basic realm=\"Restrictive Proxy\"";

/// Header name/value pair for the 401 challenge.
pub fn challenge() -> (axum::http::HeaderName, HeaderValue) {
    (WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE))
}

/// Encode credentials as a sensitive `Basic <base64>` header value.
pub fn encode(credentials: &Credentials) -> Result<HeaderValue, InvalidHeaderValue> {
    let token = STANDARD.encode(format!("{}:{}", credentials.username, credentials.password));
    let mut value = HeaderValue::from_str(&format!("Basic {}", token))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Decode a `Basic` authorization header into (username, password).
pub fn decode(value: &HeaderValue) -> Option<(String, String)> {
    let value = value.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let bytes = STANDARD.decode(token.trim()).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Inbound check: true when the host needs no credentials or the request
/// carries matching Basic credentials.
pub fn require_auth(policy: &HostPolicy, headers: &HeaderMap) -> bool {
    let Some(expected) = policy.inbound_credentials() else {
        return true;
    };
    let Some((username, password)) = headers.get(AUTHORIZATION).and_then(decode) else {
        return false;
    };

    let username_ok = constant_time_eq(username.as_bytes(), expected.username.as_bytes());
    let password_ok = constant_time_eq(password.as_bytes(), expected.password.as_bytes());
    username_ok & password_ok
}

/// Outbound injection: replace `Authorization` when the host has outbound
/// credentials, otherwise leave the caller's header untouched.
pub fn inject_auth(policy: &HostPolicy, headers: &mut HeaderMap) {
    if let Some(value) = policy.outbound_authorization() {
        headers.insert(AUTHORIZATION, value.clone());
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
