//! Double-submit CSRF guard.
//!
//! `GET /csrf-token` sets an HttpOnly cookie and returns the same value in
//! the body. Script on the page's own origin echoes it in `x-csrf-token`;
//! a foreign origin can trigger the request (and the cookie rides along)
//! but cannot read the value to put in the header.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use rand::Rng;
use tollgate_common::GateError;
use tollgate_common::constants::{CSRF_TOKEN_BYTES, cookies, headers};
use tollgate_common::protocol::constant_time_eq;

use crate::error::ApiError;

/// Mint a fresh token: 32 random bytes, lowercase hex
pub fn generate_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// `Set-Cookie` value binding `token` to the browser session
pub fn set_cookie_value(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Strict",
        cookies::CSRF_TOKEN,
        token
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Find a cookie by name across all `Cookie` headers
pub fn cookie_value<'a>(map: &'a HeaderMap, name: &str) -> Option<&'a str> {
    map.get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

/// Compare cookie and header; both must be present, non-empty and equal
pub fn check(map: &HeaderMap) -> Result<(), GateError> {
    let cookie = cookie_value(map, cookies::CSRF_TOKEN).filter(|v| !v.is_empty());
    let echoed = map
        .get(headers::X_CSRF_TOKEN)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    match (cookie, echoed) {
        (Some(cookie), Some(echoed)) if constant_time_eq(cookie, echoed) => Ok(()),
        (Some(_), Some(_)) => Err(GateError::Csrf("cookie and header differ".into())),
        (None, _) => Err(GateError::Csrf("missing cookie".into())),
        (_, None) => Err(GateError::Csrf("missing header".into())),
    }
}

/// Extractor that rejects the request with 403 unless the CSRF check passes.
///
/// Place it before any body extractor so the check runs first.
#[derive(Debug, Clone, Copy)]
pub struct CsrfGuard;

impl<S> FromRequestParts<S> for CsrfGuard
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        check(&parts.headers)?;
        Ok(CsrfGuard)
    }
}
