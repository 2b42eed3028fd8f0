//! Session cookie encoding and parsing.

use crate::auth::session::SessionToken;
use axum::http::{header, HeaderMap, HeaderValue};
use chrono::DateTime;

pub const SESSION_COOKIE: &str = "session_token";

const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

fn http_date(unix_secs: u64) -> String {
    i64::try_from(unix_secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
        .unwrap_or_else(|| EPOCH_EXPIRES.to_string())
}

fn attributes(secure: bool) -> &'static str {
    if secure {
        "HttpOnly; Secure; SameSite=Strict; Path=/"
    } else {
        "HttpOnly; SameSite=Strict; Path=/"
    }
}

/// `Set-Cookie` value carrying a freshly issued session.
pub fn session_cookie(session: &SessionToken, secure: bool, now: u64) -> HeaderValue {
    let max_age = session.expires_at.saturating_sub(now);
    let value = format!(
        "{}={}; {}; Expires={}; Max-Age={}",
        SESSION_COOKIE,
        session.token,
        attributes(secure),
        http_date(session.expires_at),
        max_age
    );
    // Token is URL-safe base64, so the value is always a valid header
    HeaderValue::from_str(&value).unwrap_or_else(|_| clear_session_cookie(secure))
}

/// `Set-Cookie` value that makes the client drop its session cookie.
pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    match secure {
        true => HeaderValue::from_static(
            "session_token=; HttpOnly; Secure; SameSite=Strict; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0",
        ),
        false => HeaderValue::from_static(
            "session_token=; HttpOnly; SameSite=Strict; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0",
        ),
    }
}

/// Every non-empty value of cookie `name`, in header order.
///
/// Browsers may send the same name more than once (for example one cookie set
/// with `Path=/` and a leftover with a narrower path), so callers that care
/// about validity should try each candidate.
pub fn cookie_values(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// First non-empty value of cookie `name` across all `Cookie` headers.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    cookie_values(headers, name).into_iter().next()
}

/// Candidate session tokens presented by the client.
pub fn session_tokens_from_headers(headers: &HeaderMap) -> Vec<String> {
    cookie_values(headers, SESSION_COOKIE)
}
