//! Visitor identity: cookie token first, client IP as fallback

use std::net::SocketAddr;

use axum::http::HeaderMap;
use cookie::{time::Duration, Cookie, SameSite};
use uuid::Uuid;

/// Cookie holding the long-lived visitor token
pub const VISITOR_COOKIE: &str = "snuggle_visitor_id";
/// One year, in seconds
pub const VISITOR_COOKIE_MAX_AGE: i64 = 60 * 60 * 24 * 365;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_IP: &str = "unknown";

/// Visitor identifier for a request: the `snuggle_visitor_id` cookie value if present,
/// otherwise `ip` verbatim. Neither value is validated.
pub fn resolve_visitor_id(cookie_header: Option<&str>, ip: &str) -> String {
    cookie_header
        .and_then(visitor_cookie_value)
        .map(str::to_string)
        .unwrap_or_else(|| ip.to_string())
}

/// Find the non-empty `snuggle_visitor_id` token in a raw `Cookie` header
pub fn visitor_cookie_value(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .find_map(|pair| pair.trim().strip_prefix(VISITOR_COOKIE)?.strip_prefix('='))
        .filter(|value| !value.is_empty())
}

/// Best-effort client IP: first `X-Forwarded-For` hop, else the socket peer,
/// else `"unknown"`
pub fn client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

/// Fresh random visitor token (UUID v4)
pub fn generate_visitor_id() -> String {
    Uuid::new_v4().to_string()
}

/// The visitor cookie as set on first page load.
///
/// Over HTTPS the cookie must reach a separate API origin, so it is sent with
/// `SameSite=None; Secure`. Browsers reject that combination on plain HTTP, where
/// `SameSite=Lax` is used instead.
pub fn visitor_cookie(value: String, secure: bool) -> Cookie<'static> {
    let same_site = if secure { SameSite::None } else { SameSite::Lax };
    Cookie::build((VISITOR_COOKIE, value))
        .path("/")
        .max_age(Duration::seconds(VISITOR_COOKIE_MAX_AGE))
        .same_site(same_site)
        .secure(secure)
        .build()
}

/// Local development hosts served over plain HTTP
pub fn is_local_host(host: &str) -> bool {
    let hostname = if let Some(rest) = host.strip_prefix('[') {
        // [::1]:3000
        rest.split(']').next().unwrap_or(rest)
    } else if host.matches(':').count() > 1 {
        host
    } else {
        host.split(':').next().unwrap_or(host)
    };
    matches!(hostname, "localhost" | "127.0.0.1" | "::1")
}
