//! Provisions the long-lived visitor cookie on first contact

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::services::visitor::{generate_visitor_id, is_local_host, visitor_cookie, VISITOR_COOKIE};

/// Ensure every visitor carries a `snuggle_visitor_id` cookie.
///
/// When the cookie is already present the request and response pass through untouched.
/// Otherwise a new token is set on the response only. The current request still has no
/// cookie and is attributed to the client IP; the token identifies later requests.
pub async fn provision_visitor_cookie(jar: CookieJar, request: Request, next: Next) -> Response {
    if jar.get(VISITOR_COOKIE).is_some_and(|c| !c.value().is_empty()) {
        return next.run(request).await;
    }

    let visitor_id = generate_visitor_id();
    let secure = !request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(is_local_host)
        .unwrap_or(false);

    tracing::debug!(secure, "Provisioning visitor cookie");

    let response = next.run(request).await;
    (jar.add(visitor_cookie(visitor_id, secure)), response).into_response()
}
