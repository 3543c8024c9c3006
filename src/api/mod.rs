//! API handlers for the Snuggle visit tracker

pub mod health;
pub mod openapi;
pub mod visits;

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::COOKIE, request::Parts},
};

use crate::services::visitor::{client_ip, resolve_visitor_id};

/// Extractor for the visitor identity of the current request.
///
/// Uses the visitor cookie when present, the client IP otherwise. Never rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorIdentity(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for VisitorIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let ip = client_ip(&parts.headers, remote_addr);

        // Several Cookie headers may be sent over HTTP/2
        let cookies = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        let cookies = Some(cookies.as_str()).filter(|c| !c.is_empty());

        Ok(VisitorIdentity(resolve_visitor_id(cookies, &ip)))
    }
}
