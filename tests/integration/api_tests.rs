//! API integration tests

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use snuggle_visits::{
    config::{AppConfig, StoreBackend},
    create_router,
    services::{memory::MemoryStore, redis::RedisService, store::VisitStore, Services},
    AppState,
};

fn setup() -> (Router, AppState) {
    let mut config = AppConfig::default();
    config.visits.backend = StoreBackend::Memory;
    let services = Services::new(Arc::new(MemoryStore::new()), &config);
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };
    (create_router(state.clone()), state)
}

fn visit(blog_id: &str, cookie: Option<&str>, ip: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/blogs/{}/visit", blog_id))
        .header(header::HOST, "api.snuggle.example.com")
        .header("x-forwarded-for", ip);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("build visit request")
}

/// Send a request and drain its body, as the server does when delivering it
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec();
    (status, headers, bytes)
}

/// Tracking runs in a detached task; poll until it lands
async fn pending_eventually(state: &AppState, blog_id: &str, expected: i64) -> i64 {
    let mut pending = 0;
    for _ in 0..100 {
        pending = state.services.visits.pending(blog_id).await.expect("pending");
        if pending == expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    pending
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let request = Request::get("/api/v1/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_with_memory_store() {
    let (app, _) = setup();

    let request = Request::get("/api/v1/ready").body(Body::empty()).unwrap();
    let (status, _, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_repeat_visits_count_once() {
    let (app, state) = setup();

    for _ in 0..3 {
        let (status, _, _) = send(&app, visit("blog-42", Some("snuggle_visitor_id=u1"), "10.0.0.1")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    assert_eq!(pending_eventually(&state, "blog-42", 1).await, 1);
    // Give any stray task a chance to land before asserting nothing else was counted
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(state.services.visits.pending("blog-42").await.unwrap(), 1);
}

#[tokio::test]
async fn test_cookieless_visitor_counted_once_per_ip() {
    let (app, state) = setup();

    for _ in 0..3 {
        let (status, headers, _) = send(&app, visit("blog-42", None, "203.0.113.7")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(headers.get(header::SET_COOKIE).is_some());
    }

    assert_eq!(pending_eventually(&state, "blog-42", 1).await, 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(state.services.visits.pending("blog-42").await.unwrap(), 1);
}

#[tokio::test]
async fn test_cookie_and_ip_visitors_count_separately() {
    let (app, state) = setup();

    send(&app, visit("blog-42", Some("snuggle_visitor_id=u1"), "10.0.0.1")).await;
    send(&app, visit("blog-42", Some("snuggle_visitor_id=u1"), "203.0.113.7")).await;
    // No cookie: identified by its address
    let (_, headers, _) = send(&app, visit("blog-42", None, "203.0.113.7")).await;
    send(&app, visit("blog-42", None, "203.0.113.7")).await;

    assert_eq!(pending_eventually(&state, "blog-42", 2).await, 2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(state.services.visits.pending("blog-42").await.unwrap(), 2);

    let set_cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("visitor cookie provisioned");
    assert!(set_cookie.starts_with("snuggle_visitor_id="));
}

#[tokio::test]
async fn test_provisioned_cookie_identifies_later_visits() {
    let (app, state) = setup();

    // First contact is counted under the client address
    let (_, headers, _) = send(&app, visit("blog-42", None, "203.0.113.7")).await;
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("visitor cookie provisioned")
        .to_string();
    assert!(set_cookie.contains("Max-Age=31536000"));
    assert!(set_cookie.contains("SameSite=None"));
    assert!(set_cookie.contains("Secure"));
    assert_eq!(pending_eventually(&state, "blog-42", 1).await, 1);

    let pair = set_cookie.split(';').next().unwrap().to_string();
    // Returning with the token, from two different networks
    let (_, headers, _) = send(&app, visit("blog-42", Some(&pair), "203.0.113.7")).await;
    assert!(headers.get(header::SET_COOKIE).is_none());
    send(&app, visit("blog-42", Some(&pair), "198.51.100.9")).await;

    assert_eq!(pending_eventually(&state, "blog-42", 2).await, 2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(state.services.visits.pending("blog-42").await.unwrap(), 2);
}

#[tokio::test]
async fn test_existing_cookie_is_left_alone() {
    let (app, _) = setup();

    let (_, headers, _) = send(&app, visit("blog-42", Some("snuggle_visitor_id=u1; theme=dark"), "10.0.0.1")).await;

    assert!(headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_local_host_gets_lax_cookie() {
    let (app, _) = setup();

    let request = Request::get("/api/v1/health")
        .header(header::HOST, "localhost:4000")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&app, request).await;

    let set_cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("visitor cookie provisioned");
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_pending_endpoint_is_not_tracked() {
    let (app, state) = setup();

    let request = Request::get("/api/v1/blogs/blog-42/visits/pending")
        .header(header::COOKIE, "snuggle_visitor_id=u1")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(body["blog_id"], "blog-42");
    assert_eq!(body["pending"], 0);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(state.services.visits.pending("blog-42").await.unwrap(), 0);
}

#[tokio::test]
async fn test_pending_endpoint_reports_counted_visits() {
    let (app, state) = setup();

    send(&app, visit("blog-7", Some("snuggle_visitor_id=u1"), "10.0.0.1")).await;
    send(&app, visit("blog-7", Some("snuggle_visitor_id=u2"), "10.0.0.1")).await;
    pending_eventually(&state, "blog-7", 2).await;

    let request = Request::get("/api/v1/blogs/blog-7/visits/pending")
        .body(Body::empty())
        .unwrap();
    let (_, _, body) = send(&app, request).await;
    let body: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(body["pending"], 2);
}

#[tokio::test]
#[ignore] // Needs a live Redis: REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored
async fn test_redis_store_claims_once() {
    let mut config = AppConfig::default();
    config.redis.url = std::env::var("REDIS_URL").ok();
    let store = RedisService::new(&config.redis).await.expect("connect to Redis");

    let key = format!("visit:log:test-blog:{}:2024-01-01", uuid::Uuid::new_v4());
    assert!(store.set_nx_ex(&key, "1", 60).await.unwrap());
    assert!(!store.set_nx_ex(&key, "1", 60).await.unwrap());
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("1"));

    let counter = format!("visit:pending:test-{}", uuid::Uuid::new_v4());
    assert_eq!(store.incr(&counter).await.unwrap(), 1);
    assert_eq!(store.incr(&counter).await.unwrap(), 2);
    store.ping().await.unwrap();
}
