//! Snuggle visit tracker
//!
//! Counts unique daily visitors per blog. Visits are deduplicated per visitor and
//! UTC day in a shared cache and accumulated into per-blog pending counters, which an
//! external job drains into durable statistics.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // Visitor cookies travel cross-origin from the frontend, so origins are explicit
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    // Blog-scoped routes counted as visits
    let tracked = Router::new()
        .route("/blogs/:blogId/visit", post(api::visits::record_visit))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::track_blog_visit,
        ));

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Visits
        .route("/blogs/:blogId/visits/pending", get(api::visits::get_pending_visits))
        .merge(tracked)
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(axum_middleware::from_fn(middleware::provision_visitor_cookie))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
