//! CORS configuration.

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// CORS layer with the allowlist from `FRONTEND_ORIGIN` (comma-separated).
pub fn cors_layer() -> CorsLayer {
    let origins = std::env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| DEFAULT_ORIGIN.to_string());
    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
