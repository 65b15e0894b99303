//! litscope/crates/ls-api/src/middleware.rs
//!
//! Shared tower layers for logging and traffic control.

use std::time::Duration;

use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{HttpMakeClassifier, TraceLayer};

/// Request/response tracing with the standard HTTP classifier.
pub fn trace_layer() -> TraceLayer<HttpMakeClassifier> {
    TraceLayer::new_for_http()
}

// Configures CORS (Cross-Origin Resource Sharing).
// Important if the UI and API ever live on different subdomains.
pub fn cors_policy() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600))
}
