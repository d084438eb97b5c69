//! API route definitions

use crate::handlers;
use crate::state::AppState;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors = if state.config.cors_permissive {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(Duration::from_secs(3600))
    } else {
        let origin = HeaderValue::from_str(&state.config.allowed_origin).unwrap_or_else(|_| {
            warn!(origin = %state.config.allowed_origin, "Invalid CORS origin, falling back to localhost");
            HeaderValue::from_static("http://localhost:8080")
        });
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health & Metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))

        // Tracking API
        .route(
            "/api/v1/orders/{order_number}/tracking",
            post(handlers::start_tracking)
                .get(handlers::get_tracking)
                .delete(handlers::stop_tracking),
        )
        .route(
            "/api/v1/orders/{order_number}/tracking/refresh",
            post(handlers::refresh_tracking),
        )
        .route(
            "/api/v1/orders/{order_number}/tracking/ws",
            get(handlers::tracking_ws),
        )

        // Apply middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================
