//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::auth::{auth_callback, sign_out};
use crate::handlers::billing::{create_checkout, create_portal};
use crate::handlers::generate::generate_video;
use crate::handlers::health::{health, ready};
use crate::handlers::profile::me;
use crate::handlers::subscription::subscription_status;
use crate::handlers::videos::list_videos;
use crate::handlers::webhook::stripe_webhook;
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // Create rate limiter for session-authenticated routes
    let rate_limiter = Arc::new(RateLimiterCache::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    // Tighter limit for the unauthenticated code exchange (5 req/sec per IP)
    let callback_rate_limiter = Arc::new(RateLimiterCache::new(5, 5));

    let api_routes = Router::new()
        .route("/generate-video", post(generate_video))
        .route("/me", get(me))
        .route("/videos", get(list_videos))
        .route("/subscription/status", get(subscription_status))
        .route("/billing/create-checkout", post(create_checkout))
        .route("/billing/create-portal", post(create_portal))
        .route("/auth/signout", post(sign_out))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let callback_routes = Router::new()
        .route("/auth/callback", get(auth_callback))
        .layer(middleware::from_fn_with_state(
            callback_rate_limiter,
            rate_limit_middleware,
        ));

    // Stripe retries on non-2xx and signs every delivery; no IP limit here
    let webhook_routes = Router::new().route("/billing/webhook", post(stripe_webhook));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(callback_routes)
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
