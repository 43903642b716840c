//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video generation endpoint backed by Replicate
//! - Supabase session authentication
//! - Stripe checkout, portal and webhook handling
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
