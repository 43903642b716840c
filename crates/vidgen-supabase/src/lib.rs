//! Supabase REST API client.
//!
//! This crate provides:
//! - A thin PostgREST client scoped per request by access token
//! - GoTrue session verification and PKCE code exchange
//! - Typed repositories for profiles and videos
//! - Observability (tracing spans, metrics)

pub mod auth;
pub mod client;
pub mod error;
pub mod metrics;
pub mod profiles;
pub mod videos;


pub use auth::{Session, User, UserMetadata};
pub use client::{SupabaseClient, SupabaseConfig};
pub use error::{SupabaseError, SupabaseResult};
pub use profiles::ProfileRepository;
pub use videos::VideoRepository;
