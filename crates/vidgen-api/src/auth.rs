//! Supabase session authentication.
//!
//! Every protected route receives a Supabase access token in the
//! `Authorization: Bearer` header. The token is introspected against GoTrue
//! on each request rather than decoded locally, so revoked sessions are
//! rejected immediately.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use vidgen_supabase::{SupabaseError, User};

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The GoTrue user record
    pub user: User,
    /// The bearer token, forwarded to PostgREST so row level security
    /// applies to every query made on the user's behalf
    pub access_token: String,
}

impl AuthUser {
    /// Get user ID.
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

/// Axum extractor for authenticated user.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Get Authorization header
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        // Extract Bearer token
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        // Introspect against GoTrue
        let user = state.supabase.get_user(token).await.map_err(|e| match e {
            SupabaseError::Unauthorized(_) => ApiError::unauthorized("Unauthorized"),
            other => ApiError::from(other),
        })?;

        Ok(AuthUser {
            user,
            access_token: token.to_string(),
        })
    }
}
