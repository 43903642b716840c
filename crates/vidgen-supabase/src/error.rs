//! Supabase error types.

use thiserror::Error;

/// Result type for Supabase operations.
pub type SupabaseResult<T> = Result<T, SupabaseError>;

/// Errors that can occur during Supabase operations.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Row already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SupabaseError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP status to an error variant.
    pub fn from_http_status(status: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match status {
            401 => SupabaseError::Unauthorized(msg),
            403 => SupabaseError::PermissionDenied(msg),
            404 => SupabaseError::NotFound(msg),
            409 => SupabaseError::AlreadyExists(msg),
            429 => SupabaseError::RateLimited(1000),
            500..=599 => SupabaseError::ServerError(status, msg),
            _ => SupabaseError::RequestFailed(msg),
        }
    }

    /// HTTP status this error maps back to, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SupabaseError::Unauthorized(_) => Some(401),
            SupabaseError::PermissionDenied(_) => Some(403),
            SupabaseError::NotFound(_) => Some(404),
            SupabaseError::AlreadyExists(_) => Some(409),
            SupabaseError::RateLimited(_) => Some(429),
            SupabaseError::ServerError(status, _) => Some(*status),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SupabaseError::Network(_)
                | SupabaseError::RateLimited(_)
                | SupabaseError::ServerError(_, _)
        )
    }
}
