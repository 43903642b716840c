//! Replicate client error types.

use thiserror::Error;

pub type GenerationResult<T> = Result<T, GenerationError>;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Generation failed: {0}")]
    Failed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenerationError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
