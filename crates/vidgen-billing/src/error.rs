//! Billing errors

use thiserror::Error;

/// Result type for billing operations.
pub type BillingResult<T> = Result<T, BillingError>;

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Required configuration missing or malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// Stripe API call failed
    #[error("provider error: {0}")]
    Provider(String),

    /// Webhook verification or parsing error
    #[error("webhook error: {0}")]
    Webhook(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error came from the payment provider.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}
