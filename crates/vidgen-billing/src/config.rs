//! Billing configuration

use std::time::Duration;

use crate::error::{BillingError, BillingResult};

/// Default Stripe API base URL.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe client configuration.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Stripe secret key
    pub secret_key: String,
    /// API base URL; overridable for tests
    pub api_base: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl BillingConfig {
    /// Create a new billing config.
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: STRIPE_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Override the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> BillingResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| BillingError::config("STRIPE_SECRET_KEY must be set to reach Stripe"))?;
        if secret_key.is_empty() {
            return Err(BillingError::config("STRIPE_SECRET_KEY cannot be empty"));
        }

        let api_base =
            std::env::var("STRIPE_API_BASE").unwrap_or_else(|_| STRIPE_API_BASE.to_string());

        let timeout_secs: u64 = std::env::var("STRIPE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            secret_key,
            api_base,
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(5),
        })
    }
}
