//! Stripe REST client.
//!
//! Stripe's API is form-encoded; nested parameters use the bracket syntax
//! (`line_items[0][price]`). Only the endpoints the service actually calls
//! are covered.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::config::BillingConfig;
use crate::error::{BillingError, BillingResult};

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    config: BillingConfig,
}

impl StripeClient {
    /// Create a new Stripe client.
    pub fn new(config: BillingConfig) -> BillingResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vidgen-billing/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BillingError::Internal(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> BillingResult<Self> {
        Self::new(BillingConfig::from_env()?)
    }

    /// Make an authenticated request to Stripe.
    async fn stripe_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        form: Option<&[(&str, &str)]>,
    ) -> BillingResult<T> {
        let url = format!("{}{}", self.config.api_base, endpoint);

        let mut request = self
            .http
            .request(method, &url)
            .basic_auth(&self.config.secret_key, Option::<&str>::None);

        if let Some(form_data) = form {
            request = request.form(form_data);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Stripe API request failed");
            BillingError::Provider(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Stripe API error");
            return Err(BillingError::Provider(format!(
                "Stripe API error: {status}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Stripe response");
            BillingError::Internal(e.to_string())
        })
    }

    /// Retrieve a price.
    #[instrument(skip(self))]
    pub async fn retrieve_price(&self, price_id: &str) -> BillingResult<StripePrice> {
        debug!(price_id = %price_id, "Retrieving Stripe price");

        self.stripe_request(reqwest::Method::GET, &format!("/prices/{price_id}"), None)
            .await
    }

    /// Create a Stripe customer tagged with the owning user id.
    #[instrument(skip(self))]
    pub async fn create_customer(
        &self,
        email: &str,
        user_id: &str,
    ) -> BillingResult<StripeCustomer> {
        debug!(email = %email, user_id = %user_id, "Creating Stripe customer");

        let form = [("email", email), ("metadata[supabase_user_id]", user_id)];

        self.stripe_request(reqwest::Method::POST, "/customers", Some(&form))
            .await
    }

    /// Create a subscription checkout session for a single recurring price.
    #[instrument(skip(self))]
    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> BillingResult<StripeCheckoutSession> {
        debug!(customer_id = %customer_id, price_id = %price_id, "Creating checkout session");

        let form = [
            ("customer", customer_id),
            ("payment_method_types[0]", "card"),
            ("billing_address_collection", "required"),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("mode", "subscription"),
            ("allow_promotion_codes", "true"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];

        self.stripe_request(reqwest::Method::POST, "/checkout/sessions", Some(&form))
            .await
    }

    /// Create a billing portal session.
    #[instrument(skip(self))]
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> BillingResult<StripeBillingPortalSession> {
        debug!(customer_id = %customer_id, "Creating portal session");

        let form = [("customer", customer_id), ("return_url", return_url)];

        self.stripe_request(
            reqwest::Method::POST,
            "/billing_portal/sessions",
            Some(&form),
        )
        .await
    }

    /// Retrieve a subscription.
    #[instrument(skip(self))]
    pub async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> BillingResult<StripeSubscription> {
        debug!(subscription_id = %subscription_id, "Retrieving Stripe subscription");

        self.stripe_request(
            reqwest::Method::GET,
            &format!("/subscriptions/{subscription_id}"),
            None,
        )
        .await
    }
}

// Stripe API response types

/// Stripe price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePrice {
    /// Price ID
    pub id: String,
    /// Price type: `one_time` or `recurring`
    #[serde(rename = "type")]
    pub price_type: String,
}

impl StripePrice {
    /// Whether this price can back a subscription.
    pub fn is_recurring(&self) -> bool {
        self.price_type == "recurring"
    }
}

/// Stripe customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCustomer {
    /// Customer ID
    pub id: String,
    /// Customer email
    pub email: Option<String>,
}

/// Stripe checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCheckoutSession {
    /// Session ID
    pub id: String,
    /// Hosted checkout URL
    pub url: Option<String>,
    /// Customer ID
    pub customer: Option<String>,
    /// Subscription ID (after completion)
    pub subscription: Option<String>,
}

/// Stripe billing portal session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeBillingPortalSession {
    /// Session ID
    pub id: String,
    /// Portal URL
    pub url: String,
}

/// Stripe subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscription {
    /// Subscription ID
    pub id: String,
    /// Customer ID
    pub customer: String,
    /// Subscription status
    pub status: String,
}

// =============================================================================
// Tests
// =============================================================================
