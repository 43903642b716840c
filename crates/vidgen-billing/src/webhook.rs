//! Stripe webhook handling
//!
//! Verifies the `Stripe-Signature` header (HMAC-SHA256 over
//! `timestamp.payload`, constant-time compare, 5 minute tolerance) and parses
//! the event into the types the subscription lifecycle cares about. Dispatch
//! lives in the HTTP layer; this module only verifies and parses.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use crate::error::{BillingError, BillingResult};

/// Webhook event types we handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    /// Checkout session completed
    CheckoutSessionCompleted,
    /// Customer subscription created
    CustomerSubscriptionCreated,
    /// Customer subscription updated
    CustomerSubscriptionUpdated,
    /// Customer subscription deleted
    CustomerSubscriptionDeleted,
    /// Invoice payment succeeded (monthly usage reset)
    InvoicePaymentSucceeded,
    /// Unknown event type
    Unknown(String),
}

impl From<&str> for WebhookEventType {
    fn from(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl WebhookEventType {
    /// The wire name of the event type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CustomerSubscriptionCreated => "customer.subscription.created",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed webhook event
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Event ID
    pub id: String,
    /// Event type
    pub event_type: WebhookEventType,
    /// Event data
    pub data: WebhookEventData,
    /// When the event was created (Unix timestamp)
    pub created: i64,
}

/// Webhook event data
#[derive(Debug, Clone)]
pub enum WebhookEventData {
    /// Subscription data
    Subscription(SubscriptionData),
    /// Invoice data
    Invoice(InvoiceData),
    /// Checkout session data
    CheckoutSession(CheckoutSessionData),
    /// Raw JSON for unknown events
    Raw(serde_json::Value),
}

/// Subscription event data
#[derive(Debug, Clone)]
pub struct SubscriptionData {
    /// Subscription ID
    pub subscription_id: String,
    /// Customer ID
    pub customer_id: String,
    /// Status string as reported by Stripe
    pub status: String,
}

/// Invoice event data
#[derive(Debug, Clone)]
pub struct InvoiceData {
    /// Customer ID
    pub customer_id: String,
}

/// Checkout session completed data
#[derive(Debug, Clone)]
pub struct CheckoutSessionData {
    /// Session ID
    pub session_id: String,
    /// Checkout mode (`subscription` or `payment`)
    pub mode: String,
    /// Customer ID
    pub customer_id: String,
    /// Subscription ID
    pub subscription_id: Option<String>,
}

/// Webhook handler for verifying and parsing Stripe events
#[derive(Clone)]
pub struct WebhookHandler {
    webhook_secret: String,
}

impl WebhookHandler {
    /// Create a new webhook handler.
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Create from the `STRIPE_WEBHOOK_SECRET` environment variable.
    pub fn from_env() -> BillingResult<Self> {
        let secret = std::env::var("STRIPE_WEBHOOK_SECRET").map_err(|_| {
            BillingError::config("STRIPE_WEBHOOK_SECRET must be set to verify webhooks")
        })?;
        if secret.is_empty() {
            return Err(BillingError::config("STRIPE_WEBHOOK_SECRET cannot be empty"));
        }
        Ok(Self::new(secret))
    }

    /// Verify and parse a webhook payload.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> BillingResult<WebhookEvent> {
        self.verify_signature(payload, signature)?;

        let raw_event: RawStripeEvent = serde_json::from_slice(payload)
            .map_err(|e| BillingError::Webhook(e.to_string()))?;

        debug!(event_id = %raw_event.id, event_type = %raw_event.event_type, "Parsed webhook event");

        let event_type = WebhookEventType::from(raw_event.event_type.as_str());
        let data = Self::parse_event_data(&event_type, raw_event.data.object)?;

        Ok(WebhookEvent {
            id: raw_event.id,
            event_type,
            data,
            created: raw_event.created,
        })
    }

    /// Verify the Stripe webhook signature.
    fn verify_signature(&self, payload: &[u8], signature: &str) -> BillingResult<()> {
        // Parse signature header: t=timestamp,v1=signature
        let mut timestamp: Option<&str> = None;
        let mut sig_v1: Option<&str> = None;

        for part in signature.split(',') {
            if let Some((key, value)) = part.split_once('=') {
                match key {
                    "t" => timestamp = Some(value),
                    "v1" => sig_v1 = Some(value),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            warn!("Missing timestamp in webhook signature");
            BillingError::Webhook("Missing timestamp".to_string())
        })?;

        let sig_v1 = sig_v1.ok_or_else(|| {
            warn!("Missing v1 signature in webhook signature");
            BillingError::Webhook("Missing signature".to_string())
        })?;

        // Build signed payload
        let signed_payload = format!(
            "{}.{}",
            timestamp,
            std::str::from_utf8(payload)
                .map_err(|_| BillingError::Webhook("Invalid payload encoding".to_string()))?
        );

        // Compute expected signature
        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| BillingError::Internal("HMAC error".to_string()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        // Compare signatures (constant-time)
        if !constant_time_eq(sig_v1.as_bytes(), expected.as_bytes()) {
            error!("Webhook signature verification failed");
            return Err(BillingError::Webhook(
                "Signature verification failed".to_string(),
            ));
        }

        // Check timestamp freshness (within 5 minutes)
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| BillingError::Webhook("Invalid timestamp format".to_string()))?;
        let now = Utc::now().timestamp();
        if (now - ts).abs() > 300 {
            warn!(timestamp = ts, now = now, "Webhook timestamp too old");
            return Err(BillingError::Webhook("Timestamp too old".to_string()));
        }

        Ok(())
    }

    /// Parse event data based on type.
    fn parse_event_data(
        event_type: &WebhookEventType,
        object: serde_json::Value,
    ) -> BillingResult<WebhookEventData> {
        match event_type {
            WebhookEventType::CustomerSubscriptionCreated
            | WebhookEventType::CustomerSubscriptionUpdated
            | WebhookEventType::CustomerSubscriptionDeleted => {
                let sub: RawSubscription = serde_json::from_value(object)
                    .map_err(|e| BillingError::Webhook(e.to_string()))?;
                Ok(WebhookEventData::Subscription(SubscriptionData {
                    subscription_id: sub.id,
                    customer_id: sub.customer,
                    status: sub.status,
                }))
            }
            WebhookEventType::InvoicePaymentSucceeded => {
                let inv: RawInvoice = serde_json::from_value(object)
                    .map_err(|e| BillingError::Webhook(e.to_string()))?;
                Ok(WebhookEventData::Invoice(InvoiceData {
                    customer_id: inv.customer.unwrap_or_default(),
                }))
            }
            WebhookEventType::CheckoutSessionCompleted => {
                let session: RawCheckoutSession = serde_json::from_value(object)
                    .map_err(|e| BillingError::Webhook(e.to_string()))?;
                Ok(WebhookEventData::CheckoutSession(CheckoutSessionData {
                    session_id: session.id,
                    mode: session.mode.unwrap_or_default(),
                    customer_id: session.customer.unwrap_or_default(),
                    subscription_id: session.subscription,
                }))
            }
            WebhookEventType::Unknown(_) => {
                info!("Received unknown webhook event type");
                Ok(WebhookEventData::Raw(object))
            }
        }
    }
}

/// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

// Raw Stripe event shapes for parsing

#[derive(Debug, Deserialize)]
struct RawStripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
    created: i64,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawSubscription {
    id: String,
    customer: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct RawInvoice {
    customer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    id: String,
    mode: Option<String>,
    customer: Option<String>,
    subscription: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
