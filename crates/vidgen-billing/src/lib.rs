//! Stripe billing integration.
//!
//! A raw REST client (form-encoded requests over reqwest) for the handful of
//! Stripe endpoints the service touches, plus webhook signature verification
//! and typed event parsing. Subscription state itself lives in the profiles
//! table; this crate only talks to Stripe.

pub mod client;
pub mod config;
pub mod error;
pub mod webhook;

pub use client::{
    StripeBillingPortalSession, StripeCheckoutSession, StripeClient, StripeCustomer, StripePrice,
    StripeSubscription,
};
pub use config::BillingConfig;
pub use error::{BillingError, BillingResult};
pub use webhook::{
    CheckoutSessionData, InvoiceData, SubscriptionData, WebhookEvent, WebhookEventData,
    WebhookEventType, WebhookHandler,
};
