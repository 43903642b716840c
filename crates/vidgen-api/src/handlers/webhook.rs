//! Stripe webhook ingestion.
//!
//! Signature verification gates everything; after that, each event applies
//! one absolute-value update keyed by the Stripe customer id. Per-event
//! persistence failures are logged and still acknowledged so Stripe does not
//! redeliver an event whose effect is a logged no-op; only a failed
//! subscription re-fetch fails the whole delivery.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};

use vidgen_billing::{WebhookEventData, WebhookEventType};
use vidgen_models::SubscriptionStatus;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Webhook acknowledgment response.
#[derive(Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
}

/// Ingest a Stripe webhook event.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAckResponse>> {
    let Some(handler) = state.webhooks.clone() else {
        return Err(ApiError::config("Webhook secret not configured"));
    };

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let event = match handler.verify_and_parse(&body, signature) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Webhook signature verification failed");
            return Err(ApiError::bad_request("Invalid signature"));
        }
    };

    info!(event_id = %event.id, event_type = %event.event_type, "Processing webhook event");
    let label = event.event_type.as_str().to_string();

    match (&event.event_type, &event.data) {
        (
            WebhookEventType::CustomerSubscriptionCreated
            | WebhookEventType::CustomerSubscriptionUpdated,
            WebhookEventData::Subscription(sub),
        ) => {
            info!(
                customer_id = %sub.customer_id,
                status = %sub.status,
                "Updating subscription state"
            );
            if let Err(e) = state
                .profiles
                .update_subscription_by_customer(
                    &sub.customer_id,
                    &SubscriptionStatus::from(sub.status.as_str()),
                    Some(&sub.subscription_id),
                )
                .await
            {
                error!(customer_id = %sub.customer_id, error = %e, "Failed to update profile");
            }
        }

        (WebhookEventType::CustomerSubscriptionDeleted, WebhookEventData::Subscription(sub)) => {
            info!(customer_id = %sub.customer_id, "Canceling subscription");
            if let Err(e) = state
                .profiles
                .update_subscription_by_customer(
                    &sub.customer_id,
                    &SubscriptionStatus::Canceled,
                    None,
                )
                .await
            {
                error!(customer_id = %sub.customer_id, error = %e, "Failed to cancel subscription");
            }
        }

        (WebhookEventType::InvoicePaymentSucceeded, WebhookEventData::Invoice(inv)) => {
            info!(customer_id = %inv.customer_id, "Payment succeeded, resetting monthly usage");
            if let Err(e) = state.profiles.reset_usage_by_customer(&inv.customer_id).await {
                error!(customer_id = %inv.customer_id, error = %e, "Failed to reset usage");
            }
        }

        (WebhookEventType::CheckoutSessionCompleted, WebhookEventData::CheckoutSession(session)) => {
            info!(customer_id = %session.customer_id, "Checkout completed");

            // Re-fetch the subscription for its authoritative status. Unlike
            // the row updates above, a failure here fails the delivery so
            // Stripe retries it.
            if session.mode == "subscription" {
                if let Some(subscription_id) = &session.subscription_id {
                    let Some(stripe) = state.stripe.clone() else {
                        error!("Stripe client unavailable for subscription re-fetch");
                        metrics::record_webhook_event(&label, "failed");
                        return Err(ApiError::internal("Webhook handler failed"));
                    };

                    let subscription = match stripe.retrieve_subscription(subscription_id).await {
                        Ok(subscription) => subscription,
                        Err(e) => {
                            error!(
                                subscription_id = %subscription_id,
                                error = %e,
                                "Failed to re-fetch subscription after checkout"
                            );
                            metrics::record_webhook_event(&label, "failed");
                            return Err(ApiError::internal("Webhook handler failed"));
                        }
                    };

                    if let Err(e) = state
                        .profiles
                        .update_subscription_by_customer(
                            &session.customer_id,
                            &SubscriptionStatus::from(subscription.status.as_str()),
                            Some(&subscription.id),
                        )
                        .await
                    {
                        error!(
                            customer_id = %session.customer_id,
                            error = %e,
                            "Failed to update profile after checkout"
                        );
                    }
                }
            }
        }

        (WebhookEventType::Unknown(event_type), _) => {
            info!(event_type = %event_type, "Unhandled event type");
        }

        // Parsing ties each known type to its data shape; other pairings
        // cannot be constructed
        _ => {}
    }

    metrics::record_webhook_event(&label, "ok");
    Ok(Json(WebhookAckResponse { received: true }))
}
