//! Stripe checkout and billing portal handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Hosted Stripe session response (checkout or portal).
#[derive(Serialize)]
pub struct HostedSessionResponse {
    pub url: String,
}

/// Create a hosted checkout session for the Pro subscription.
pub async fn create_checkout(
    State(state): State<AppState>,
    user: Result<AuthUser, ApiError>,
) -> ApiResult<Json<HostedSessionResponse>> {
    let Some(stripe) = state.stripe.clone() else {
        return Err(ApiError::config(
            "Stripe is not configured. Please contact support.",
        ));
    };
    let Some(price_id) = state.config.stripe_pro_price_id.clone() else {
        return Err(ApiError::config(
            "Stripe pricing is not configured. Please contact support.",
        ));
    };
    let Some(site_url) = state.config.site_url.clone() else {
        return Err(ApiError::config(
            "Site URL is not configured. Please contact support.",
        ));
    };
    if !price_id.starts_with("price_") {
        warn!(price_id = %price_id, "Configured price id does not look like a Stripe price");
        return Err(ApiError::config(
            "Invalid Stripe price configuration. Please contact support.",
        ));
    }

    let user = user.map_err(|_| ApiError::unauthorized("You must be logged in to upgrade"))?;

    // The configured price must exist upstream and be recurring
    match stripe.retrieve_price(&price_id).await {
        Ok(price) if price.is_recurring() => {}
        Ok(_) => {
            return Err(ApiError::config(
                "Invalid price configuration - must be recurring for subscriptions.",
            ));
        }
        Err(e) => {
            warn!(price_id = %price_id, error = %e, "Price lookup failed");
            return Err(ApiError::config(
                "Invalid price ID. Please check your Stripe configuration.",
            ));
        }
    }

    let profile = match state.profiles.get(&user.access_token, user.id()).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return Err(ApiError::not_found("User profile not found")),
        Err(e) => {
            warn!(user_id = %user.id(), error = %e, "Profile lookup failed");
            return Err(ApiError::not_found("User profile not found"));
        }
    };

    if profile.subscription_status.is_active() {
        return Err(ApiError::bad_request(
            "You already have an active subscription",
        ));
    }

    // Reuse the stored customer; create one lazily otherwise. A profile that
    // already holds a customer id never gets a second customer.
    let customer_id = match profile.stripe_customer_id {
        Some(id) => id,
        None => {
            let email = user.user.email.as_deref().unwrap_or("");
            let customer = stripe.create_customer(email, user.id()).await?;
            info!(user_id = %user.id(), customer_id = %customer.id, "Created Stripe customer");

            // Best-effort persist; checkout still proceeds if the write fails
            if let Err(e) = state
                .profiles
                .set_stripe_customer(&user.access_token, user.id(), &customer.id)
                .await
            {
                warn!(user_id = %user.id(), error = %e, "Failed to persist Stripe customer id");
            }
            customer.id
        }
    };

    let session = stripe
        .create_checkout_session(
            &customer_id,
            &price_id,
            &format!("{site_url}/subscription?success=true"),
            &format!("{site_url}/subscription?canceled=true"),
        )
        .await?;

    metrics::record_checkout_session();
    info!(user_id = %user.id(), session_id = %session.id, "Checkout session created");

    let url = session
        .url
        .ok_or_else(|| ApiError::internal("Failed to create checkout session"))?;
    Ok(Json(HostedSessionResponse { url }))
}

/// Create a hosted billing portal session for subscription management.
pub async fn create_portal(
    State(state): State<AppState>,
    user: Result<AuthUser, ApiError>,
) -> ApiResult<Json<HostedSessionResponse>> {
    let Some(stripe) = state.stripe.clone() else {
        return Err(ApiError::config(
            "Stripe is not configured. Please contact support.",
        ));
    };
    let Some(site_url) = state.config.site_url.clone() else {
        return Err(ApiError::config(
            "Site URL is not configured. Please contact support.",
        ));
    };

    let user = user.map_err(|_| {
        ApiError::unauthorized("You must be logged in to manage your subscription")
    })?;

    // Portal access requires an existing billing customer; a missing profile
    // and a missing customer id look the same to the caller
    let customer_id = match state.profiles.get(&user.access_token, user.id()).await {
        Ok(Some(profile)) => profile.stripe_customer_id,
        Ok(None) => None,
        Err(e) => {
            warn!(user_id = %user.id(), error = %e, "Profile lookup failed");
            None
        }
    };
    let Some(customer_id) = customer_id else {
        return Err(ApiError::not_found("No subscription found to manage"));
    };

    let session = stripe
        .create_portal_session(&customer_id, &format!("{site_url}/subscription"))
        .await?;

    info!(user_id = %user.id(), session_id = %session.id, "Billing portal session created");

    Ok(Json(HostedSessionResponse { url: session.url }))
}
