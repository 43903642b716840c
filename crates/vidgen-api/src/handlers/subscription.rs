//! Subscription status handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use vidgen_models::SubscriptionStatus;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Subscription status response.
#[derive(Serialize)]
pub struct SubscriptionStatusResponse {
    pub subscription_status: SubscriptionStatus,
    pub videos_generated: u32,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}

/// Read the caller's billing state. Unlike the session bootstrap, a missing
/// profile is an error here, not a default.
pub async fn subscription_status(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<SubscriptionStatusResponse>> {
    let profile = state
        .profiles
        .get(&user.access_token, user.id())
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(Json(SubscriptionStatusResponse {
        subscription_status: profile.subscription_status,
        videos_generated: profile.videos_generated,
        stripe_customer_id: profile.stripe_customer_id,
        stripe_subscription_id: profile.stripe_subscription_id,
    }))
}
