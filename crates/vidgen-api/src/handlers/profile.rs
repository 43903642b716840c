//! Session bootstrap handler.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use vidgen_models::{NewProfile, PlanLimits, Profile, SubscriptionStatus, Video};
use vidgen_supabase::User;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// User identity as exposed over the API.
#[derive(Serialize)]
pub struct ApiUser {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&User> for ApiUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name: user.user_metadata.full_name.clone(),
            avatar_url: user.user_metadata.avatar_url.clone(),
        }
    }
}

/// Session bootstrap response.
#[derive(Serialize)]
pub struct MeResponse {
    pub user: ApiUser,
    pub profile: Profile,
    pub limits: PlanLimits,
    pub videos: Vec<Video>,
}

/// Session bootstrap: the caller's identity, profile, plan limits, and videos
/// in one round trip. Creates the profile row on first sight; if that fails, a
/// default free-tier profile is substituted for this response and never
/// persisted.
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<MeResponse>> {
    let profile = get_or_bootstrap_profile(&state, &user).await;
    let limits = PlanLimits::for_tier(profile.plan());

    // A failed listing degrades to an empty gallery rather than a failed
    // bootstrap
    let videos = match state.videos.list_for_user(&user.access_token, user.id()).await {
        Ok(videos) => videos,
        Err(e) => {
            warn!(user_id = %user.id(), error = %e, "Video listing failed");
            Vec::new()
        }
    };

    Ok(Json(MeResponse {
        user: ApiUser::from(&user.user),
        profile,
        limits,
        videos,
    }))
}

async fn get_or_bootstrap_profile(state: &AppState, user: &AuthUser) -> Profile {
    match state.profiles.get(&user.access_token, user.id()).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            info!(user_id = %user.id(), "Profile not found, creating");
            let new_profile = NewProfile {
                id: user.id().to_string(),
                email: user.user.email.clone(),
                full_name: user.user.display_name(),
                subscription_status: SubscriptionStatus::Free,
                videos_generated: 0,
            };
            match state.profiles.create(&user.access_token, &new_profile).await {
                Ok(profile) => profile,
                Err(e) => {
                    error!(user_id = %user.id(), error = %e, "Profile creation failed");
                    default_profile(&user.user)
                }
            }
        }
        Err(e) => {
            error!(user_id = %user.id(), error = %e, "Unexpected profile error");
            default_profile(&user.user)
        }
    }
}

/// In-memory stand-in used when the profile row cannot be read or created.
fn default_profile(user: &User) -> Profile {
    let now = Utc::now();
    Profile {
        id: user.id.clone(),
        email: user.email.clone(),
        full_name: Some(user.display_name()),
        avatar_url: None,
        subscription_status: SubscriptionStatus::Free,
        stripe_customer_id: None,
        stripe_subscription_id: None,
        videos_generated: 0,
        created_at: Some(now),
        updated_at: Some(now),
    }
}
