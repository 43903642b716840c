//! Video generation handler.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use vidgen_models::{NewVideo, VideoStatus};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Video generation request.
#[derive(Debug, Deserialize)]
pub struct GenerateVideoRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Video generation response.
#[derive(Serialize)]
pub struct GenerateVideoResponse {
    pub success: bool,
    #[serde(rename = "videoUrl")]
    pub video_url: String,
}

/// Generate a video from a prompt.
///
/// The generation call is synchronous and may block for minutes; no lock is
/// held while waiting, and the quota counter is written back from the value
/// read at the start of the request.
pub async fn generate_video(
    State(state): State<AppState>,
    user: Result<AuthUser, ApiError>,
    request: Option<Json<GenerateVideoRequest>>,
) -> ApiResult<Json<GenerateVideoResponse>> {
    let Some(replicate) = state.replicate.clone() else {
        return Err(ApiError::config(
            "Server mis-configuration: REPLICATE_API_TOKEN not set.",
        ));
    };

    let user = user.map_err(|_| ApiError::unauthorized("Unauthorized"))?;

    // Load profile for the quota gate
    let profile = match state.profiles.get(&user.access_token, user.id()).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return Err(ApiError::not_found("Profile not found")),
        Err(e) => {
            warn!(user_id = %user.id(), error = %e, "Profile lookup failed");
            return Err(ApiError::not_found("Profile not found"));
        }
    };

    if profile.videos_remaining() == 0 {
        info!(
            user_id = %user.id(),
            plan = %profile.plan(),
            videos_generated = profile.videos_generated,
            limit = profile.videos_per_month(),
            "Monthly video limit reached"
        );
        return Err(ApiError::forbidden(
            "Monthly video limit reached. Upgrade to Pro for more videos.",
        ));
    }

    // Prompt check comes after the quota gate; an over-limit caller sees the
    // quota error even with a bad body
    let prompt = request
        .and_then(|Json(r)| r.prompt)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Prompt is required"))?;

    // Insert the record before calling out; a failed generation leaves it
    // permanently in `generating`
    let video = state
        .videos
        .create(&user.access_token, &NewVideo::generating(user.id(), &prompt))
        .await
        .map_err(|e| {
            error!(user_id = %user.id(), error = %e, "Failed to insert video record");
            ApiError::internal("Failed to generate video")
        })?;

    let start = Instant::now();
    let video_url = match replicate.generate(&prompt).await {
        Ok(Some(url)) => url,
        Ok(None) => {
            metrics::record_generation("no_output", start.elapsed().as_secs_f64());
            warn!(video_id = %video.id, "Replicate returned no output URL");
            return Err(ApiError::bad_gateway(
                "Replicate did not return a video URL.",
            ));
        }
        Err(e) => {
            metrics::record_generation("error", start.elapsed().as_secs_f64());
            error!(video_id = %video.id, error = %e, "Video generation failed");
            return Err(ApiError::internal("Failed to generate video"));
        }
    };
    metrics::record_generation("success", start.elapsed().as_secs_f64());

    // Completion writes: video row first, then the counter. No cross-row
    // transaction; two in-flight generations can both pass the gate above.
    if let Err(e) = state
        .videos
        .set_result(
            &user.access_token,
            &video.id,
            &video_url,
            VideoStatus::Completed,
        )
        .await
    {
        error!(video_id = %video.id, error = %e, "Failed to mark video completed");
        return Err(ApiError::internal("Failed to generate video"));
    }
    if let Err(e) = state
        .profiles
        .set_videos_generated(&user.access_token, user.id(), profile.videos_generated + 1)
        .await
    {
        error!(user_id = %user.id(), error = %e, "Failed to increment usage counter");
        return Err(ApiError::internal("Failed to generate video"));
    }

    info!(
        user_id = %user.id(),
        video_id = %video.id,
        videos_generated = profile.videos_generated + 1,
        "Video generated"
    );

    Ok(Json(GenerateVideoResponse {
        success: true,
        video_url,
    }))
}
