//! Video listing handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use vidgen_models::Video;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Video listing response.
#[derive(Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<Video>,
}

/// List the caller's videos, newest first.
pub async fn list_videos(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<VideoListResponse>> {
    let videos = state
        .videos
        .list_for_user(&user.access_token, user.id())
        .await?;

    Ok(Json(VideoListResponse { videos }))
}
