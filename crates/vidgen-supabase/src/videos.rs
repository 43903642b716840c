//! Video repository over the `videos` table.

use tracing::info;

use vidgen_models::{NewVideo, Video, VideoStatus};

use crate::client::SupabaseClient;
use crate::error::SupabaseResult;

const TABLE: &str = "videos";

/// Repository for video rows. All operations run with the caller's access
/// token so row-level security scopes them to the owning user.
#[derive(Clone)]
pub struct VideoRepository {
    client: SupabaseClient,
}

impl VideoRepository {
    /// Create a new video repository.
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Insert a new video row and return the stored representation.
    pub async fn create(&self, token: &str, video: &NewVideo) -> SupabaseResult<Video> {
        let created: Video = self.client.insert_one(Some(token), TABLE, video).await?;
        info!(video_id = %created.id, user_id = %created.user_id, "Created video record");
        Ok(created)
    }

    /// List a user's videos, newest first.
    pub async fn list_for_user(&self, token: &str, user_id: &str) -> SupabaseResult<Vec<Video>> {
        self.client
            .select_list(
                Some(token),
                TABLE,
                &[("user_id", user_id)],
                Some("created_at.desc"),
            )
            .await
    }

    /// Store the generation outcome on an existing row.
    pub async fn set_result(
        &self,
        token: &str,
        video_id: &str,
        video_url: &str,
        status: VideoStatus,
    ) -> SupabaseResult<u64> {
        let body = serde_json::json!({
            "video_url": video_url,
            "status": status.as_str(),
        });
        self.client
            .update(Some(token), TABLE, &[("id", video_id)], &body)
            .await
    }
}
