//! Generated video records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle of a video record.
///
/// Records are inserted as `generating` and flipped to `completed` once the
/// model returns a URL. A record that never completes stays `generating`;
/// there is no failure state in the store. Unknown strings round-trip
/// through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum VideoStatus {
    #[default]
    Generating,
    Completed,
    Other(String),
}

impl VideoStatus {
    pub fn as_str(&self) -> &str {
        match self {
            VideoStatus::Generating => "generating",
            VideoStatus::Completed => "completed",
            VideoStatus::Other(s) => s,
        }
    }
}

impl From<String> for VideoStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "generating" => VideoStatus::Generating,
            "completed" => VideoStatus::Completed,
            _ => VideoStatus::Other(s),
        }
    }
}

impl From<VideoStatus> for String {
    fn from(status: VideoStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl JsonSchema for VideoStatus {
    fn schema_name() -> String {
        "VideoStatus".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// A row in the `videos` table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    pub id: String,
    pub user_id: String,
    pub prompt: String,
    #[serde(default)]
    pub video_url: Option<String>,
    pub status: VideoStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields sent when creating a video row.
#[derive(Debug, Clone, Serialize)]
pub struct NewVideo {
    pub user_id: String,
    pub prompt: String,
    pub status: VideoStatus,
}

impl NewVideo {
    /// A record for a generation that has just started.
    pub fn generating(user_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            prompt: prompt.into(),
            status: VideoStatus::Generating,
        }
    }
}
