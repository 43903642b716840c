//! Replicate predictions HTTP client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{GenerationError, GenerationResult};

/// Default model identifier.
const DEFAULT_MODEL: &str = "google/veo-3";

/// Default API base URL.
const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";

/// Configuration for the Replicate client.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    /// API token
    pub api_token: String,
    /// Model identifier, `owner/name`
    pub model: String,
    /// API base URL; overridable for tests
    pub base_url: String,
    /// Delay between poll requests
    pub poll_interval: Duration,
    /// Per-request timeout; the poll loop itself has no deadline
    pub request_timeout: Duration,
}

impl ReplicateConfig {
    /// Create config from environment variables.
    pub fn from_env() -> GenerationResult<Self> {
        let api_token = std::env::var("REPLICATE_API_TOKEN").map_err(|_| {
            GenerationError::config("REPLICATE_API_TOKEN must be set to generate videos")
        })?;
        if api_token.is_empty() {
            return Err(GenerationError::config("REPLICATE_API_TOKEN cannot be empty"));
        }

        let poll_interval_ms: u64 = std::env::var("REPLICATE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        Ok(Self {
            api_token,
            model: std::env::var("REPLICATE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("REPLICATE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_secs(30),
        })
    }
}

/// A prediction as returned by the Replicate API.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub urls: PredictionUrls,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionUrls {
    pub get: Option<String>,
    pub cancel: Option<String>,
}

impl Prediction {
    /// Whether the prediction has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }
}

/// Client for the Replicate predictions API.
#[derive(Clone)]
pub struct ReplicateClient {
    http: Client,
    config: ReplicateConfig,
}

impl ReplicateClient {
    /// Create a new Replicate client.
    pub fn new(config: ReplicateConfig) -> GenerationResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("vidgen-replicate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GenerationError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> GenerationResult<Self> {
        Self::new(ReplicateConfig::from_env()?)
    }

    /// Run a generation to completion and return the first output URL,
    /// or `None` when the model produced no usable URL.
    ///
    /// Blocks for as long as the model takes; callers that need a deadline
    /// must impose their own.
    pub async fn generate(&self, prompt: &str) -> GenerationResult<Option<String>> {
        let mut prediction = self.create_prediction(prompt).await?;
        info!(prediction_id = %prediction.id, model = %self.config.model, "Created prediction");

        while !prediction.is_terminal() {
            tokio::time::sleep(self.config.poll_interval).await;
            prediction = self.get_prediction(&prediction).await?;
            debug!(prediction_id = %prediction.id, status = %prediction.status, "Polled prediction");
        }

        match prediction.status.as_str() {
            "succeeded" => Ok(normalize_output(prediction.output.as_ref())),
            _ => {
                let detail = prediction
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| prediction.status.clone());
                warn!(prediction_id = %prediction.id, status = %prediction.status, "Prediction did not succeed");
                Err(GenerationError::Failed(detail))
            }
        }
    }

    /// Create a prediction for the configured model.
    pub async fn create_prediction(&self, prompt: &str) -> GenerationResult<Prediction> {
        let url = format!(
            "{}/models/{}/predictions",
            self.config.base_url, self.config.model
        );
        let body = serde_json::json!({ "input": { "prompt": prompt } });

        debug!(model = %self.config.model, "Creating prediction");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        match status {
            StatusCode::OK | StatusCode::CREATED => {
                let prediction: Prediction = response.json().await?;
                Ok(prediction)
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(GenerationError::RequestFailed(format!(
                    "Replicate returned {}: {}",
                    status, body
                )))
            }
        }
    }

    /// Fetch the latest state of a prediction.
    async fn get_prediction(&self, prediction: &Prediction) -> GenerationResult<Prediction> {
        let url = match &prediction.urls.get {
            Some(get_url) => get_url.clone(),
            None => format!("{}/predictions/{}", self.config.base_url, prediction.id),
        };

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            let prediction: Prediction = response.json().await?;
            Ok(prediction)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(GenerationError::RequestFailed(format!(
                "Replicate returned {}: {}",
                status, body
            )))
        }
    }
}

/// Reduce model output to a single URL. Models return either a plain string
/// or an ordered list of URLs; the first entry is canonical.
fn normalize_output(output: Option<&serde_json::Value>) -> Option<String> {
    match output {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Array(items)) => items.iter().find_map(|item| match item {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
