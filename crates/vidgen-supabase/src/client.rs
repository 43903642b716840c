//! Supabase REST API client.
//!
//! Covers the two Supabase surfaces the service uses:
//! - PostgREST row access (`/rest/v1`) with per-request bearer tokens so
//!   row-level security applies to user reads and writes
//! - GoTrue auth calls (`/auth/v1`, see [`crate::auth`])
//!
//! HTTP client tuning (pooling, timeouts) and observability (tracing spans,
//! metrics) follow the same shape as the rest of the workspace clients.

use std::time::{Duration, Instant};

use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info_span, Instrument};

use crate::error::{SupabaseError, SupabaseResult};
use crate::metrics::record_request;

/// PostgREST media type for a single-object response.
const PGRST_OBJECT: &str = "application/vnd.pgrst.object+json";

/// PostgREST error code for "zero or many rows where one was requested".
const PGRST_NO_ROWS: &str = "PGRST116";

// =============================================================================
// Configuration
// =============================================================================

/// Supabase client configuration.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project base URL, e.g. `https://xyzcompany.supabase.co`
    pub url: String,
    /// Anon (publishable) API key; sent as `apikey` on every request
    pub anon_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl SupabaseConfig {
    /// Create config from environment variables.
    pub fn from_env() -> SupabaseResult<Self> {
        let raw_url = std::env::var("SUPABASE_URL")
            .map_err(|_| SupabaseError::config("SUPABASE_URL must be set to reach Supabase"))?;

        let parsed = url::Url::parse(&raw_url).map_err(|e| {
            SupabaseError::config(format!("SUPABASE_URL is not a valid URL: {}", e))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SupabaseError::config(
                "SUPABASE_URL must be an http(s) URL",
            ));
        }

        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| SupabaseError::config("SUPABASE_ANON_KEY must be set to reach Supabase"))?;
        if anon_key.is_empty() {
            return Err(SupabaseError::config("SUPABASE_ANON_KEY cannot be empty"));
        }

        let timeout_secs: u64 = std::env::var("SUPABASE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        let connect_timeout_secs: u64 = std::env::var("SUPABASE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            url: raw_url,
            anon_key,
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// Supabase REST API client.
#[derive(Clone)]
pub struct SupabaseClient {
    pub(crate) http: Client,
    pub(crate) config: SupabaseConfig,
    pub(crate) rest_base: String,
    pub(crate) auth_base: String,
}

impl SupabaseClient {
    /// Create a new Supabase client.
    pub fn new(config: SupabaseConfig) -> SupabaseResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vidgen-supabase/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SupabaseError::Network)?;

        let base = config.url.trim_end_matches('/').to_string();
        let rest_base = format!("{}/rest/v1", base);
        let auth_base = format!("{}/auth/v1", base);

        Ok(Self {
            http,
            config,
            rest_base,
            auth_base,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> SupabaseResult<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    /// Build a table URL with `eq` filters and an optional `order` clause.
    fn table_url(&self, table: &str, filters: &[(&str, &str)], order: Option<&str>) -> String {
        let mut params: Vec<String> = vec!["select=*".to_string()];
        for (column, value) in filters {
            params.push(format!("{}=eq.{}", column, urlencoding::encode(value)));
        }
        if let Some(order) = order {
            params.push(format!("order={}", order));
        }
        format!("{}/{}?{}", self.rest_base, table, params.join("&"))
    }

    /// Start a PostgREST request with the `apikey` and bearer headers.
    ///
    /// `token` is the caller's access token; without one the anon key doubles
    /// as the bearer, which under row-level security only reaches rows with
    /// public policies.
    pub(crate) fn rest_request(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let bearer = token.unwrap_or(&self.config.anon_key);
        self.http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    // =========================================================================
    // Row Operations
    // =========================================================================

    /// Fetch a single row, or `None` when no row matches the filters.
    pub async fn select_optional<T>(
        &self,
        token: Option<&str>,
        table: &str,
        filters: &[(&str, &str)],
    ) -> SupabaseResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let url = self.table_url(table, filters, None);

        self.execute_request("select_optional", table, async {
            let response = self
                .rest_request(Method::GET, &url, token)
                .header(header::ACCEPT, PGRST_OBJECT)
                .send()
                .await?;
            let status = response.status();

            match status {
                StatusCode::OK => {
                    let row: T = response.json().await?;
                    Ok(Some(row))
                }
                // PostgREST answers 406 with PGRST116 when the object request
                // matched zero rows, which callers treat as plain absence.
                StatusCode::NOT_ACCEPTABLE => {
                    let body = response.text().await.unwrap_or_default();
                    if body.contains(PGRST_NO_ROWS) {
                        Ok(None)
                    } else {
                        Err(SupabaseError::from_http_status(
                            status.as_u16(),
                            format!("{} failed: {}", url, body),
                        ))
                    }
                }
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Fetch all rows matching the filters, optionally ordered
    /// (e.g. `created_at.desc`).
    pub async fn select_list<T>(
        &self,
        token: Option<&str>,
        table: &str,
        filters: &[(&str, &str)],
        order: Option<&str>,
    ) -> SupabaseResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let url = self.table_url(table, filters, order);

        self.execute_request("select_list", table, async {
            let response = self.rest_request(Method::GET, &url, token).send().await?;
            let status = response.status();

            match status {
                StatusCode::OK => {
                    let rows: Vec<T> = response.json().await?;
                    Ok(rows)
                }
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Insert one row and return the stored representation.
    pub async fn insert_one<T, B>(
        &self,
        token: Option<&str>,
        table: &str,
        body: &B,
    ) -> SupabaseResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}/{}", self.rest_base, table);

        self.execute_request("insert_one", table, async {
            let response = self
                .rest_request(Method::POST, &url, token)
                .header("Prefer", "return=representation")
                .header(header::ACCEPT, PGRST_OBJECT)
                .json(body)
                .send()
                .await?;
            let status = response.status();

            match status {
                StatusCode::OK | StatusCode::CREATED => {
                    let row: T = response.json().await?;
                    Ok(row)
                }
                StatusCode::CONFLICT => {
                    let body_text = response.text().await.unwrap_or_default();
                    Err(SupabaseError::AlreadyExists(format!(
                        "{} failed: {}",
                        url, body_text
                    )))
                }
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Update rows matching the filters; returns how many rows were touched.
    ///
    /// Zero is a valid outcome (no row matched the filters), so callers that
    /// key updates on external ids can detect and log no-ops.
    pub async fn update<B>(
        &self,
        token: Option<&str>,
        table: &str,
        filters: &[(&str, &str)],
        body: &B,
    ) -> SupabaseResult<u64>
    where
        B: Serialize + ?Sized,
    {
        let mut params: Vec<String> = Vec::new();
        for (column, value) in filters {
            params.push(format!("{}=eq.{}", column, urlencoding::encode(value)));
        }
        let url = format!("{}/{}?{}", self.rest_base, table, params.join("&"));

        self.execute_request("update", table, async {
            let response = self
                .rest_request(Method::PATCH, &url, token)
                .header("Prefer", "return=representation")
                .json(body)
                .send()
                .await?;
            let status = response.status();

            match status {
                StatusCode::OK => {
                    let rows: Vec<serde_json::Value> = response.json().await?;
                    Ok(rows.len() as u64)
                }
                StatusCode::NO_CONTENT => Ok(0),
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Probe the auth service health endpoint.
    pub async fn health(&self) -> SupabaseResult<()> {
        let url = format!("{}/health", self.auth_base);
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.config.anon_key)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            Err(Self::handle_error_response(status, &url, response).await)
        }
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Execute a request with tracing and metrics.
    pub(crate) async fn execute_request<T, F>(
        &self,
        operation: &str,
        target: &str,
        fut: F,
    ) -> SupabaseResult<T>
    where
        F: std::future::Future<Output = SupabaseResult<T>>,
    {
        let span = info_span!("supabase_request", operation = %operation, target = %target);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    pub(crate) async fn handle_error_response(
        status: StatusCode,
        url: &str,
        response: reqwest::Response,
    ) -> SupabaseError {
        let body = response.text().await.unwrap_or_default();
        SupabaseError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

// =============================================================================
// Tests
// =============================================================================
