//! Application state.

use std::sync::Arc;

use tracing::warn;
use vidgen_billing::{BillingConfig, StripeClient, WebhookHandler};
use vidgen_replicate::{ReplicateClient, ReplicateConfig};
use vidgen_supabase::{ProfileRepository, SupabaseClient, SupabaseConfig, VideoRepository};

use crate::config::ApiConfig;

/// Shared application state.
///
/// Stripe and Replicate are optional at startup: a missing key degrades the
/// routes that need it to a configuration error response instead of refusing
/// to boot.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub supabase: SupabaseClient,
    pub profiles: ProfileRepository,
    pub videos: VideoRepository,
    pub stripe: Option<Arc<StripeClient>>,
    pub webhooks: Option<Arc<WebhookHandler>>,
    pub replicate: Option<Arc<ReplicateClient>>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let supabase = SupabaseClient::new(SupabaseConfig::from_env()?)?;
        let profiles = ProfileRepository::new(supabase.clone());
        let videos = VideoRepository::new(supabase.clone());

        let stripe = match BillingConfig::from_env() {
            Ok(cfg) => Some(Arc::new(StripeClient::new(cfg)?)),
            Err(e) => {
                warn!(error = %e, "Stripe client disabled");
                None
            }
        };

        let webhooks = match WebhookHandler::from_env() {
            Ok(handler) => Some(Arc::new(handler)),
            Err(e) => {
                warn!(error = %e, "Stripe webhook verification disabled");
                None
            }
        };

        let replicate = match ReplicateConfig::from_env() {
            Ok(cfg) => Some(Arc::new(ReplicateClient::new(cfg)?)),
            Err(e) => {
                warn!(error = %e, "Video generation disabled");
                None
            }
        };

        Ok(Self {
            config,
            supabase,
            profiles,
            videos,
            stripe,
            webhooks,
            replicate,
        })
    }
}
