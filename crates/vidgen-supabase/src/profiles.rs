//! Profile repository over the `profiles` table.

use tracing::{info, warn};

use vidgen_models::{NewProfile, Profile, SubscriptionStatus};

use crate::client::SupabaseClient;
use crate::error::SupabaseResult;

const TABLE: &str = "profiles";

/// Repository for profile rows.
///
/// User-scoped reads and writes take the caller's access token so row-level
/// security applies. Webhook-side updates are keyed by Stripe customer id and
/// run without a user token.
#[derive(Clone)]
pub struct ProfileRepository {
    client: SupabaseClient,
}

impl ProfileRepository {
    /// Create a new profile repository.
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Get a profile by user id.
    pub async fn get(&self, token: &str, user_id: &str) -> SupabaseResult<Option<Profile>> {
        self.client
            .select_optional(Some(token), TABLE, &[("id", user_id)])
            .await
    }

    /// Insert a new profile row and return the stored representation.
    pub async fn create(&self, token: &str, profile: &NewProfile) -> SupabaseResult<Profile> {
        let created: Profile = self.client.insert_one(Some(token), TABLE, profile).await?;
        info!(user_id = %created.id, "Created profile");
        Ok(created)
    }

    /// Attach a Stripe customer id to a profile.
    pub async fn set_stripe_customer(
        &self,
        token: &str,
        user_id: &str,
        customer_id: &str,
    ) -> SupabaseResult<u64> {
        let body = serde_json::json!({ "stripe_customer_id": customer_id });
        self.client
            .update(Some(token), TABLE, &[("id", user_id)], &body)
            .await
    }

    /// Set the absolute monthly usage counter for a user.
    pub async fn set_videos_generated(
        &self,
        token: &str,
        user_id: &str,
        count: u32,
    ) -> SupabaseResult<u64> {
        let body = serde_json::json!({ "videos_generated": count });
        self.client
            .update(Some(token), TABLE, &[("id", user_id)], &body)
            .await
    }

    /// Set subscription status and subscription id for whatever profile owns
    /// the Stripe customer. `subscription_id: None` serializes as an explicit
    /// null, clearing the stored reference.
    pub async fn update_subscription_by_customer(
        &self,
        customer_id: &str,
        status: &SubscriptionStatus,
        subscription_id: Option<&str>,
    ) -> SupabaseResult<u64> {
        let body = serde_json::json!({
            "subscription_status": status.as_str(),
            "stripe_subscription_id": subscription_id,
        });
        let rows = self
            .client
            .update(None, TABLE, &[("stripe_customer_id", customer_id)], &body)
            .await?;
        if rows == 0 {
            warn!(customer_id = %customer_id, "No profile matched Stripe customer");
        }
        Ok(rows)
    }

    /// Reset the monthly usage counter for whatever profile owns the Stripe
    /// customer.
    pub async fn reset_usage_by_customer(&self, customer_id: &str) -> SupabaseResult<u64> {
        let body = serde_json::json!({ "videos_generated": 0 });
        let rows = self
            .client
            .update(None, TABLE, &[("stripe_customer_id", customer_id)], &body)
            .await?;
        if rows == 0 {
            warn!(customer_id = %customer_id, "No profile matched Stripe customer");
        }
        Ok(rows)
    }
}
