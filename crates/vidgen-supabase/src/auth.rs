//! GoTrue auth API: token introspection, PKCE code exchange, sign-out.

use reqwest::StatusCode;
use serde::Deserialize;

use crate::client::SupabaseClient;
use crate::error::{SupabaseError, SupabaseResult};

/// An authenticated Supabase user, as returned by GoTrue.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// The subset of GoTrue user metadata the service reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl User {
    /// Display name with the same fallback chain the profile bootstrap uses:
    /// metadata full name, then plain name, then the email local part,
    /// then "User".
    pub fn display_name(&self) -> String {
        if let Some(full_name) = &self.user_metadata.full_name {
            if !full_name.is_empty() {
                return full_name.clone();
            }
        }
        if let Some(name) = &self.user_metadata.name {
            if !name.is_empty() {
                return name.clone();
            }
        }
        if let Some(email) = &self.email {
            if let Some(local) = email.split('@').next() {
                if !local.is_empty() {
                    return local.to_string();
                }
            }
        }
        "User".to_string()
    }
}

/// A GoTrue session, as returned by the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: User,
}

impl SupabaseClient {
    /// Resolve the user a bearer access token belongs to.
    pub async fn get_user(&self, access_token: &str) -> SupabaseResult<User> {
        let url = format!("{}/user", self.auth_base);

        self.execute_request("get_user", "auth", async {
            let response = self
                .http
                .get(&url)
                .header("apikey", &self.config.anon_key)
                .bearer_auth(access_token)
                .send()
                .await?;
            let status = response.status();

            match status {
                StatusCode::OK => {
                    let user: User = response.json().await?;
                    Ok(user)
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    let body = response.text().await.unwrap_or_default();
                    Err(SupabaseError::Unauthorized(format!(
                        "access token rejected: {}",
                        body
                    )))
                }
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Exchange a PKCE auth code for a session.
    pub async fn exchange_code(&self, auth_code: &str) -> SupabaseResult<Session> {
        let url = format!("{}/token?grant_type=pkce", self.auth_base);
        let body = serde_json::json!({ "auth_code": auth_code });

        self.execute_request("exchange_code", "auth", async {
            let response = self
                .http
                .post(&url)
                .header("apikey", &self.config.anon_key)
                .json(&body)
                .send()
                .await?;
            let status = response.status();

            match status {
                StatusCode::OK => {
                    let session: Session = response.json().await?;
                    Ok(session)
                }
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Revoke the session behind an access token.
    pub async fn sign_out(&self, access_token: &str) -> SupabaseResult<()> {
        let url = format!("{}/logout", self.auth_base);

        self.execute_request("sign_out", "auth", async {
            let response = self
                .http
                .post(&url)
                .header("apikey", &self.config.anon_key)
                .bearer_auth(access_token)
                .send()
                .await?;
            let status = response.status();

            match status {
                StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
                StatusCode::UNAUTHORIZED => {
                    let body = response.text().await.unwrap_or_default();
                    Err(SupabaseError::Unauthorized(format!(
                        "access token rejected: {}",
                        body
                    )))
                }
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn user(full_name: Option<&str>, name: Option<&str>, email: Option<&str>) -> User {
        User {
            id: "user-1".to_string(),
            email: email.map(String::from),
            user_metadata: UserMetadata {
                full_name: full_name.map(String::from),
                name: name.map(String::from),
                avatar_url: None,
            },
        }
    }

    #[test]
    fn test_display_name_prefers_full_name() {
        let u = user(Some("Ada Lovelace"), Some("ada"), Some("ada@example.com"));
        assert_eq!(u.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_display_name_falls_back_to_name() {
        let u = user(None, Some("ada"), Some("ada@example.com"));
        assert_eq!(u.display_name(), "ada");
    }

    #[test]
    fn test_display_name_falls_back_to_email_local_part() {
        let u = user(None, None, Some("ada@example.com"));
        assert_eq!(u.display_name(), "ada");
    }

    #[test]
    fn test_display_name_defaults_to_user() {
        let u = user(None, None, None);
        assert_eq!(u.display_name(), "User");
    }

    #[test]
    fn test_user_deserializes_without_metadata() {
        let u: User = serde_json::from_str(r#"{"id":"u1","email":"a@b.co"}"#).unwrap();
        assert!(u.user_metadata.full_name.is_none());
        assert_eq!(u.display_name(), "a");
    }
}
