//! Auth callback and sign-out handlers.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Auth callback query parameters.
#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
}

/// OAuth/PKCE callback: exchange the code for a session, then send the
/// browser home. Any failure, including a missing code, lands on the auth
/// page with an error indicator.
pub async fn auth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuthCallbackQuery>,
) -> Response {
    let origin = request_origin(&headers);

    if let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) {
        match state.supabase.exchange_code(code).await {
            Ok(session) => {
                info!(user_id = %session.user.id, "Auth code exchanged");
                return redirect_found(&format!("{origin}/"));
            }
            Err(e) => {
                warn!(error = %e, "Auth code exchange failed");
            }
        }
    }

    redirect_found(&format!(
        "{origin}/auth?error={}",
        urlencoding::encode("Could not authenticate user")
    ))
}

/// Sign-out response.
#[derive(Serialize)]
pub struct SignOutResponse {
    pub success: bool,
}

/// Revoke the caller's session. Revocation failures are logged; the response
/// reports success either way since the client discards its token.
pub async fn sign_out(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<SignOutResponse>> {
    if let Err(e) = state.supabase.sign_out(&user.access_token).await {
        warn!(user_id = %user.id(), error = %e, "Session revocation failed");
    }

    Ok(Json(SignOutResponse { success: true }))
}

/// Reconstruct the externally visible origin from forwarded headers.
fn request_origin(headers: &HeaderMap) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}

fn redirect_found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
