//! End-to-end router tests with mocked Supabase, Stripe, and Replicate.
//!
//! Every test builds the real router over `AppState` pointed at a wiremock
//! server. Tests are serialized because upstream configuration comes from
//! environment variables.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use serial_test::serial;
use sha2::Sha256;
use tower::ServiceExt;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vidgen_api::{create_router, ApiConfig, AppState};

const WEBHOOK_SECRET: &str = "whsec_test_secret";
const SESSION_HEADER: &str = "Bearer sess_token";

/// Point every upstream at the mock server.
fn set_test_env(server: &MockServer) {
    std::env::set_var("SUPABASE_URL", server.uri());
    std::env::set_var("SUPABASE_ANON_KEY", "anon_test_key");
    std::env::set_var("STRIPE_SECRET_KEY", "sk_test_123");
    std::env::set_var("STRIPE_API_BASE", server.uri());
    std::env::set_var("STRIPE_WEBHOOK_SECRET", WEBHOOK_SECRET);
    std::env::set_var("REPLICATE_API_TOKEN", "r8_test_token");
    std::env::set_var("REPLICATE_API_BASE", server.uri());
    std::env::set_var("REPLICATE_POLL_INTERVAL_MS", "10");
    std::env::remove_var("ENVIRONMENT");
}

fn build_app() -> axum::Router {
    let config = ApiConfig {
        rate_limit_rps: 1000,
        rate_limit_burst: 1000,
        site_url: Some("https://app.example.com".to_string()),
        stripe_pro_price_id: Some("price_pro_test".to_string()),
        ..ApiConfig::default()
    };
    let state = AppState::new(config).expect("test state");
    create_router(state, None)
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn profile_json(status: &str, videos_generated: u32, customer: Option<&str>) -> Value {
    json!({
        "id": "user-1",
        "email": "ada@example.com",
        "full_name": "Ada Lovelace",
        "avatar_url": null,
        "subscription_status": status,
        "stripe_customer_id": customer,
        "stripe_subscription_id": null,
        "videos_generated": videos_generated,
        "created_at": "2024-06-01T12:00:00+00:00",
        "updated_at": "2024-06-01T12:00:00+00:00"
    })
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("Authorization", SESSION_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-1",
            "email": "ada@example.com",
            "user_metadata": { "full_name": "Ada Lovelace" }
        })))
        .mount(server)
        .await;
}

async fn mount_profile(server: &MockServer, profile: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile))
        .mount(server)
        .await;
}

/// PostgREST object requests answer 406 PGRST116 when no row matches.
async fn mount_profile_missing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.user-1"))
        .respond_with(ResponseTemplate::new(406).set_body_json(json!({
            "code": "PGRST116",
            "message": "JSON object requested, multiple (or no) rows returned"
        })))
        .mount(server)
        .await;
}

fn sign_webhook(payload: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let signed_payload = format!("{timestamp}.{payload}");
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(signed_payload.as_bytes());
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

// =============================================================================
// Health and middleware
// =============================================================================

#[tokio::test]
#[serial]
async fn test_health_endpoint() {
    let server = MockServer::start().await;
    set_test_env(&server);
    let app = build_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-Content-Type-Options"));
    assert!(response.headers().contains_key("X-Request-ID"));

    let body = response_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[serial]
async fn test_ready_reports_degraded_supabase() {
    let server = MockServer::start().await;
    set_test_env(&server);

    Mock::given(method("GET"))
        .and(path("/auth/v1/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response_json(response).await;
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
#[serial]
async fn test_rate_limit_returns_429() {
    let server = MockServer::start().await;
    set_test_env(&server);

    let config = ApiConfig {
        rate_limit_rps: 1,
        rate_limit_burst: 1,
        ..ApiConfig::default()
    };
    let state = AppState::new(config).expect("test state");
    let app = create_router(state, None);

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate-video")
                .header("X-Forwarded-For", "203.0.113.9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // Passes the limiter, then fails auth
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

    let second = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate-video")
                .header("X-Forwarded-For", "203.0.113.9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        second.headers().get("Retry-After").unwrap().to_str().unwrap(),
        "1"
    );
}

#[tokio::test]
#[serial]
async fn test_webhook_body_over_limit_is_413() {
    let server = MockServer::start().await;
    set_test_env(&server);
    let app = build_app();

    let oversized = "x".repeat(2 * 1024 * 1024);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/webhook")
                .body(Body::from(oversized))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// =============================================================================
// Video generation
// =============================================================================

#[tokio::test]
#[serial]
async fn test_generate_video_requires_auth() {
    let server = MockServer::start().await;
    set_test_env(&server);
    let app = build_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate-video")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"a cat surfing"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
#[serial]
async fn test_generate_video_without_replicate_token_is_config_error() {
    let server = MockServer::start().await;
    set_test_env(&server);
    std::env::remove_var("REPLICATE_API_TOKEN");
    let app = build_app();

    // The configuration gate runs before authentication
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate-video")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(
        body["error"],
        "Server mis-configuration: REPLICATE_API_TOKEN not set."
    );
}

#[tokio::test]
#[serial]
async fn test_generate_video_enforces_free_quota() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile(&server, profile_json("free", 3, None)).await;
    let app = build_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate-video")
                .header("Authorization", SESSION_HEADER)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"a cat surfing"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response).await;
    assert_eq!(
        body["error"],
        "Monthly video limit reached. Upgrade to Pro for more videos."
    );
}

#[tokio::test]
#[serial]
async fn test_generate_video_quota_error_beats_missing_prompt() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile(&server, profile_json("free", 3, None)).await;
    let app = build_app();

    // Over-limit caller with an empty body still sees the quota error
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate-video")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn test_generate_video_rejects_blank_prompt() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile(&server, profile_json("free", 0, None)).await;
    let app = build_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate-video")
                .header("Authorization", SESSION_HEADER)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Prompt is required");
}

#[tokio::test]
#[serial]
async fn test_generate_video_happy_path_increments_counter() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile(&server, profile_json("active", 10, Some("cus_1"))).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/videos"))
        .and(body_json(json!({
            "user_id": "user-1",
            "prompt": "a cat surfing",
            "status": "generating"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "vid-1",
            "user_id": "user-1",
            "prompt": "a cat surfing",
            "video_url": null,
            "status": "generating",
            "created_at": "2024-06-01T12:00:00+00:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/google/veo-3/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "pred-1",
            "status": "succeeded",
            "output": ["https://replicate.delivery/out.mp4"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/videos"))
        .and(query_param("id", "eq.vid-1"))
        .and(body_json(json!({
            "video_url": "https://replicate.delivery/out.mp4",
            "status": "completed"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .expect(1)
        .mount(&server)
        .await;

    // The counter write is absolute: the value read at request start plus one
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.user-1"))
        .and(body_json(json!({ "videos_generated": 11 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate-video")
                .header("Authorization", SESSION_HEADER)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"a cat surfing"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["videoUrl"], "https://replicate.delivery/out.mp4");
}

#[tokio::test]
#[serial]
async fn test_generate_video_no_output_is_bad_gateway() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile(&server, profile_json("free", 0, None)).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/videos"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "vid-2",
            "user_id": "user-1",
            "prompt": "a dog skiing",
            "status": "generating"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/google/veo-3/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "pred-2",
            "status": "succeeded",
            "output": []
        })))
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate-video")
                .header("Authorization", SESSION_HEADER)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"a dog skiing"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Replicate did not return a video URL.");
}

// =============================================================================
// Session bootstrap and listings
// =============================================================================

#[tokio::test]
#[serial]
async fn test_me_bootstraps_missing_profile() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile_missing(&server).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(body_json(json!({
            "id": "user-1",
            "email": "ada@example.com",
            "full_name": "Ada Lovelace",
            "subscription_status": "free",
            "videos_generated": 0
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(profile_json("free", 0, None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/videos"))
        .and(query_param("user_id", "eq.user-1"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/me")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["user"]["id"], "user-1");
    assert_eq!(body["profile"]["subscription_status"], "free");
    assert_eq!(body["profile"]["videos_generated"], 0);
    assert_eq!(body["limits"]["plan_id"], "free");
    assert_eq!(body["limits"]["videos_per_month"], 3);
    assert_eq!(body["videos"], json!([]));
}

#[tokio::test]
#[serial]
async fn test_me_survives_profile_store_outage() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/videos"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/me")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Bootstrap degrades to an unpersisted free profile and an empty gallery
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["profile"]["subscription_status"], "free");
    assert_eq!(body["limits"]["videos_per_month"], 3);
    assert_eq!(body["videos"], json!([]));
}

#[tokio::test]
#[serial]
async fn test_list_videos_returns_rows() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/videos"))
        .and(query_param("user_id", "eq.user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "vid-1",
            "user_id": "user-1",
            "prompt": "a cat surfing",
            "video_url": "https://replicate.delivery/out.mp4",
            "status": "completed",
            "created_at": "2024-06-01T12:00:00+00:00"
        }])))
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/videos")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["videos"][0]["id"], "vid-1");
    assert_eq!(body["videos"][0]["status"], "completed");
}

#[tokio::test]
#[serial]
async fn test_subscription_status_reports_profile() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile(&server, profile_json("active", 12, Some("cus_9"))).await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/subscription/status")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["subscription_status"], "active");
    assert_eq!(body["videos_generated"], 12);
    assert_eq!(body["stripe_customer_id"], "cus_9");
}

#[tokio::test]
#[serial]
async fn test_subscription_status_missing_profile_is_404() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile_missing(&server).await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/subscription/status")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Profile not found");
}

// =============================================================================
// Billing
// =============================================================================

#[tokio::test]
#[serial]
async fn test_checkout_requires_login_message() {
    let server = MockServer::start().await;
    set_test_env(&server);
    let app = build_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/create-checkout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "You must be logged in to upgrade");
}

#[tokio::test]
#[serial]
async fn test_checkout_without_stripe_key_is_config_error() {
    let server = MockServer::start().await;
    set_test_env(&server);
    std::env::remove_var("STRIPE_SECRET_KEY");
    let app = build_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/create-checkout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(
        body["error"],
        "Stripe is not configured. Please contact support."
    );
}

#[tokio::test]
#[serial]
async fn test_checkout_rejects_non_recurring_price() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/prices/price_pro_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "price_pro_test",
            "type": "one_time"
        })))
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/create-checkout")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(
        body["error"],
        "Invalid price configuration - must be recurring for subscriptions."
    );
}

#[tokio::test]
#[serial]
async fn test_checkout_rejects_active_subscription() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile(&server, profile_json("active", 5, Some("cus_1"))).await;

    Mock::given(method("GET"))
        .and(path("/prices/price_pro_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "price_pro_test",
            "type": "recurring"
        })))
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/create-checkout")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "You already have an active subscription");
}

#[tokio::test]
#[serial]
async fn test_checkout_creates_customer_and_session() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile(&server, profile_json("free", 0, None)).await;

    Mock::given(method("GET"))
        .and(path("/prices/price_pro_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "price_pro_test",
            "type": "recurring"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/customers"))
        .and(body_string_contains("email=ada%40example.com"))
        .and(body_string_contains("metadata%5Bsupabase_user_id%5D=user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cus_new",
            "email": "ada@example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(body_json(json!({ "stripe_customer_id": "cus_new" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(body_string_contains("customer=cus_new"))
        .and(body_string_contains("mode=subscription"))
        .and(body_string_contains(
            "success_url=https%3A%2F%2Fapp.example.com%2Fsubscription%3Fsuccess%3Dtrue",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_1",
            "url": "https://checkout.stripe.com/c/pay/cs_1",
            "customer": "cus_new",
            "subscription": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/create-checkout")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["url"], "https://checkout.stripe.com/c/pay/cs_1");
}

#[tokio::test]
#[serial]
async fn test_portal_without_customer_is_404() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile(&server, profile_json("free", 0, None)).await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/create-portal")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"], "No subscription found to manage");
}

#[tokio::test]
#[serial]
async fn test_portal_creates_session() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;
    mount_profile(&server, profile_json("active", 5, Some("cus_1"))).await;

    Mock::given(method("POST"))
        .and(path("/billing_portal/sessions"))
        .and(body_string_contains("customer=cus_1"))
        .and(body_string_contains(
            "return_url=https%3A%2F%2Fapp.example.com%2Fsubscription",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "bps_1",
            "url": "https://billing.stripe.com/p/session/bps_1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/create-portal")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["url"], "https://billing.stripe.com/p/session/bps_1");
}

// =============================================================================
// Webhooks
// =============================================================================

fn subscription_event(event_type: &str, status: &str) -> String {
    json!({
        "id": "evt_1",
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "sub_1",
                "customer": "cus_1",
                "status": status
            }
        }
    })
    .to_string()
}

#[tokio::test]
#[serial]
async fn test_webhook_rejects_bad_signature() {
    let server = MockServer::start().await;
    set_test_env(&server);
    let app = build_app();

    // A rejected delivery must never reach the profile store
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let payload = subscription_event("customer.subscription.updated", "active");

    // Forged signature
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/webhook")
                .header("stripe-signature", "t=123,v1=deadbeef")
                .body(Body::from(payload.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Invalid signature");

    // Missing header entirely
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/webhook")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_webhook_subscription_updated_persists_status() {
    let server = MockServer::start().await;
    set_test_env(&server);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("stripe_customer_id", "eq.cus_1"))
        .and(body_json(json!({
            "subscription_status": "active",
            "stripe_subscription_id": "sub_1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app();
    let payload = subscription_event("customer.subscription.updated", "active");
    let signature = sign_webhook(&payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/webhook")
                .header("stripe-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["received"], true);
}

#[tokio::test]
#[serial]
async fn test_webhook_subscription_deleted_clears_subscription() {
    let server = MockServer::start().await;
    set_test_env(&server);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("stripe_customer_id", "eq.cus_1"))
        .and(body_json(json!({
            "subscription_status": "canceled",
            "stripe_subscription_id": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app();
    let payload = subscription_event("customer.subscription.deleted", "canceled");
    let signature = sign_webhook(&payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/webhook")
                .header("stripe-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_webhook_invoice_paid_resets_usage() {
    let server = MockServer::start().await;
    set_test_env(&server);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("stripe_customer_id", "eq.cus_1"))
        .and(body_json(json!({ "videos_generated": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app();
    let payload = json!({
        "id": "evt_2",
        "type": "invoice.payment_succeeded",
        "created": Utc::now().timestamp(),
        "data": { "object": { "id": "in_1", "customer": "cus_1" } }
    })
    .to_string();
    let signature = sign_webhook(&payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/webhook")
                .header("stripe-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_webhook_persistence_failure_still_acknowledged() {
    let server = MockServer::start().await;
    set_test_env(&server);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = build_app();
    let payload = subscription_event("customer.subscription.updated", "past_due");
    let signature = sign_webhook(&payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/webhook")
                .header("stripe-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    // The row update failure is logged, not redelivered
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["received"], true);
}

fn checkout_completed_event() -> String {
    json!({
        "id": "evt_3",
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "cs_1",
                "mode": "subscription",
                "customer": "cus_1",
                "subscription": "sub_1"
            }
        }
    })
    .to_string()
}

#[tokio::test]
#[serial]
async fn test_webhook_checkout_completed_refetches_subscription() {
    let server = MockServer::start().await;
    set_test_env(&server);

    Mock::given(method("GET"))
        .and(path("/subscriptions/sub_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("stripe_customer_id", "eq.cus_1"))
        .and(body_json(json!({
            "subscription_status": "active",
            "stripe_subscription_id": "sub_1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app();
    let payload = checkout_completed_event();
    let signature = sign_webhook(&payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/webhook")
                .header("stripe-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_webhook_checkout_refetch_failure_fails_delivery() {
    let server = MockServer::start().await;
    set_test_env(&server);

    Mock::given(method("GET"))
        .and(path("/subscriptions/sub_1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = build_app();
    let payload = checkout_completed_event();
    let signature = sign_webhook(&payload);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/webhook")
                .header("stripe-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    // Stripe retries non-2xx deliveries
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Webhook handler failed");
}

// =============================================================================
// Auth callback and sign-out
// =============================================================================

#[tokio::test]
#[serial]
async fn test_auth_callback_redirects_home_on_success() {
    let server = MockServer::start().await;
    set_test_env(&server);

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "pkce"))
        .and(body_json(json!({ "auth_code": "code-abc" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "refresh_token": "ref",
            "expires_in": 3600,
            "user": { "id": "user-1", "email": "ada@example.com" }
        })))
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/callback?code=code-abc")
                .header("x-forwarded-proto", "https")
                .header("x-forwarded-host", "app.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get("location").unwrap().to_str().unwrap(),
        "https://app.example.com/"
    );
}

#[tokio::test]
#[serial]
async fn test_auth_callback_missing_code_redirects_to_error() {
    let server = MockServer::start().await;
    set_test_env(&server);
    let app = build_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/callback")
                .header("host", "localhost:8000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get("location").unwrap().to_str().unwrap(),
        "http://localhost:8000/auth?error=Could%20not%20authenticate%20user"
    );
}

#[tokio::test]
#[serial]
async fn test_sign_out_revokes_session() {
    let server = MockServer::start().await;
    set_test_env(&server);
    mount_auth(&server).await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("Authorization", SESSION_HEADER))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/signout")
                .header("Authorization", SESSION_HEADER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
}
