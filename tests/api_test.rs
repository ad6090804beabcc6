//! Router tests that never reach the database: routing, authentication,
//! webhook verification, feature flags and rate limiting.

mod helpers;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use helpers::*;

async fn app() -> TestApp {
    TestApp::new(unreachable_pool()).await
}

#[tokio::test]
async fn test_service_info() {
    let app = app().await;
    let response = app.get("/").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["name"], "Vietnam Hearts Scheduler");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["endpoints"]["webhook"], "/webhook/messenger");
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let app = app().await;
    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["services"]["database"]["status"], "unhealthy");
    assert_eq!(body["services"]["google_sheets"]["status"], "not_configured");
    assert_eq!(body["services"]["facebook_messenger"]["status"], "healthy");
    assert_eq!(body["services"]["facebook_messenger"]["sender"], "mock");
    assert_eq!(body["services"]["cache"]["backend"], "memory");
}

#[tokio::test]
async fn test_webhook_verification() {
    let app = app().await;

    let ok = app
        .get(&format!(
            "/webhook/messenger?hub.mode=subscribe&hub.verify_token={}&hub.challenge=challenge-123",
            VERIFY_TOKEN
        ))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body, "challenge-123");

    let wrong_token = app
        .get("/webhook/messenger?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=challenge-123")
        .await;
    assert_eq!(wrong_token.status, StatusCode::FORBIDDEN);

    let wrong_mode = app
        .get(&format!(
            "/webhook/messenger?hub.mode=unsubscribe&hub.verify_token={}&hub.challenge=x",
            VERIFY_TOKEN
        ))
        .await;
    assert_eq!(wrong_mode.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_rejects_unsupported_payloads() {
    let app = app().await;

    let response = app.post_json("/webhook/messenger", json!({ "object": "user", "entry": [] })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["code"], "BAD_REQUEST");

    let response = app.post_json("/webhook/messenger", json!({ "entry": [] })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app.post_json("/webhook/messenger", json!({ "object": "page", "entry": [] })).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "ok");
    assert!(app.messenger.sent().is_empty());
}

#[tokio::test]
async fn test_chatbot_disabled() {
    let mut settings = test_settings();
    settings.features.chatbot = false;
    let app = TestApp::build(settings, unreachable_pool(), false).await;

    let webhook = json!({
        "object": "page",
        "entry": [{ "messaging": [{ "sender": { "id": "psid-1" }, "message": { "mid": "m1", "text": "hello" } }] }],
    });
    let response = app.post_json("/webhook/messenger", webhook).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(app.messenger.sent().is_empty());

    let response = app
        .post_json("/agent/message", json!({ "user_id": "u1", "message_text": "hello" }))
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_agent_message_validation() {
    let app = app().await;

    let response = app
        .post_json("/agent/message", json!({ "user_id": " ", "message_text": "hello" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post_json("/agent/quick-reply", json!({ "user_id": "u1", "payload": "" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_require_authentication() {
    let app = app().await;

    let response = app.get("/admin/volunteers").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["code"], "UNAUTHORIZED");

    let response = app.send(Method::GET, "/admin/volunteers", Some("not-a-jwt"), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.send(Method::GET, "/settings", Some("not-a-jwt"), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_for_static_admin() {
    let app = app().await;
    let response = app.send(Method::GET, "/auth/me", Some(&admin_token()), None).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);
    assert_eq!(body["is_admin"], true);
}

#[tokio::test]
async fn test_token_from_cookie() {
    let app = app().await;
    let request = Request::builder()
        .uri("/auth/me")
        .header(header::COOKIE, format!("access_token={}", admin_token()))
        .body(Body::empty())
        .unwrap();
    let response = app.request(request).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = app().await;
    let response = app.send(Method::POST, "/auth/logout", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    let cookie = response
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("access_token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_scheduler_routes() {
    let app = app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/admin/send-confirmation-emails")
        .header("apikey", "wrong-key")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.request(request).await.status, StatusCode::UNAUTHORIZED);

    let response = app.scheduler_call(Method::POST, "/admin/rotate-schedule?display_weeks=0").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rotate_schedule_rejects_oversized_window() {
    let app = app().await;

    let response = app.scheduler_call(Method::POST, "/admin/rotate-schedule?display_weeks=53").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["code"], "BAD_REQUEST");

    let response = app.scheduler_call(Method::POST, "/admin/rotate-schedule?display_weeks=20000000").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_scheduler_api_disabled() {
    let mut settings = test_settings();
    settings.features.scheduler_api = false;
    let app = TestApp::build(settings, unreachable_pool(), false).await;

    let response = app.scheduler_call(Method::POST, "/admin/send-weekly-reminders").await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_preferences_page_requires_token() {
    let app = app().await;

    let response = app.get("/unsubscribe").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.contains("<html"));

    let response = app.post_form("/unsubscribe", "unsubscribe_type=all_emails").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_public_rate_limit() {
    let mut settings = test_settings();
    settings.features.public_rate_limit_per_minute = 2;
    settings.server.trust_proxy_headers = true;
    let app = TestApp::build(settings, unreachable_pool(), false).await;

    let from = |ip: &str| {
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(app.request(from("203.0.113.7")).await.status, StatusCode::OK);
    assert_eq!(app.request(from("203.0.113.7")).await.status, StatusCode::OK);
    let limited = app.request(from("203.0.113.7")).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.json()["code"], "RATE_LIMITED");

    // other clients keep their own budget
    assert_eq!(app.request(from("198.51.100.1")).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_public_rate_limit_ignores_spoofed_forwarding() {
    let mut settings = test_settings();
    settings.features.public_rate_limit_per_minute = 2;
    let app = TestApp::build(settings, unreachable_pool(), false).await;

    let from = |ip: &str| {
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    // rotating the header does not buy a fresh budget
    assert_eq!(app.request(from("203.0.113.7")).await.status, StatusCode::OK);
    assert_eq!(app.request(from("203.0.113.8")).await.status, StatusCode::OK);
    assert_eq!(app.request(from("203.0.113.9")).await.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_cleanup_task() {
    let mut settings = test_settings();
    settings.features.public_rate_limit_per_minute = 1;
    let app = TestApp::build(settings, unreachable_pool(), false).await;

    assert_eq!(app.get("/").await.status, StatusCode::OK);
    let cleanup = app.state.spawn_rate_limit_cleanup(std::time::Duration::from_millis(10));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!cleanup.is_finished());
    cleanup.abort();

    // recent keys survive pruning
    app.state.prune_rate_limits();
    assert_eq!(app.get("/").await.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = app().await;
    assert_eq!(app.get("/does-not-exist").await.status, StatusCode::NOT_FOUND);
}
