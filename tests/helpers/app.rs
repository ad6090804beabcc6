//! In-process application for router tests

use std::time::Duration;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;
use HeartsScheduler::services::{
    CacheService, Integrations, MockMessenger, RecordingMailer, ServiceFactory, SheetsClient,
};
use HeartsScheduler::{build_router, AppState, DatabaseService, Settings};

pub const SERVICE_KEY: &str = "test-service-role-key";
pub const JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough";
pub const ADMIN_EMAIL: &str = "admin@vietnamhearts.test";
pub const VERIFY_TOKEN: &str = "hearts-verify-token";
pub const SHEETS_TOKEN: &str = "sheets-test-token";

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.server.environment = "test".to_string();
    settings.auth.supabase_service_role_key = Some(SERVICE_KEY.to_string());
    settings.auth.supabase_jwt_secret = Some(JWT_SECRET.to_string());
    settings.auth.admin_emails = vec![ADMIN_EMAIL.to_string()];
    settings.messenger.page_access_token = Some("page-access-token".to_string());
    settings.messenger.verify_token = Some(VERIFY_TOKEN.to_string());
    settings.messenger.use_mock = true;
    settings.email.send_delay_ms = 0;
    settings.features.public_rate_limit_per_minute = 100;
    settings
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or_else(|e| panic!("response is not JSON ({}): {}", e, self.body))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: RecordingMailer,
    pub messenger: MockMessenger,
}

impl TestApp {
    pub async fn new(pool: PgPool) -> Self {
        Self::build(test_settings(), pool, false).await
    }

    /// Application whose Sheets client talks to `settings.google.sheets_api_url` with a static token
    pub async fn with_sheets(settings: Settings, pool: PgPool) -> Self {
        Self::build(settings, pool, true).await
    }

    pub async fn build(settings: Settings, pool: PgPool, sheets_enabled: bool) -> Self {
        let mailer = RecordingMailer::new();
        let messenger = MockMessenger::new();
        let sheets = if sheets_enabled {
            SheetsClient::with_static_token(&settings, SHEETS_TOKEN)
        } else {
            SheetsClient::new(&settings, None)
        }
        .expect("sheets client should build");

        let integrations = Integrations {
            mail: std::sync::Arc::new(mailer.clone()),
            messenger: std::sync::Arc::new(messenger.clone()),
            sheets,
            supabase: None,
        };
        let cache = CacheService::in_memory("test:", Duration::from_secs(60));
        let services = ServiceFactory::with_integrations(settings, DatabaseService::new(pool), cache, integrations)
            .await
            .expect("services should build");

        let state = AppState::new(services);
        Self {
            router: build_router(state.clone()),
            state,
            mailer,
            messenger,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router never fails");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.request(builder.body(body).expect("request should build")).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, None, Some(body)).await
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .expect("request should build");
        self.request(request).await
    }

    /// Scheduler style call authenticated with the service role key header
    pub async fn scheduler_call(&self, method: Method, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("apikey", SERVICE_KEY)
            .body(Body::empty())
            .expect("request should build");
        self.request(request).await
    }
}

/// HS256 access token accepted by the local JWT check
pub fn user_token(email: &str) -> String {
    let claims = json!({
        "sub": format!("user-{}", email),
        "email": email,
        "aud": "authenticated",
        "exp": (Utc::now() + chrono::Duration::hours(1)).timestamp(),
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes()))
        .expect("token should encode")
}

pub fn admin_token() -> String {
    user_token(ADMIN_EMAIL)
}
