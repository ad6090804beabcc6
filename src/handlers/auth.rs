//! Supabase (Google OAuth) sign-in routes under `/auth`

use axum::extract::{Query, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use crate::middleware::auth::ACCESS_TOKEN_COOKIE;
use crate::middleware::{CurrentUser, RawToken};
use crate::services::auth::{AuthSession, AuthUser};
use crate::state::AppState;
use crate::utils::errors::{Result, SchedulerError};

const DEFAULT_COOKIE_MAX_AGE: i64 = 3600;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/signin/google", get(signin_google))
        .route("/callback", get(callback))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/google/verify", post(verify_google))
        .route("/health", get(auth_health))
}

/// `Set-Cookie` value carrying the access token
pub fn session_cookie(token: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ACCESS_TOKEN_COOKIE, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cookie_max_age(session: &AuthSession) -> i64 {
    session
        .expires_at
        .map(|at| at - chrono::Utc::now().timestamp())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_COOKIE_MAX_AGE)
}

fn with_cookie(mut response: Response, cookie: &str) -> Result<Response> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| SchedulerError::Authentication(format!("Invalid session token: {}", e)))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(response)
}

fn session_json(session: &AuthSession, user: &AuthUser, is_admin: bool) -> Value {
    json!({
        "access_token": session.access_token,
        "refresh_token": session.refresh_token,
        "expires_at": session.expires_at,
        "user": user,
        "is_admin": is_admin,
    })
}

/// GET /auth/login
async fn login(State(state): State<AppState>) -> Result<Json<Value>> {
    let auth = &state.services.auth;
    let url = auth.supabase()?.authorize_url(&auth.callback_url());
    Ok(Json(json!({
        "auth_url": url,
        "provider": "google",
        "redirect_to": auth.callback_url(),
    })))
}

/// GET /auth/signin/google
async fn signin_google(State(state): State<AppState>) -> Result<Response> {
    let auth = &state.services.auth;
    let url = auth.supabase()?.authorize_url(&auth.callback_url());
    Ok((StatusCode::FOUND, [(LOCATION, url)]).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /auth/callback?code=
async fn callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Result<Response> {
    if let Some(error) = query.error {
        warn!(error = %error, "OAuth provider returned an error");
        return Err(SchedulerError::Authentication(
            query.error_description.unwrap_or(error),
        ));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| SchedulerError::InvalidInput("Missing authorization code".to_string()))?;

    let auth = &state.services.auth;
    let supabase = auth.supabase()?;
    let session = supabase.exchange_code(&code, query.code_verifier.as_deref()).await?;
    let user = match session.user.clone() {
        Some(user) => user,
        None => supabase.get_user(&session.access_token).await?,
    };
    let is_admin = auth.is_admin(&user).await?;
    info!(email = %user.email, is_admin, "User signed in");

    let body = json!({
        "session": session_json(&session, &user, is_admin),
        "redirect_to": auth.config().login_redirect_path,
    });
    let cookie = session_cookie(&session.access_token, cookie_max_age(&session), state.settings.is_production());
    with_cookie(Json(body).into_response(), &cookie)
}

/// GET /auth/me
async fn me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Value>> {
    let is_admin = state.services.auth.is_admin(&user).await?;
    Ok(Json(json!({ "user": user, "is_admin": is_admin })))
}

/// POST /auth/logout
async fn logout(State(state): State<AppState>, RawToken(token): RawToken) -> Result<Response> {
    if let (Some(token), Ok(supabase)) = (token.as_deref(), state.services.auth.supabase()) {
        if let Err(e) = supabase.sign_out(token).await {
            warn!(error = %e, "Supabase sign out failed");
        }
    }
    let cookie = session_cookie("", 0, state.settings.is_production());
    with_cookie(Json(json!({ "message": "Signed out successfully" })).into_response(), &cookie)
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /auth/refresh
async fn refresh(State(state): State<AppState>, Json(request): Json<RefreshRequest>) -> Result<Response> {
    if request.refresh_token.trim().is_empty() {
        return Err(SchedulerError::InvalidInput("refresh_token is required".to_string()));
    }
    let auth = &state.services.auth;
    let supabase = auth.supabase()?;
    let session = supabase.refresh_session(&request.refresh_token).await?;
    let user = match session.user.clone() {
        Some(user) => user,
        None => supabase.get_user(&session.access_token).await?,
    };
    let is_admin = auth.is_admin(&user).await?;

    let cookie = session_cookie(&session.access_token, cookie_max_age(&session), state.settings.is_production());
    with_cookie(Json(session_json(&session, &user, is_admin)).into_response(), &cookie)
}

#[derive(Debug, Deserialize)]
pub struct GoogleVerifyRequest {
    pub id_token: String,
}

/// POST /auth/google/verify
async fn verify_google(State(state): State<AppState>, Json(request): Json<GoogleVerifyRequest>) -> Result<Json<Value>> {
    let auth = &state.services.auth;
    let claims = auth.verify_google_id_token(&request.id_token).await?;
    let user = AuthUser::from(&claims);
    let is_admin = auth.is_admin(&user).await?;
    info!(email = %user.email, is_admin, "Google ID token verified");
    Ok(Json(json!({ "valid": true, "user": user, "is_admin": is_admin })))
}

/// GET /auth/health
async fn auth_health(State(state): State<AppState>) -> Json<Value> {
    let config = state.services.auth.config();
    let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    Json(json!({
        "status": if state.services.auth.is_configured() { "healthy" } else { "not_configured" },
        "supabase_configured": state.services.auth.is_configured(),
        "jwt_secret_configured": set(&config.supabase_jwt_secret),
        "service_role_key_configured": set(&config.supabase_service_role_key),
        "google_client_id_configured": set(&config.google_client_id),
        "admin_emails": config.admin_emails.len(),
        "callback_url": state.services.auth.callback_url(),
    }))
}
