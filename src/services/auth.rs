//! Authentication service implementation
//!
//! Sessions come from Supabase Auth with Google as the identity provider.
//! This service verifies access tokens (locally with the project's JWT
//! secret when configured, otherwise through the Supabase user endpoint),
//! checks Google ID tokens, and decides who counts as an admin.

use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use crate::config::settings::{AuthConfig, Settings};
use crate::database::DatabaseService;
use crate::services::redis::CacheService;
use crate::utils::errors::{Result, SchedulerError};
use crate::utils::helpers::{constant_time_eq, normalize_email};

/// Identity used for scheduler calls authenticated with the service role key
pub const SERVICE_ACCOUNT_ID: &str = "service-account-auto-scheduler";

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const GOOGLE_KEYS_TTL: Duration = Duration::from_secs(3600);

/// A signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub app_metadata: Value,
}

/// Who is making a request
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    User(AuthUser),
    /// Automated caller holding the service role key
    Service,
}

impl Principal {
    pub fn display_name(&self) -> &str {
        match self {
            Principal::User(user) => &user.email,
            Principal::Service => SERVICE_ACCOUNT_ID,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub user: Option<AuthUser>,
}

/// User object as returned by the Supabase Auth API
#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
    #[serde(default)]
    user_metadata: Value,
    #[serde(default)]
    app_metadata: Value,
}

impl From<SupabaseUser> for AuthUser {
    fn from(user: SupabaseUser) -> Self {
        let meta_str = |key: &str| user.user_metadata.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            name: meta_str("full_name").or_else(|| meta_str("name")),
            avatar_url: meta_str("avatar_url"),
            email: user.email.as_deref().map(normalize_email).unwrap_or_default(),
            email_verified: user.email_confirmed_at.is_some(),
            id: user.id,
            user_metadata: user.user_metadata,
            app_metadata: user.app_metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<SupabaseUser>,
}

impl From<SupabaseSession> for AuthSession {
    fn from(session: SupabaseSession) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
            user: session.user.map(AuthUser::from),
        }
    }
}

/// Claims of a Supabase access token
#[derive(Debug, Deserialize)]
struct SupabaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
    #[serde(default)]
    app_metadata: Value,
}

fn bool_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => Ok(s.eq_ignore_ascii_case("true")),
        _ => Ok(false),
    }
}

/// Claims of a Google ID token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleIdClaims {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    /// Hosted domain of a Workspace account
    #[serde(default)]
    pub hd: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl From<&GoogleIdClaims> for AuthUser {
    fn from(claims: &GoogleIdClaims) -> Self {
        Self {
            id: claims.sub.clone(),
            email: normalize_email(&claims.email),
            name: claims.name.clone(),
            avatar_url: claims.picture.clone(),
            email_verified: claims.email_verified,
            user_metadata: Value::Null,
            app_metadata: Value::Null,
        }
    }
}

/// Apply `ALLOWED_EMAIL_DOMAINS` and `ALLOWED_EMAILS`; empty lists allow everyone
pub fn check_email_allowed(email: &str, allowed_domains: &[String], allowed_emails: &[String]) -> Result<()> {
    let email = normalize_email(email);

    if !allowed_domains.is_empty() {
        let domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or("");
        if !allowed_domains.iter().any(|d| d.trim().eq_ignore_ascii_case(domain)) {
            warn!(domain = domain, "Access denied for email domain");
            return Err(SchedulerError::PermissionDenied(format!(
                "Access denied. Only users from {} are allowed.",
                allowed_domains.join(", ")
            )));
        }
    }

    if !allowed_emails.is_empty() && !allowed_emails.iter().any(|e| normalize_email(e) == email) {
        warn!(email = %email, "Access denied for email");
        return Err(SchedulerError::PermissionDenied(
            "Access denied. Your email is not authorized.".to_string(),
        ));
    }

    Ok(())
}

/// Time and verification checks on already signature-checked Google claims
pub fn validate_google_claims(claims: &GoogleIdClaims, now: i64, config: &AuthConfig) -> Result<()> {
    if claims.exp < now - config.token_skew_seconds {
        return Err(SchedulerError::Authentication("Token has expired".to_string()));
    }
    if claims.iat > now + config.token_skew_seconds {
        return Err(SchedulerError::Authentication("Token issued in the future".to_string()));
    }
    if !claims.email_verified {
        return Err(SchedulerError::Authentication("Email address is not verified".to_string()));
    }
    check_email_allowed(&claims.email, &config.allowed_email_domains, &config.allowed_emails)
}

/// Admin by metadata flag, metadata role or the configured admin email list
pub fn is_static_admin(user: &AuthUser, admin_emails: &[String]) -> bool {
    if user.user_metadata.get("is_admin").and_then(Value::as_bool).unwrap_or(false) {
        return true;
    }
    if user.app_metadata.get("role").and_then(Value::as_str) == Some("admin") {
        return true;
    }
    let email = normalize_email(&user.email);
    admin_emails.iter().any(|e| normalize_email(e) == email)
}

/// Thin client for the Supabase Auth REST API
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    /// `None` when Supabase is not configured
    pub fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        match (&settings.auth.supabase_url, &settings.auth.supabase_anon_key) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Self::new(url, key).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Google sign-in URL that returns to `redirect_to`
    pub fn authorize_url(&self, redirect_to: &str) -> String {
        format!(
            "{}/auth/v1/authorize?provider=google&redirect_to={}",
            self.base_url,
            urlencoding::encode(redirect_to)
        )
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    ["error_description", "msg", "message", "error"]
                        .iter()
                        .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
                })
                .unwrap_or(body);
            return Err(SchedulerError::Authentication(format!("Supabase returned {}: {}", status.as_u16(), message)));
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn exchange_code(&self, code: &str, code_verifier: Option<&str>) -> Result<AuthSession> {
        let response = self
            .http
            .post(format!("{}/auth/v1/token?grant_type=pkce", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&json!({ "auth_code": code, "code_verifier": code_verifier.unwrap_or_default() }))
            .send()
            .await?;
        let session: SupabaseSession = Self::parse(response).await?;
        Ok(session.into())
    }

    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let user: SupabaseUser = Self::parse(response).await?;
        Ok(user.into())
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let response = self
            .http
            .post(format!("{}/auth/v1/token?grant_type=refresh_token", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let session: SupabaseSession = Self::parse(response).await?;
        Ok(session.into())
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SchedulerError::Authentication(format!(
                "Sign out failed with status {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AuthService {
    supabase: Option<SupabaseClient>,
    db: DatabaseService,
    cache: CacheService,
    config: AuthConfig,
    public_url: String,
    http: reqwest::Client,
    google_keys: Arc<RwLock<Option<(Instant, JwkSet)>>>,
}

impl AuthService {
    pub fn new(settings: &Settings, supabase: Option<SupabaseClient>, db: DatabaseService, cache: CacheService) -> Self {
        Self {
            supabase,
            db,
            cache,
            config: settings.auth.clone(),
            public_url: settings.server.public_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            google_keys: Arc::new(RwLock::new(None)),
        }
    }

    pub fn supabase(&self) -> Result<&SupabaseClient> {
        self.supabase
            .as_ref()
            .ok_or_else(|| SchedulerError::ServiceUnavailable("Supabase authentication is not configured".to_string()))
    }

    pub fn is_configured(&self) -> bool {
        self.supabase.is_some()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.public_url)
    }

    /// Whether `key` is the configured service role key
    pub fn is_service_key(&self, key: &str) -> bool {
        match self.config.supabase_service_role_key.as_deref() {
            Some(expected) if !expected.is_empty() => constant_time_eq(expected.as_bytes(), key.as_bytes()),
            _ => false,
        }
    }

    /// Resolve the user behind a Supabase access token
    pub async fn authenticate_token(&self, token: &str) -> Result<AuthUser> {
        if let Some(secret) = self.config.supabase_jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.validate_aud = false;
            validation.leeway = self.config.token_skew_seconds.max(0) as u64;

            let data = decode::<SupabaseClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
                .map_err(|e| SchedulerError::Authentication(format!("Invalid authentication token: {}", e)))?;
            let claims = data.claims;
            return Ok(AuthUser::from(SupabaseUser {
                id: claims.sub,
                email: claims.email,
                email_confirmed_at: Some(String::new()),
                user_metadata: claims.user_metadata,
                app_metadata: claims.app_metadata,
            }));
        }

        self.supabase()?
            .get_user(token)
            .await
            .map_err(|e| match e {
                SchedulerError::Http(_) => e,
                _ => SchedulerError::Authentication("Invalid authentication token".to_string()),
            })
    }

    fn admin_cache_key(email: &str) -> String {
        format!("admin:{}", normalize_email(email))
    }

    /// Admin by metadata, configured list or an active `admin_users` row; cached
    pub async fn is_admin(&self, user: &AuthUser) -> Result<bool> {
        if is_static_admin(user, &self.config.admin_emails) {
            return Ok(true);
        }
        if user.email.is_empty() {
            return Ok(false);
        }

        let key = Self::admin_cache_key(&user.email);
        match self.cache.get::<bool>(&key).await {
            Ok(Some(cached)) => {
                debug!(email = %user.email, is_admin = cached, "Admin status from cache");
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Admin cache read failed"),
        }

        let is_admin = match self.db.admins.find_by_email(&user.email).await? {
            Some(admin) if admin.is_active => {
                self.db.admins.touch_last_login(&admin.email).await?;
                true
            }
            _ => false,
        };

        let ttl = Duration::from_secs(self.config.admin_cache_ttl_seconds);
        if let Err(e) = self.cache.set(&key, &is_admin, Some(ttl)).await {
            warn!(error = %e, "Admin cache write failed");
        }

        if is_admin {
            info!(email = %user.email, "Admin access granted");
        } else {
            warn!(email = %user.email, "User is not an admin");
        }
        Ok(is_admin)
    }

    pub async fn invalidate_admin(&self, email: &str) {
        if let Err(e) = self.cache.delete(&Self::admin_cache_key(email)).await {
            warn!(error = %e, "Admin cache invalidation failed");
        }
    }

    async fn google_keys(&self, force_refresh: bool) -> Result<JwkSet> {
        if !force_refresh {
            let cached = self.google_keys.read().await;
            if let Some((fetched, keys)) = cached.as_ref() {
                if fetched.elapsed() < GOOGLE_KEYS_TTL {
                    return Ok(keys.clone());
                }
            }
        }

        let keys: JwkSet = self
            .http
            .get(&self.config.google_certs_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        *self.google_keys.write().await = Some((Instant::now(), keys.clone()));
        Ok(keys)
    }

    /// Verify a Google ID token: signature, issuer, audience, times and email filters
    pub async fn verify_google_id_token(&self, token: &str) -> Result<GoogleIdClaims> {
        let header = decode_header(token)
            .map_err(|e| SchedulerError::Authentication(format!("Invalid authentication token: {}", e)))?;
        let kid = header
            .kid
            .ok_or_else(|| SchedulerError::Authentication("Token has no key id".to_string()))?;

        let mut keys = self.google_keys(false).await?;
        if keys.find(&kid).is_none() {
            keys = self.google_keys(true).await?;
        }
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| SchedulerError::Authentication("Unknown token signing key".to_string()))?;
        let key = DecodingKey::from_jwk(jwk)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.leeway = self.config.token_skew_seconds.max(0) as u64;
        match self.config.google_client_id.as_deref().filter(|id| !id.is_empty()) {
            Some(client_id) => validation.set_audience(&[client_id]),
            None => validation.validate_aud = false,
        }

        let claims = decode::<GoogleIdClaims>(token, &key, &validation)
            .map_err(|e| SchedulerError::Authentication(format!("Invalid authentication token: {}", e)))?
            .claims;
        validate_google_claims(&claims, Utc::now().timestamp(), &self.config)?;

        info!(email = %claims.email, "Google ID token verified");
        Ok(claims)
    }
}
