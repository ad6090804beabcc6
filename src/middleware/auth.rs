//! Authentication extractors
//!
//! Admin routes take [`AuthenticatedAdmin`]; the scheduler trigger routes
//! take [`SchedulerCaller`], which also accepts the service role key.

use std::convert::Infallible;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use tracing::{debug, warn};
use crate::services::auth::{AuthUser, Principal};
use crate::state::AppState;
use crate::utils::errors::SchedulerError;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const API_KEY_HEADER: &str = "apikey";

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn api_key(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn query_token(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|t| !t.is_empty())
}

/// Value of a cookie from the `Cookie` header
pub fn cookie_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Access token from the Authorization header, `apikey` header, `token` query or cookie
pub fn extract_token(parts: &Parts) -> Option<String> {
    bearer_token(parts)
        .or_else(|| api_key(parts))
        .or_else(|| query_token(parts))
        .or_else(|| cookie_value(parts, ACCESS_TOKEN_COOKIE))
}

/// Whatever token the request carries, validated or not
#[derive(Debug, Clone)]
pub struct RawToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for RawToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RawToken(extract_token(parts)))
    }
}

/// Signed-in user with a valid token; admin status not required
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = SchedulerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)
            .ok_or_else(|| SchedulerError::Authentication("Authentication required".to_string()))?;
        let user = state.services.auth.authenticate_token(&token).await?;
        Ok(CurrentUser(user))
    }
}

/// Signed-in admin user
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin(pub AuthUser);

impl FromRequestParts<AppState> for AuthenticatedAdmin {
    type Rejection = SchedulerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if state.services.auth.is_admin(&user).await? {
            debug!(email = %user.email, "Admin authentication successful");
            Ok(AuthenticatedAdmin(user))
        } else {
            warn!(email = %user.email, path = %parts.uri.path(), "Unauthorized admin access attempt");
            Err(SchedulerError::PermissionDenied("Admin privileges required".to_string()))
        }
    }
}

/// Either the scheduler (service role key) or an admin user
#[derive(Debug, Clone)]
pub struct SchedulerCaller(pub Principal);

impl FromRequestParts<AppState> for SchedulerCaller {
    type Rejection = SchedulerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let service_key = api_key(parts).or_else(|| bearer_token(parts));
        if let Some(key) = service_key {
            if state.services.auth.is_service_key(&key) {
                debug!(path = %parts.uri.path(), "Scheduler authenticated with service role key");
                return Ok(SchedulerCaller(Principal::Service));
            }
        }

        let AuthenticatedAdmin(user) = AuthenticatedAdmin::from_request_parts(parts, state).await?;
        Ok(SchedulerCaller(Principal::User(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_token_sources_in_order() {
        let p = parts(
            Request::builder()
                .uri("/admin?token=query-token")
                .header("authorization", "Bearer header-token")
                .header("cookie", "access_token=cookie-token"),
        );
        assert_eq!(extract_token(&p).as_deref(), Some("header-token"));

        let p = parts(Request::builder().uri("/admin?token=query-token").header("cookie", "access_token=cookie-token"));
        assert_eq!(extract_token(&p).as_deref(), Some("query-token"));

        let p = parts(Request::builder().uri("/admin").header("cookie", "theme=dark; access_token=cookie-token"));
        assert_eq!(extract_token(&p).as_deref(), Some("cookie-token"));

        let p = parts(Request::builder().uri("/admin").header("apikey", "service-key"));
        assert_eq!(extract_token(&p).as_deref(), Some("service-key"));

        assert_eq!(extract_token(&parts(Request::builder().uri("/admin"))), None);
    }

    #[test]
    fn test_malformed_authorization_is_ignored() {
        let p = parts(Request::builder().uri("/").header("authorization", "Basic abc"));
        assert_eq!(bearer_token(&p), None);
    }
}
