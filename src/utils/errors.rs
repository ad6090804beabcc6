//! Error handling for the volunteer scheduler
//!
//! This module defines the main error types used throughout the application
//! and maps them onto HTTP responses for the axum handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Main error type for the scheduler application
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Google Sheets error: {0}")]
    Google(#[from] GoogleError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("Messenger API error: {0}")]
    Messenger(String),

    #[error("Gemini API error: {0}")]
    Gemini(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Volunteer not found: {volunteer_id}")]
    VolunteerNotFound { volunteer_id: i64 },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Google Sheets API specific errors
#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("Google Sheets API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Google Sheets integration is not configured")]
    NotConfigured,

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Invalid sheet data: {0}")]
    InvalidData(String),
}

/// SMTP delivery errors
#[derive(Error, Debug)]
pub enum EmailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),

    #[error("Email template error: {0}")]
    Template(String),
}

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Result type alias for Google Sheets operations
pub type GoogleResult<T> = std::result::Result<T, GoogleError>;

impl SchedulerError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            SchedulerError::Database(_) => false,
            SchedulerError::Migration(_) => false,
            SchedulerError::Google(_) => true,
            SchedulerError::Email(_) => true,
            SchedulerError::Messenger(_) => true,
            SchedulerError::Gemini(_) => true,
            SchedulerError::Config(_) => false,
            SchedulerError::PermissionDenied(_) => false,
            SchedulerError::VolunteerNotFound { .. } => false,
            SchedulerError::NotFound(_) => false,
            SchedulerError::Conflict(_) => false,
            SchedulerError::Redis(_) => true,
            SchedulerError::Http(_) => true,
            SchedulerError::Serialization(_) => false,
            SchedulerError::Io(_) => true,
            SchedulerError::UrlParse(_) => false,
            SchedulerError::Jwt(_) => false,
            SchedulerError::Authentication(_) => false,
            SchedulerError::RateLimitExceeded => true,
            SchedulerError::InvalidInput(_) => false,
            SchedulerError::ServiceUnavailable(_) => true,
        }
    }

    /// Whether retrying the same call may succeed (network hiccups, 5xx, 429)
    pub fn is_transient(&self) -> bool {
        match self {
            SchedulerError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().map_or(false, |s| s.is_server_error() || s.as_u16() == 429)
            }
            SchedulerError::Google(GoogleError::Api { status, .. }) => {
                *status >= 500 || *status == 429
            }
            SchedulerError::Io(_) => true,
            SchedulerError::ServiceUnavailable(_) => true,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SchedulerError::Database(_) => ErrorSeverity::Critical,
            SchedulerError::Migration(_) => ErrorSeverity::Critical,
            SchedulerError::Config(_) => ErrorSeverity::Critical,
            SchedulerError::PermissionDenied(_) => ErrorSeverity::Warning,
            SchedulerError::Authentication(_) => ErrorSeverity::Warning,
            SchedulerError::RateLimitExceeded => ErrorSeverity::Warning,
            SchedulerError::InvalidInput(_) => ErrorSeverity::Info,
            SchedulerError::NotFound(_) => ErrorSeverity::Info,
            SchedulerError::VolunteerNotFound { .. } => ErrorSeverity::Info,
            SchedulerError::Conflict(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// HTTP status and machine-readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            SchedulerError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            SchedulerError::Authentication(_) | SchedulerError::Jwt(_) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            SchedulerError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            SchedulerError::NotFound(_) | SchedulerError::VolunteerNotFound { .. } => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            SchedulerError::Database(sqlx::Error::RowNotFound) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            SchedulerError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            SchedulerError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED")
            }
            SchedulerError::ServiceUnavailable(_)
            | SchedulerError::Google(GoogleError::NotConfigured) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, severity = %self.severity(), "Request failed");
            "An internal error occurred".to_string()
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            SchedulerError::NotFound("Setting".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            SchedulerError::Conflict("exists".into()).status_and_code().0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            SchedulerError::RateLimitExceeded.status_and_code().0,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            SchedulerError::Config("bad".into()).status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_transient_classification() {
        let server_error = SchedulerError::Google(GoogleError::Api {
            status: 503,
            message: "backend".into(),
        });
        assert!(server_error.is_transient());

        let client_error = SchedulerError::Google(GoogleError::Api {
            status: 400,
            message: "bad range".into(),
        });
        assert!(!client_error.is_transient());
        assert!(!SchedulerError::InvalidInput("x".into()).is_transient());
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(SchedulerError::RateLimitExceeded.severity().to_string(), "WARN");
        assert_eq!(SchedulerError::Config("x".into()).severity(), ErrorSeverity::Critical);
    }
}
