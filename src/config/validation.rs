//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use serde::Serialize;
use crate::utils::errors::{SchedulerError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_server_config(&settings.server)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_google_config(&settings.google)?;
    validate_email_config(&settings.email, settings.is_production())?;
    validate_auth_config(&settings.auth, settings.is_production())?;
    validate_agent_config(&settings.agent)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate server configuration
fn validate_server_config(config: &super::ServerConfig) -> Result<()> {
    if config.port == 0 {
        return Err(SchedulerError::Config(
            "Server port must be greater than 0".to_string()
        ));
    }

    url::Url::parse(&config.public_url).map_err(|e| {
        SchedulerError::Config(format!("Invalid public URL '{}': {}", config.public_url, e))
    })?;

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(SchedulerError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(SchedulerError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(SchedulerError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.enabled && config.url.is_empty() {
        return Err(SchedulerError::Config(
            "Redis URL is required when Redis is enabled".to_string()
        ));
    }

    Ok(())
}

/// Validate Google Sheets configuration
fn validate_google_config(config: &super::GoogleConfig) -> Result<()> {
    if !(-12..=14).contains(&config.utc_offset_hours) {
        return Err(SchedulerError::Config(format!(
            "UTC offset {} is out of range",
            config.utc_offset_hours
        )));
    }

    if config.timeout_seconds == 0 {
        return Err(SchedulerError::Config(
            "Google API timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate email configuration
fn validate_email_config(config: &super::EmailConfig, production: bool) -> Result<()> {
    if !config.sender_email.contains('@') {
        return Err(SchedulerError::Config(format!(
            "Sender email '{}' is not a valid address",
            config.sender_email
        )));
    }

    if production && (config.smtp_username.is_none() || config.smtp_password.is_none()) {
        return Err(SchedulerError::Config(
            "SMTP credentials are required in production".to_string()
        ));
    }

    Ok(())
}

/// Validate authentication configuration
fn validate_auth_config(config: &super::AuthConfig, production: bool) -> Result<()> {
    if production && config.supabase_url.is_none() {
        return Err(SchedulerError::Config(
            "Supabase URL is required in production".to_string()
        ));
    }

    if let Some(url) = &config.supabase_url {
        url::Url::parse(url).map_err(|e| {
            SchedulerError::Config(format!("Invalid Supabase URL '{}': {}", url, e))
        })?;
    }

    Ok(())
}

/// Validate chatbot agent configuration
fn validate_agent_config(config: &super::AgentConfig) -> Result<()> {
    let thresholds = [
        config.kb_confidence_threshold,
        config.ai_confidence_threshold,
        config.intent_confidence_threshold,
    ];

    if thresholds.iter().any(|t| !(0.0..=1.0).contains(t)) {
        return Err(SchedulerError::Config(
            "Agent confidence thresholds must be between 0.0 and 1.0".to_string()
        ));
    }

    if config.max_message_length == 0 {
        return Err(SchedulerError::Config(
            "Max message length must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    let base_level = config.level.split(',').next().unwrap_or_default();

    if !valid_levels.contains(&base_level) {
        return Err(SchedulerError::Config(format!(
            "Invalid log level '{}'. Valid levels: {}",
            config.level,
            valid_levels.join(", ")
        )));
    }

    Ok(())
}

/// One line of the admin configuration report
#[derive(Debug, Clone, Serialize)]
pub struct ConfigCheck {
    pub name: &'static str,
    pub configured: bool,
    pub detail: Option<String>,
}

/// Non-fatal overview of which integrations are configured
pub fn configuration_report(settings: &Settings) -> Vec<ConfigCheck> {
    let has = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.is_empty());

    vec![
        ConfigCheck {
            name: "google_service_account",
            configured: has(&settings.google.service_account_path)
                || has(&settings.google.service_account_json),
            detail: None,
        },
        ConfigCheck {
            name: "schedule_sheet_id",
            configured: !settings.google.schedule_sheet_id.is_empty(),
            detail: None,
        },
        ConfigCheck {
            name: "signup_sheet_id",
            configured: !settings.google.signup_sheet_id.is_empty(),
            detail: None,
        },
        ConfigCheck {
            name: "smtp_credentials",
            configured: has(&settings.email.smtp_username) && has(&settings.email.smtp_password),
            detail: Some(format!("{}:{}", settings.email.smtp_host, settings.email.smtp_port)),
        },
        ConfigCheck {
            name: "supabase",
            configured: has(&settings.auth.supabase_url) && has(&settings.auth.supabase_anon_key),
            detail: None,
        },
        ConfigCheck {
            name: "supabase_service_role_key",
            configured: has(&settings.auth.supabase_service_role_key),
            detail: None,
        },
        ConfigCheck {
            name: "messenger",
            configured: has(&settings.messenger.page_access_token)
                && has(&settings.messenger.verify_token),
            detail: Some(if settings.messenger.use_mock { "mock" } else { "graph" }.to_string()),
        },
        ConfigCheck {
            name: "gemini",
            configured: has(&settings.agent.gemini_api_key),
            detail: Some(settings.agent.gemini_model.clone()),
        },
        ConfigCheck {
            name: "redis",
            configured: settings.redis.enabled,
            detail: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(validate_settings(&Settings::default()).is_ok());
    }

    #[test]
    fn test_production_requires_smtp_credentials() {
        let mut settings = Settings::default();
        settings.server.environment = "production".to_string();
        settings.auth.supabase_url = Some("https://project.supabase.co".to_string());
        assert!(validate_settings(&settings).is_err());

        settings.email.smtp_username = Some("user".to_string());
        settings.email.smtp_password = Some("secret".to_string());
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut settings = Settings::default();
        settings.agent.kb_confidence_threshold = 1.5;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut settings = Settings::default();
        settings.logging.level = "loud".to_string();
        assert!(validate_settings(&settings).is_err());

        settings.logging.level = "debug,sqlx=warn".to_string();
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_configuration_report_lists_integrations() {
        let report = configuration_report(&Settings::default());
        assert!(report.iter().any(|c| c.name == "gemini" && !c.configured));
        assert!(report.iter().any(|c| c.name == "smtp_credentials"));
    }
}
