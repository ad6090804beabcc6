//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub google: GoogleConfig,
    pub email: EmailConfig,
    pub auth: AuthConfig,
    pub messenger: MessengerConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
    pub features: FeaturesConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// Externally reachable base URL, used for OAuth redirects
    pub public_url: String,
    pub cors_origins: Vec<String>,
    pub request_timeout_seconds: u64,
    /// Key public rate limits on `X-Forwarded-For`/`X-Real-IP`; only enable behind a proxy that sets them
    pub trust_proxy_headers: bool,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub enabled: bool,
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Google Sheets configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleConfig {
    pub service_account_path: Option<String>,
    pub service_account_json: Option<String>,
    pub sheets_api_url: String,
    /// Spreadsheet holding the weekly schedule tabs
    pub schedule_sheet_id: String,
    /// Spreadsheet receiving the signup form responses
    pub signup_sheet_id: String,
    pub signup_range: String,
    pub class_config_range: String,
    pub timeout_seconds: u64,
    /// Offset from UTC used to decide what "today" is for schedules
    pub utc_offset_hours: i32,
}

/// Outgoing email configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub sender_name: String,
    pub sender_email: String,
    pub email_preferences_link: String,
    pub schedule_signup_link: String,
    /// Delay between consecutive sends in bulk operations
    pub send_delay_ms: u64,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub supabase_service_role_key: Option<String>,
    pub supabase_jwt_secret: Option<String>,
    pub google_client_id: Option<String>,
    /// JWKS endpoint used to check Google ID token signatures
    pub google_certs_url: String,
    pub admin_emails: Vec<String>,
    pub allowed_email_domains: Vec<String>,
    pub allowed_emails: Vec<String>,
    pub admin_cache_ttl_seconds: u64,
    pub login_redirect_path: String,
    pub token_skew_seconds: i64,
}

/// Facebook Messenger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessengerConfig {
    pub page_access_token: Option<String>,
    pub verify_token: Option<String>,
    pub graph_api_url: String,
    pub api_version: String,
    pub use_mock: bool,
}

/// Chatbot agent configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_url: String,
    pub kb_confidence_threshold: f64,
    pub ai_confidence_threshold: f64,
    pub intent_confidence_threshold: f64,
    pub max_message_length: usize,
    pub recent_messages_limit: i64,
    pub message_truncate_length: usize,
    pub max_messages_per_minute: u32,
    pub max_messages_per_hour: u32,
    pub new_user_signup_link: String,
    pub facebook_messenger_link: Option<String>,
    pub instagram_link: Option<String>,
    /// Overrides the bundled knowledge base file
    pub knowledge_base_path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_name: String,
    pub json: bool,
}

/// Feature flags configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturesConfig {
    pub chatbot: bool,
    pub scheduler_api: bool,
    pub public_rate_limit_per_minute: u32,
}

impl Settings {
    /// Load settings from defaults, configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("SCHEDULER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("auth.admin_emails")
                    .with_list_parse_key("auth.allowed_email_domains")
                    .with_list_parse_key("auth.allowed_emails")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::SchedulerError> {
        super::validation::validate_settings(self)
    }

    pub fn is_production(&self) -> bool {
        self.server.environment.eq_ignore_ascii_case("production")
    }

    /// Socket address string the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                environment: "development".to_string(),
                public_url: "http://localhost:8080".to_string(),
                cors_origins: vec![],
                request_timeout_seconds: 60,
                trust_proxy_headers: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/hearts_scheduler".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            redis: RedisConfig {
                enabled: false,
                url: "redis://localhost:6379".to_string(),
                prefix: "hearts:".to_string(),
                ttl_seconds: 300,
            },
            google: GoogleConfig {
                service_account_path: None,
                service_account_json: None,
                sheets_api_url: "https://sheets.googleapis.com/v4".to_string(),
                schedule_sheet_id: String::new(),
                signup_sheet_id: String::new(),
                signup_range: "A2:X".to_string(),
                class_config_range: "Schedule Config!A2:F".to_string(),
                timeout_seconds: 30,
                utc_offset_hours: 7,
            },
            email: EmailConfig {
                smtp_host: "smtp.gmail.com".to_string(),
                smtp_port: 587,
                smtp_username: None,
                smtp_password: None,
                sender_name: "Vietnam Hearts".to_string(),
                sender_email: "noreply@vietnamhearts.org".to_string(),
                email_preferences_link: "http://localhost:8080/unsubscribe".to_string(),
                schedule_signup_link: String::new(),
                send_delay_ms: 50,
            },
            auth: AuthConfig {
                supabase_url: None,
                supabase_anon_key: None,
                supabase_service_role_key: None,
                supabase_jwt_secret: None,
                google_client_id: None,
                google_certs_url: "https://www.googleapis.com/oauth2/v3/certs".to_string(),
                admin_emails: vec![],
                allowed_email_domains: vec![],
                allowed_emails: vec![],
                admin_cache_ttl_seconds: 300,
                login_redirect_path: "/admin/dashboard".to_string(),
                token_skew_seconds: 300,
            },
            messenger: MessengerConfig {
                page_access_token: None,
                verify_token: None,
                graph_api_url: "https://graph.facebook.com".to_string(),
                api_version: "v18.0".to_string(),
                use_mock: false,
            },
            agent: AgentConfig {
                gemini_api_key: None,
                gemini_model: "gemini-1.5-flash".to_string(),
                gemini_api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                kb_confidence_threshold: 0.9,
                ai_confidence_threshold: 0.8,
                intent_confidence_threshold: 0.5,
                max_message_length: 1000,
                recent_messages_limit: 5,
                message_truncate_length: 100,
                max_messages_per_minute: 10,
                max_messages_per_hour: 100,
                new_user_signup_link: String::new(),
                facebook_messenger_link: None,
                instagram_link: None,
                knowledge_base_path: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: "logs".to_string(),
                file_name: "hearts-scheduler.log".to_string(),
                json: false,
            },
            features: FeaturesConfig {
                chatbot: true,
                scheduler_api: true,
                public_rate_limit_per_minute: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.email.smtp_port, 587);
        assert_eq!(settings.agent.gemini_model, "gemini-1.5-flash");
        assert_eq!(settings.auth.admin_cache_ttl_seconds, 300);
        assert!(!settings.is_production());
        assert_eq!(settings.bind_address(), "0.0.0.0:8080");
    }
}
