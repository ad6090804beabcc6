//! Services module
//!
//! This module contains business logic services

pub mod admin_users;
pub mod auth;
pub mod email;
pub mod google;
pub mod messenger;
pub mod redis;
pub mod reminders;
pub mod schedule;
pub mod settings;
pub mod signups;
pub mod sync;
pub mod volunteer;

// Re-export commonly used services
pub use admin_users::AdminUserService;
pub use auth::{AuthService, AuthUser, Principal, SupabaseClient};
pub use email::{EmailService, MailTransport, RecordingMailer, SmtpMailer};
pub use google::{ServiceAccountAuth, SheetsClient};
pub use messenger::{GraphMessenger, MessengerSender, MockMessenger};
pub use redis::CacheService;
pub use reminders::ReminderService;
pub use schedule::ScheduleService;
pub use settings::RuntimeSettingsService;
pub use sync::SyncService;
pub use volunteer::VolunteerService;

use std::sync::Arc;
use serde::Serialize;
use tracing::{info, warn};
use crate::agent::{KnowledgeBase, VolunteerAgent};
use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::utils::errors::{Result, SchedulerError};

/// SMTP when credentials are configured; outside production an in-memory recorder
pub fn mail_transport_from_settings(settings: &Settings) -> Result<Arc<dyn MailTransport>> {
    let has_credentials = settings.email.smtp_username.is_some() && settings.email.smtp_password.is_some();
    if has_credentials {
        return Ok(Arc::new(SmtpMailer::new(&settings.email)?));
    }
    if settings.is_production() {
        return Err(SchedulerError::Config("SMTP credentials are required in production".to_string()));
    }
    warn!("SMTP credentials not configured, emails are recorded in memory only");
    Ok(Arc::new(RecordingMailer::new()))
}

/// External integrations the factory wires into the services
pub struct Integrations {
    pub mail: Arc<dyn MailTransport>,
    pub messenger: Arc<dyn MessengerSender>,
    pub sheets: SheetsClient,
    pub supabase: Option<SupabaseClient>,
}

impl Integrations {
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let service_account = ServiceAccountAuth::from_settings(settings).await?.map(Arc::new);
        if service_account.is_none() {
            warn!("Google service account not configured; Sheets features are disabled");
        }
        Ok(Self {
            mail: mail_transport_from_settings(settings)?,
            messenger: messenger::messenger_from_settings(settings)?,
            sheets: SheetsClient::new(settings, service_account)?,
            supabase: SupabaseClient::from_settings(settings)?,
        })
    }
}

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub settings: Settings,
    pub db: DatabaseService,
    pub cache: CacheService,
    pub runtime: RuntimeSettingsService,
    pub sheets: SheetsClient,
    pub email: EmailService,
    pub schedule: ScheduleService,
    pub sync: SyncService,
    pub reminders: ReminderService,
    pub volunteers: VolunteerService,
    pub auth: AuthService,
    pub admin_users: AdminUserService,
    pub messenger: Arc<dyn MessengerSender>,
    pub agent: VolunteerAgent,
}

impl ServiceFactory {
    /// Build every service with integrations derived from settings
    pub async fn new(settings: Settings, db: DatabaseService) -> Result<Self> {
        let integrations = Integrations::from_settings(&settings).await?;
        let cache = CacheService::new(&settings.redis).await;
        Self::with_integrations(settings, db, cache, integrations).await
    }

    pub async fn with_integrations(
        settings: Settings,
        db: DatabaseService,
        cache: CacheService,
        integrations: Integrations,
    ) -> Result<Self> {
        let runtime = RuntimeSettingsService::new(db.settings.clone(), settings.clone());
        let email = EmailService::new(db.clone(), runtime.clone(), integrations.mail, settings.clone());
        let schedule = ScheduleService::new(integrations.sheets.clone(), runtime.clone(), settings.clone());
        let sync = SyncService::new(
            db.clone(),
            integrations.sheets.clone(),
            runtime.clone(),
            email.clone(),
            settings.clone(),
        );
        let reminders = ReminderService::new(db.clone(), email.clone(), schedule.clone(), runtime.clone());
        let volunteers = VolunteerService::new(db.clone(), email.clone());
        let auth = AuthService::new(&settings, integrations.supabase, db.clone(), cache.clone());
        let admin_users = AdminUserService::new(db.clone(), auth.clone());

        let kb = KnowledgeBase::load(settings.agent.knowledge_base_path.as_deref()).await?;
        let agent = VolunteerAgent::new(db.conversations.clone(), Arc::new(kb), settings.agent.clone())?;

        info!(
            mail = email.transport_name(),
            messenger = integrations.messenger.name(),
            cache = cache.backend_name(),
            sheets_enabled = integrations.sheets.is_enabled(),
            "Services initialized"
        );

        Ok(Self {
            settings,
            db,
            cache,
            runtime,
            sheets: integrations.sheets,
            email,
            schedule,
            sync,
            reminders,
            volunteers,
            auth,
            admin_users,
            messenger: integrations.messenger,
            agent,
        })
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let database_healthy = match self.db.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                false
            }
        };

        ServiceHealthStatus {
            database_healthy,
            cache_backend: self.cache.backend_name(),
            cache_healthy: self.cache.health_check().await,
            sheets_enabled: self.sheets.is_enabled(),
            email_transport: self.email.transport_name(),
            messenger_sender: self.messenger.name(),
            messenger_verify_token_set: self
                .settings
                .messenger
                .verify_token
                .as_deref()
                .is_some_and(|t| !t.is_empty()),
            auth_configured: self.auth.is_configured(),
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealthStatus {
    pub database_healthy: bool,
    pub cache_backend: &'static str,
    pub cache_healthy: bool,
    pub sheets_enabled: bool,
    pub email_transport: &'static str,
    pub messenger_sender: &'static str,
    pub messenger_verify_token_set: bool,
    pub auth_configured: bool,
}

impl ServiceHealthStatus {
    /// Check if all critical services are healthy
    pub fn is_healthy(&self) -> bool {
        self.database_healthy && self.cache_healthy
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.database_healthy {
            issues.push("Database connection failed".to_string());
        }
        if !self.cache_healthy {
            issues.push("Cache backend unavailable".to_string());
        }
        if !self.sheets_enabled {
            issues.push("Google Sheets not configured".to_string());
        }
        if !self.auth_configured {
            issues.push("Supabase auth not configured".to_string());
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> ServiceHealthStatus {
        ServiceHealthStatus {
            database_healthy: true,
            cache_backend: "memory",
            cache_healthy: true,
            sheets_enabled: true,
            email_transport: "recording",
            messenger_sender: "mock",
            messenger_verify_token_set: true,
            auth_configured: true,
        }
    }

    #[test]
    fn test_health_issues() {
        assert!(status().is_healthy());
        assert!(status().get_issues().is_empty());

        let degraded = ServiceHealthStatus {
            database_healthy: false,
            sheets_enabled: false,
            ..status()
        };
        assert!(!degraded.is_healthy());
        assert_eq!(degraded.get_issues().len(), 2);
    }

    #[test]
    fn test_mail_transport_requires_smtp_in_production() {
        let mut settings = Settings::default();
        assert_eq!(mail_transport_from_settings(&settings).unwrap().name(), "recording");

        settings.server.environment = "production".to_string();
        assert!(matches!(mail_transport_from_settings(&settings), Err(SchedulerError::Config(_))));
    }
}
