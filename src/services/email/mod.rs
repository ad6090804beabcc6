//! Email dispatcher
//!
//! Renders the confirmation and reminder templates, delivers them through a
//! [`MailTransport`] and records every attempt in `email_communications`.
//! While dry run is enabled only the dry-run recipient really receives mail;
//! everyone else is logged as sent without delivery.

pub mod templates;
pub mod transport;

pub use templates::{EmailTemplates, reminder_subject, CONFIRMATION_SUBJECT};
pub use transport::{MailTransport, OutgoingEmail, RecordingMailer, SmtpMailer};

use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use tracing::{info, warn};
use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::models::{Volunteer, EmailStatus, CreateEmailCommunicationRequest};
use crate::models::email::{EMAIL_TYPE_CONFIRMATION, EMAIL_TYPE_CUSTOM};
use crate::services::settings::{CommunityLinks, RuntimeSettingsService};
use crate::utils::errors::{SchedulerError, Result};
use crate::utils::helpers::generate_unsubscribe_token;
use crate::utils::logging::log_email_event;

/// What happened to a single delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    /// Dry run: not sent, but recorded as sent
    Suppressed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfirmationBatchReport {
    pub candidates: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct EmailService {
    db: DatabaseService,
    runtime: RuntimeSettingsService,
    transport: Arc<dyn MailTransport>,
    templates: EmailTemplates,
    settings: Settings,
}

impl EmailService {
    pub fn new(
        db: DatabaseService,
        runtime: RuntimeSettingsService,
        transport: Arc<dyn MailTransport>,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            runtime,
            transport,
            templates: EmailTemplates::default(),
            settings,
        }
    }

    pub fn templates(&self) -> &EmailTemplates {
        &self.templates
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn schedule_signup_link(&self) -> &str {
        &self.settings.email.schedule_signup_link
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.settings.email.send_delay_ms)
    }

    /// Personal email-preferences link for an unsubscribe token
    pub fn preferences_link(&self, token: &str) -> String {
        format!(
            "{}?token={}",
            self.settings.email.email_preferences_link.trim_end_matches('/'),
            urlencoding::encode(token)
        )
    }

    /// Return the volunteer's unsubscribe token, generating and storing one when missing
    pub async fn ensure_unsubscribe_token(&self, volunteer: &Volunteer) -> Result<String> {
        if let Some(token) = volunteer.email_unsubscribe_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(token.clone());
        }

        let token = generate_unsubscribe_token();
        self.db.volunteers.set_unsubscribe_token(volunteer.id, &token).await?;
        Ok(token)
    }

    pub async fn community_links(&self) -> CommunityLinks {
        self.runtime.links().await
    }

    /// Deliver one email honoring dry run
    pub async fn deliver(&self, email: &OutgoingEmail) -> Result<DeliveryOutcome> {
        if self.runtime.dry_run().await {
            let recipient = self.runtime.dry_run_recipient().await;
            if email.to.trim().to_lowercase() != recipient {
                info!(to = %email.to, subject = %email.subject, "[DRY_RUN] Email not delivered");
                return Ok(DeliveryOutcome::Suppressed);
            }
        }

        self.transport.send(email).await?;
        Ok(DeliveryOutcome::Delivered)
    }

    /// Send the welcome email and record it. Returns whether it counted as sent.
    pub async fn send_confirmation_email(&self, volunteer: &Volunteer) -> Result<bool> {
        let token = self.ensure_unsubscribe_token(volunteer).await?;
        let links = self.community_links().await;
        let html_body = self.templates.render_confirmation(
            &volunteer.name,
            &links,
            self.schedule_signup_link(),
            &self.preferences_link(&token),
        );

        let email = OutgoingEmail {
            to: volunteer.email.clone(),
            subject: CONFIRMATION_SUBJECT.to_string(),
            html_body,
        };

        let (status, error_message) = match self.deliver(&email).await {
            Ok(_) => (EmailStatus::Sent, None),
            Err(e) => {
                warn!(volunteer_id = volunteer.id, error = %e, "Failed to send confirmation email");
                (EmailStatus::Failed, Some(e.to_string()))
            }
        };

        self.db
            .emails
            .create(CreateEmailCommunicationRequest {
                volunteer_id: Some(volunteer.id),
                recipient_email: volunteer.email.clone(),
                email_type: EMAIL_TYPE_CONFIRMATION.to_string(),
                subject: email.subject.clone(),
                template_name: Some(templates::CONFIRMATION_TEMPLATE_NAME.to_string()),
                status,
                error_message: error_message.clone(),
            })
            .await?;

        log_email_event(&volunteer.email, EMAIL_TYPE_CONFIRMATION, &status.to_string(), error_message.as_deref());

        if status == EmailStatus::Sent {
            self.db.volunteers.touch_last_email_sent(volunteer.id).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Send confirmations to every active volunteer that never received one
    pub async fn send_confirmation_emails_to_new_volunteers(&self) -> Result<ConfirmationBatchReport> {
        let volunteers = self.db.volunteers.list_without_confirmation().await?;
        let mut report = ConfirmationBatchReport {
            candidates: volunteers.len(),
            ..Default::default()
        };

        for volunteer in &volunteers {
            match self.send_confirmation_email(volunteer).await {
                Ok(true) => report.sent += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    warn!(volunteer_id = volunteer.id, error = %e, "Confirmation email could not be recorded");
                    report.failed += 1;
                }
            }
            tokio::time::sleep(self.send_delay()).await;
        }

        info!(
            candidates = report.candidates,
            sent = report.sent,
            failed = report.failed,
            "Confirmation emails processed"
        );
        Ok(report)
    }

    /// Send an arbitrary HTML email and record it under `email_type`
    pub async fn send_custom_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        volunteer_id: Option<i64>,
        email_type: Option<&str>,
    ) -> Result<bool> {
        if to.trim().is_empty() {
            return Err(SchedulerError::InvalidInput("Recipient email is required".to_string()));
        }

        let email = OutgoingEmail {
            to: to.trim().to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        };
        let email_type = email_type.unwrap_or(EMAIL_TYPE_CUSTOM);

        let (status, error_message) = match self.deliver(&email).await {
            Ok(_) => (EmailStatus::Sent, None),
            Err(e) => (EmailStatus::Failed, Some(e.to_string())),
        };

        self.db
            .emails
            .create(CreateEmailCommunicationRequest {
                volunteer_id,
                recipient_email: email.to.clone(),
                email_type: email_type.to_string(),
                subject: email.subject.clone(),
                template_name: None,
                status,
                error_message: error_message.clone(),
            })
            .await?;

        log_email_event(&email.to, email_type, &status.to_string(), error_message.as_deref());
        Ok(status == EmailStatus::Sent)
    }
}
