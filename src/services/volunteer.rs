//! Volunteer management and email preferences

use serde::Serialize;
use tracing::info;
use crate::database::DatabaseService;
use crate::models::{CreateEmailCommunicationRequest, EmailStatus, PreferenceChange, Volunteer, VolunteerSummary};
use crate::models::email::preference_update_type;
use crate::services::email::EmailService;
use crate::utils::errors::{Result, SchedulerError};
use crate::utils::logging::log_volunteer_action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    /// Nothing changed, the volunteer was already in the requested state
    Info,
}

/// Result of an admin action on a volunteer
#[derive(Debug, Clone, Serialize)]
pub struct VolunteerActionOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    pub volunteer_email: String,
}

impl VolunteerActionOutcome {
    fn success(volunteer: &Volunteer, message: String) -> Self {
        Self { status: OutcomeStatus::Success, message, volunteer_email: volunteer.email.clone() }
    }

    fn info(volunteer: &Volunteer, message: String) -> Self {
        Self { status: OutcomeStatus::Info, message, volunteer_email: volunteer.email.clone() }
    }
}

/// Volunteer state after a preference change made through the preferences page
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceUpdate {
    pub volunteer: Volunteer,
    pub change: PreferenceChange,
    pub message: String,
}

/// Subject recorded for a preference change, e.g. "Email Preference Update - All Emails"
fn preference_subject(change: PreferenceChange) -> String {
    let title = change
        .as_str()
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("Email Preference Update - {}", title)
}

#[derive(Clone)]
pub struct VolunteerService {
    db: DatabaseService,
    email: EmailService,
}

impl VolunteerService {
    pub fn new(db: DatabaseService, email: EmailService) -> Self {
        Self { db, email }
    }

    pub async fn list(&self) -> Result<Vec<Volunteer>> {
        self.db.volunteers.list_all().await
    }

    pub async fn list_active(&self) -> Result<Vec<Volunteer>> {
        self.db.volunteers.list_active().await
    }

    pub async fn announcement_recipients(&self) -> Result<Vec<Volunteer>> {
        self.db.volunteers.list_announcement_recipients().await
    }

    pub async fn summaries(&self) -> Result<Vec<VolunteerSummary>> {
        self.db.volunteers.summaries().await
    }

    pub async fn get(&self, volunteer_id: i64) -> Result<Volunteer> {
        self.db
            .volunteers
            .find_by_id(volunteer_id)
            .await?
            .ok_or(SchedulerError::VolunteerNotFound { volunteer_id })
    }

    pub async fn deactivate(&self, volunteer_id: i64) -> Result<VolunteerActionOutcome> {
        let volunteer = self.get(volunteer_id).await?;
        if !volunteer.is_active {
            return Ok(VolunteerActionOutcome::info(
                &volunteer,
                format!("Volunteer {} is already deactivated", volunteer.email),
            ));
        }

        let volunteer = self.db.volunteers.set_active(volunteer_id, false).await?;
        log_volunteer_action(volunteer_id, "deactivated", None);
        Ok(VolunteerActionOutcome::success(
            &volunteer,
            format!("Volunteer {} has been deactivated", volunteer.email),
        ))
    }

    pub async fn reactivate(&self, volunteer_id: i64) -> Result<VolunteerActionOutcome> {
        let volunteer = self.get(volunteer_id).await?;
        if volunteer.is_active {
            return Ok(VolunteerActionOutcome::info(
                &volunteer,
                format!("Volunteer {} is already active", volunteer.email),
            ));
        }

        let volunteer = self.db.volunteers.set_active(volunteer_id, true).await?;
        log_volunteer_action(volunteer_id, "reactivated", None);
        Ok(VolunteerActionOutcome::success(
            &volunteer,
            format!("Volunteer {} has been reactivated", volunteer.email),
        ))
    }

    async fn record_admin_change(&self, volunteer: &Volunteer, email_type: &str, subject: &str) -> Result<()> {
        self.db
            .emails
            .create(CreateEmailCommunicationRequest {
                volunteer_id: Some(volunteer.id),
                recipient_email: volunteer.email.clone(),
                email_type: email_type.to_string(),
                subject: subject.to_string(),
                template_name: None,
                status: EmailStatus::Sent,
                error_message: None,
            })
            .await?;
        Ok(())
    }

    /// Subscribe to every email stream again; activity is left unchanged
    pub async fn resubscribe(&self, volunteer_id: i64) -> Result<VolunteerActionOutcome> {
        self.get(volunteer_id).await?;
        let volunteer = self.db.volunteers.update_preferences(volunteer_id, true, true, None).await?;
        self.record_admin_change(&volunteer, "resubscribe_all", "Resubscribe Request - All Emails").await?;
        log_volunteer_action(volunteer_id, "resubscribed", Some("all emails"));

        Ok(VolunteerActionOutcome::success(
            &volunteer,
            format!("Volunteer {} has been resubscribed to all emails", volunteer.email),
        ))
    }

    pub async fn resubscribe_weekly(&self, volunteer_id: i64) -> Result<VolunteerActionOutcome> {
        let current = self.get(volunteer_id).await?;
        let volunteer = self
            .db
            .volunteers
            .update_preferences(volunteer_id, true, current.all_emails_subscribed, None)
            .await?;
        self.record_admin_change(&volunteer, "resubscribe_weekly", "Resubscribe Request - Weekly Reminders").await?;
        log_volunteer_action(volunteer_id, "resubscribed", Some("weekly reminders"));

        Ok(VolunteerActionOutcome::success(
            &volunteer,
            format!("Volunteer {} has been resubscribed to weekly reminders", volunteer.email),
        ))
    }

    /// Forget recorded confirmations so the next run sends the welcome email again
    pub async fn reset_confirmation(&self, volunteer_id: i64) -> Result<VolunteerActionOutcome> {
        let volunteer = self.get(volunteer_id).await?;
        let removed = self.db.emails.delete_confirmations(volunteer_id).await?;
        log_volunteer_action(volunteer_id, "confirmation_reset", Some(&format!("{} records removed", removed)));

        Ok(VolunteerActionOutcome::success(
            &volunteer,
            format!("Confirmation email status reset for {}", volunteer.email),
        ))
    }

    /// Send the welcome email unless one was already recorded
    pub async fn send_confirmation(&self, volunteer_id: i64) -> Result<VolunteerActionOutcome> {
        let volunteer = self.get(volunteer_id).await?;
        if self.db.emails.has_confirmation(volunteer_id).await? {
            return Ok(VolunteerActionOutcome::info(
                &volunteer,
                format!("Confirmation email already sent to {}", volunteer.email),
            ));
        }

        if self.email.send_confirmation_email(&volunteer).await? {
            Ok(VolunteerActionOutcome::success(
                &volunteer,
                format!("Confirmation email sent successfully to {}", volunteer.email),
            ))
        } else {
            Err(SchedulerError::ServiceUnavailable(format!(
                "Failed to send confirmation email to {}",
                volunteer.email
            )))
        }
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Volunteer> {
        if token.trim().is_empty() {
            return Err(SchedulerError::InvalidInput("Unsubscribe token is required".to_string()));
        }
        self.db
            .volunteers
            .find_by_token(token)
            .await?
            .ok_or_else(|| SchedulerError::NotFound("Unsubscribe token".to_string()))
    }

    /// Apply a preference change requested through a personal unsubscribe link
    pub async fn update_preferences_by_token(&self, token: &str, kind: &str) -> Result<PreferenceUpdate> {
        let volunteer = self.find_by_token(token).await?;
        let change = PreferenceChange::parse(kind)
            .ok_or_else(|| SchedulerError::InvalidInput(format!("Invalid preference selection: {}", kind)))?;

        let (weekly, all, is_active) = change.flags();
        let volunteer = self
            .db
            .volunteers
            .update_preferences(volunteer.id, weekly, all, is_active)
            .await?;

        self.record_admin_change(&volunteer, &preference_update_type(change.as_str()), &preference_subject(change))
            .await?;
        info!(volunteer_id = volunteer.id, change = change.as_str(), "Volunteer updated email preferences");

        Ok(PreferenceUpdate {
            volunteer,
            change,
            message: change.confirmation_message().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_subject() {
        assert_eq!(
            preference_subject(PreferenceChange::WeeklyReminders),
            "Email Preference Update - Weekly Reminders"
        );
        assert_eq!(preference_subject(PreferenceChange::Resubscribe), "Email Preference Update - Resubscribe");
    }
}
