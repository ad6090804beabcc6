//! Weekly reminder emails

use std::collections::BTreeMap;
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use crate::database::DatabaseService;
use crate::models::{CreateEmailCommunicationRequest, EmailStatus, Volunteer};
use crate::models::email::EMAIL_TYPE_WEEKLY_REMINDER;
use crate::services::email::{reminder_subject, EmailService, OutgoingEmail};
use crate::services::email::templates::WEEKLY_REMINDER_TEMPLATE_NAME;
use crate::services::schedule::ScheduleService;
use crate::services::settings::{CommunityLinks, RuntimeSettingsService};
use crate::utils::errors::{Result, SchedulerError};
use crate::utils::helpers::{first_name, week_start};
use crate::utils::logging::log_email_event;

const STATS_WEEKS: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderRunStatus {
    Success,
    PartialFailure,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReminderReport {
    pub status: ReminderRunStatus,
    pub message: String,
    pub dry_run: bool,
    pub recipients: usize,
    pub sent: usize,
    pub failed: usize,
    pub subject: Option<String>,
}

impl ReminderReport {
    fn skipped(message: impl Into<String>, dry_run: bool) -> Self {
        Self {
            status: ReminderRunStatus::Skipped,
            message: message.into(),
            dry_run,
            recipients: 0,
            sent: 0,
            failed: 0,
            subject: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeekStats {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReminderStats {
    pub total_reminders_sent: i64,
    pub successful_reminders: i64,
    pub failed_reminders: i64,
    pub success_rate: f64,
    /// Keyed by the Monday (`YYYY-MM-DD`) starting each week
    pub weekly_stats: BTreeMap<String, WeekStats>,
}

/// Group (sent_at/created_at, status) rows by week start
pub fn group_by_week<I>(rows: I) -> BTreeMap<String, WeekStats>
where
    I: IntoIterator<Item = (chrono::DateTime<Utc>, String)>,
{
    let mut weeks: BTreeMap<String, WeekStats> = BTreeMap::new();
    for (at, status) in rows {
        let key = week_start(at.date_naive()).format("%Y-%m-%d").to_string();
        let entry = weeks.entry(key).or_default();
        entry.total += 1;
        match status.as_str() {
            "sent" | "delivered" => entry.sent += 1,
            "failed" | "bounced" => entry.failed += 1,
            _ => {}
        }
    }
    weeks
}

fn success_rate(successful: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        ((successful as f64 / total as f64) * 1000.0).round() / 10.0
    }
}

/// Rendered per-run material shared by every recipient
struct ReminderBatch {
    subject: String,
    class_tables: Vec<String>,
    links: CommunityLinks,
}

#[derive(Clone)]
pub struct ReminderService {
    db: DatabaseService,
    email: EmailService,
    schedule: ScheduleService,
    runtime: RuntimeSettingsService,
}

impl ReminderService {
    pub fn new(db: DatabaseService, email: EmailService, schedule: ScheduleService, runtime: RuntimeSettingsService) -> Self {
        Self { db, email, schedule, runtime }
    }

    async fn prepare_batch(&self) -> ReminderBatch {
        let (monday, friday) = self.schedule.current_schedule_dates().await;
        let class_tables = self
            .schedule
            .class_tables()
            .await
            .into_iter()
            .map(|t| t.table_html)
            .collect();

        ReminderBatch {
            subject: reminder_subject(monday, friday),
            class_tables,
            links: self.runtime.links().await,
        }
    }

    async fn render_for(&self, volunteer: &Volunteer, batch: &ReminderBatch) -> Result<String> {
        let token = self.email.ensure_unsubscribe_token(volunteer).await?;
        Ok(self.email.templates().render_weekly_reminder(
            &first_name(&volunteer.name),
            &batch.class_tables,
            &batch.links,
            self.email.schedule_signup_link(),
            &self.email.preferences_link(&token),
        ))
    }

    /// Send one reminder, recording it as pending first. Returns whether it was sent.
    async fn send_one(&self, volunteer: &Volunteer, batch: &ReminderBatch) -> Result<bool> {
        let html_body = self.render_for(volunteer, batch).await?;

        let record = self
            .db
            .emails
            .create(CreateEmailCommunicationRequest {
                volunteer_id: Some(volunteer.id),
                recipient_email: volunteer.email.clone(),
                email_type: EMAIL_TYPE_WEEKLY_REMINDER.to_string(),
                subject: batch.subject.clone(),
                template_name: Some(WEEKLY_REMINDER_TEMPLATE_NAME.to_string()),
                status: EmailStatus::Pending,
                error_message: None,
            })
            .await?;

        let email = OutgoingEmail {
            to: volunteer.email.clone(),
            subject: batch.subject.clone(),
            html_body,
        };

        match self.email.deliver(&email).await {
            Ok(_) => {
                self.db.emails.update_status(record.id, EmailStatus::Sent, None).await?;
                self.db.volunteers.touch_last_email_sent(volunteer.id).await?;
                log_email_event(&volunteer.email, EMAIL_TYPE_WEEKLY_REMINDER, "sent", None);
                Ok(true)
            }
            Err(e) => {
                let error = e.to_string();
                self.db
                    .emails
                    .update_status(record.id, EmailStatus::Failed, Some(error.clone()))
                    .await?;
                log_email_event(&volunteer.email, EMAIL_TYPE_WEEKLY_REMINDER, "failed", Some(&error));
                Ok(false)
            }
        }
    }

    /// Send this week's reminder to every active, subscribed volunteer
    pub async fn send_weekly_reminders(&self) -> Result<ReminderReport> {
        let dry_run = self.runtime.dry_run().await;
        if !self.runtime.weekly_reminders_enabled().await {
            info!("Weekly reminders are disabled, skipping");
            return Ok(ReminderReport::skipped("Weekly reminders are disabled", dry_run));
        }

        let mut recipients = self.db.volunteers.list_weekly_recipients().await?;
        if dry_run {
            let dry_run_recipient = self.runtime.dry_run_recipient().await;
            recipients.retain(|v| v.email.to_lowercase() == dry_run_recipient);
            if recipients.is_empty() {
                info!(recipient = %dry_run_recipient, "[DRY_RUN] Dry-run recipient is not a subscribed volunteer, skipping");
                return Ok(ReminderReport::skipped("Dry run enabled and no matching recipient", dry_run));
            }
        }

        if recipients.is_empty() {
            return Ok(ReminderReport::skipped("No active subscribed volunteers", dry_run));
        }

        let batch = self.prepare_batch().await;
        let mut sent = 0;
        let mut failed = 0;

        for volunteer in &recipients {
            match self.send_one(volunteer, &batch).await {
                Ok(true) => sent += 1,
                Ok(false) => failed += 1,
                Err(e) => {
                    warn!(volunteer_id = volunteer.id, error = %e, "Weekly reminder could not be recorded");
                    failed += 1;
                }
            }
            tokio::time::sleep(self.email.send_delay()).await;
        }

        let status = if failed == 0 {
            ReminderRunStatus::Success
        } else {
            ReminderRunStatus::PartialFailure
        };
        info!(recipients = recipients.len(), sent, failed, dry_run, "Weekly reminders processed");

        Ok(ReminderReport {
            status,
            message: format!("Sent {} of {} weekly reminders", sent, recipients.len()),
            dry_run,
            recipients: recipients.len(),
            sent,
            failed,
            subject: Some(batch.subject),
        })
    }

    /// Send this week's reminder to one volunteer
    pub async fn send_weekly_reminder_to(&self, volunteer_id: i64) -> Result<bool> {
        if !self.runtime.weekly_reminders_enabled().await {
            return Err(SchedulerError::InvalidInput("Weekly reminders are disabled".to_string()));
        }

        let volunteer = self
            .db
            .volunteers
            .find_by_id(volunteer_id)
            .await?
            .ok_or(SchedulerError::VolunteerNotFound { volunteer_id })?;

        if !volunteer.is_active {
            return Err(SchedulerError::InvalidInput("Volunteer is inactive".to_string()));
        }
        if !volunteer.weekly_reminders_subscribed {
            return Err(SchedulerError::InvalidInput(
                "Volunteer is unsubscribed from weekly reminders".to_string(),
            ));
        }

        let batch = self.prepare_batch().await;
        let html_body = self.render_for(&volunteer, &batch).await?;
        let sent = self
            .email
            .send_custom_email(
                &volunteer.email,
                &batch.subject,
                &html_body,
                Some(volunteer.id),
                Some(EMAIL_TYPE_WEEKLY_REMINDER),
            )
            .await?;
        if sent {
            self.db.volunteers.touch_last_email_sent(volunteer.id).await?;
        }
        Ok(sent)
    }

    pub async fn reminder_stats(&self) -> Result<ReminderStats> {
        let (total, sent, failed) = self.db.emails.status_counts(EMAIL_TYPE_WEEKLY_REMINDER).await?;
        let since = Utc::now() - Duration::weeks(STATS_WEEKS);
        let recent = self.db.emails.statuses_since(EMAIL_TYPE_WEEKLY_REMINDER, since).await?;

        Ok(ReminderStats {
            total_reminders_sent: total,
            successful_reminders: sent,
            failed_reminders: failed,
            success_rate: success_rate(sent, total),
            weekly_stats: group_by_week(recent),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_group_by_week() {
        let at = |d: u32| Utc.with_ymd_and_hms(2024, 7, d, 9, 0, 0).unwrap();
        let weeks = group_by_week(vec![
            (at(8), "sent".to_string()),
            (at(10), "failed".to_string()),
            (at(14), "sent".to_string()),
            (at(15), "pending".to_string()),
        ]);

        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks["2024-07-08"], WeekStats { total: 3, sent: 2, failed: 1 });
        assert_eq!(weeks["2024-07-15"], WeekStats { total: 1, sent: 0, failed: 0 });
    }

    #[test]
    fn test_success_rate() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(2, 3), 66.7);
        assert_eq!(success_rate(5, 5), 100.0);
    }
}
