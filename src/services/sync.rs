//! Signup sheet to database synchronisation

use std::collections::HashSet;
use serde::Serialize;
use tracing::{info, warn};
use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::services::email::EmailService;
use crate::services::google::SheetsClient;
use crate::services::settings::RuntimeSettingsService;
use crate::services::signups::{parse_submissions, SignupSubmission};
use crate::utils::errors::{GoogleError, Result};
use crate::utils::helpers::{generate_unsubscribe_token, today_with_offset};
use crate::utils::logging::{log_sync_summary, log_volunteer_action};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    PartialFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSubmission {
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub message: String,
    pub submissions_retrieved: usize,
    pub accepted_submissions: usize,
    pub non_accepted_submissions: usize,
    pub new_submissions_found: usize,
    pub volunteers_created: usize,
    pub confirmation_emails_sent: usize,
    pub failed_submissions: Vec<FailedSubmission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPreview {
    #[serde(flatten)]
    pub submission: SignupSubmission,
    pub already_in_database: bool,
}

/// Accepted submissions whose email is neither stored nor repeated earlier in the batch
pub fn select_new_submissions<'a>(
    submissions: &'a [SignupSubmission],
    existing_emails: &HashSet<String>,
) -> Vec<&'a SignupSubmission> {
    let mut seen = HashSet::new();
    submissions
        .iter()
        .filter(|s| s.is_accepted())
        .filter(|s| {
            let email = s.normalized_email();
            !existing_emails.contains(&email) && seen.insert(email)
        })
        .collect()
}

#[derive(Clone)]
pub struct SyncService {
    db: DatabaseService,
    sheets: SheetsClient,
    runtime: RuntimeSettingsService,
    email: EmailService,
    settings: Settings,
}

impl SyncService {
    pub fn new(
        db: DatabaseService,
        sheets: SheetsClient,
        runtime: RuntimeSettingsService,
        email: EmailService,
        settings: Settings,
    ) -> Self {
        Self { db, sheets, runtime, email, settings }
    }

    /// Read and parse every row of the signup responses sheet
    pub async fn fetch_submissions(&self) -> Result<Vec<SignupSubmission>> {
        let sheet_id = self.runtime.signup_sheet_id().await.ok_or(GoogleError::NotConfigured)?;
        let client = self.sheets.with_retry_policy(self.runtime.retry_policy().await);
        let rows = client.get_values(&sheet_id, &self.settings.google.signup_range).await?;
        Ok(parse_submissions(&rows))
    }

    async fn existing_emails(&self) -> Result<HashSet<String>> {
        Ok(self.db.volunteers.all_emails().await?.into_iter().collect())
    }

    /// Parsed submissions annotated with whether the volunteer already exists
    pub async fn preview_submissions(&self) -> Result<Vec<SubmissionPreview>> {
        let submissions = self.fetch_submissions().await?;
        let existing = self.existing_emails().await?;

        Ok(submissions
            .into_iter()
            .map(|submission| {
                let already_in_database = existing.contains(&submission.normalized_email());
                SubmissionPreview { submission, already_in_database }
            })
            .collect())
    }

    /// Create volunteers for new accepted submissions, then send pending confirmations
    pub async fn sync_volunteers(&self) -> Result<SyncReport> {
        let submissions = self.fetch_submissions().await?;
        let accepted = submissions.iter().filter(|s| s.is_accepted()).count();
        let existing = self.existing_emails().await?;
        let new_submissions = select_new_submissions(&submissions, &existing);

        info!(
            retrieved = submissions.len(),
            accepted,
            new = new_submissions.len(),
            "Syncing volunteers from signup sheet"
        );

        let today = today_with_offset(self.settings.google.utc_offset_hours);
        let mut created = 0;
        let mut failed_submissions = Vec::new();

        for submission in &new_submissions {
            let request = submission.to_create_request(today);
            match self.db.volunteers.create(request, Some(generate_unsubscribe_token())).await {
                Ok(volunteer) => {
                    created += 1;
                    log_volunteer_action(volunteer.id, "created", Some("signup sheet sync"));
                }
                Err(e) => {
                    warn!(email = %submission.normalized_email(), error = %e, "Failed to create volunteer");
                    failed_submissions.push(FailedSubmission {
                        email: submission.normalized_email(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let confirmations = self.email.send_confirmation_emails_to_new_volunteers().await?;
        log_sync_summary(submissions.len(), accepted, created, failed_submissions.len());

        let status = if failed_submissions.is_empty() {
            SyncStatus::Success
        } else {
            SyncStatus::PartialFailure
        };
        let message = format!(
            "Retrieved {} form submissions ({} accepted, {} non-accepted)",
            submissions.len(),
            accepted,
            submissions.len() - accepted
        );

        Ok(SyncReport {
            status,
            message,
            submissions_retrieved: submissions.len(),
            accepted_submissions: accepted,
            non_accepted_submissions: submissions.len() - accepted,
            new_submissions_found: new_submissions.len(),
            volunteers_created: created,
            confirmation_emails_sent: confirmations.sent,
            failed_submissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(status: &str, email: &str) -> SignupSubmission {
        SignupSubmission {
            applicant_status: status.to_string(),
            email_address: email.to_string(),
            first_name: "Test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_select_new_submissions() {
        let submissions = vec![
            submission("ACCEPTED", "new@example.com"),
            submission("ACCEPTED", "Existing@Example.com"),
            submission("PENDING", "pending@example.com"),
            submission("accepted", "NEW@example.com"),
            submission("ACCEPTED", "other@example.com"),
        ];
        let existing = HashSet::from(["existing@example.com".to_string()]);

        let selected: Vec<String> = select_new_submissions(&submissions, &existing)
            .iter()
            .map(|s| s.normalized_email())
            .collect();
        assert_eq!(selected, vec!["new@example.com", "other@example.com"]);
    }

    #[test]
    fn test_select_is_idempotent_once_stored() {
        let submissions = vec![submission("ACCEPTED", "a@example.com")];
        let first = select_new_submissions(&submissions, &HashSet::new());
        assert_eq!(first.len(), 1);

        let stored: HashSet<String> = first.iter().map(|s| s.normalized_email()).collect();
        assert!(select_new_submissions(&submissions, &stored).is_empty());
    }
}
