//! Email communication repository implementation

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::{EmailCommunication, EmailStatus, CreateEmailCommunicationRequest};
use crate::models::email::EMAIL_TYPE_CONFIRMATION;
use crate::utils::errors::SchedulerError;

const EMAIL_COLUMNS: &str = "id, volunteer_id, recipient_email, email_type, subject, template_name, \
    status, error_message, sent_at, delivered_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct EmailCommunicationRepository {
    pool: PgPool,
}

impl EmailCommunicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an email; `sent_at` is set when the status is already `sent`
    pub async fn create(&self, request: CreateEmailCommunicationRequest) -> Result<EmailCommunication, SchedulerError> {
        let now = Utc::now();
        let sent_at = (request.status == EmailStatus::Sent).then_some(now);
        let communication = sqlx::query_as::<_, EmailCommunication>(&format!(
            r#"
            INSERT INTO email_communications (volunteer_id, recipient_email, email_type, subject,
                template_name, status, error_message, sent_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {EMAIL_COLUMNS}
            "#
        ))
        .bind(request.volunteer_id)
        .bind(request.recipient_email)
        .bind(request.email_type)
        .bind(request.subject)
        .bind(request.template_name)
        .bind(request.status.to_string())
        .bind(request.error_message)
        .bind(sent_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(communication)
    }

    pub async fn update_status(&self, id: i64, status: EmailStatus, error_message: Option<String>) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let sent_at = (status == EmailStatus::Sent).then_some(now);
        sqlx::query(
            r#"
            UPDATE email_communications
            SET status = $2, error_message = $3, sent_at = COALESCE($4, sent_at), updated_at = $5
            WHERE id = $1
            "#
        )
        .bind(id)
        .bind(status.to_string())
        .bind(error_message)
        .bind(sent_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn has_confirmation(&self, volunteer_id: i64) -> Result<bool, SchedulerError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM email_communications WHERE volunteer_id = $1 AND email_type = $2)"
        )
        .bind(volunteer_id)
        .bind(EMAIL_TYPE_CONFIRMATION)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Delete every confirmation record of a volunteer, returning how many were removed
    pub async fn delete_confirmations(&self, volunteer_id: i64) -> Result<u64, SchedulerError> {
        let result = sqlx::query("DELETE FROM email_communications WHERE volunteer_id = $1 AND email_type = $2")
            .bind(volunteer_id)
            .bind(EMAIL_TYPE_CONFIRMATION)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Most recent communications, optionally filtered by type
    pub async fn list_recent(&self, email_type: Option<&str>, limit: i64) -> Result<Vec<EmailCommunication>, SchedulerError> {
        let communications = sqlx::query_as::<_, EmailCommunication>(&format!(
            r#"
            SELECT {EMAIL_COLUMNS} FROM email_communications
            WHERE ($1::TEXT IS NULL OR email_type = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(email_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(communications)
    }

    /// (created_at, status) pairs of one email type since the given instant
    pub async fn statuses_since(&self, email_type: &str, since: DateTime<Utc>) -> Result<Vec<(DateTime<Utc>, String)>, SchedulerError> {
        let rows: Vec<(DateTime<Utc>, String)> = sqlx::query_as(
            "SELECT created_at, status FROM email_communications WHERE email_type = $1 AND created_at >= $2"
        )
        .bind(email_type)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Returns (total, sent, failed) for one email type
    pub async fn status_counts(&self, email_type: &str) -> Result<(i64, i64, i64), SchedulerError> {
        let counts: (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = 'sent'),
                   COUNT(*) FILTER (WHERE status = 'failed')
            FROM email_communications WHERE email_type = $1
            "#
        )
        .bind(email_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }

    pub async fn count(&self) -> Result<i64, SchedulerError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM email_communications")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
